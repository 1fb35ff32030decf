// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Affine transformations on geometry.
//!
//! Transforms modify vertex positions in-place. Since all higher-level
//! entities (edges, loops, faces, etc.) reference vertices through keys,
//! moving vertices moves everything that references them. Each call runs as
//! one batch operation, so observers see a single aggregated change.

use nalgebra::{Matrix4, Point3, Rotation3, Unit, Vector3};

use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::ModelData;

impl ModelData {
    /// Translates all vertices referenced by a geometry.
    pub fn translate(&mut self, key: GeometryKey, delta: Vector3<f64>) -> Result<()> {
        self.map_vertices(key, |p| p + delta)
    }

    /// Rotates all vertices referenced by a geometry around an axis.
    ///
    /// `origin` is the center of rotation, `axis` is the rotation axis
    /// (will be normalized), and `angle` is in radians. A zero axis leaves
    /// the geometry unchanged.
    pub fn rotate(
        &mut self,
        key: GeometryKey,
        origin: Point3<f64>,
        axis: Vector3<f64>,
        angle: f64,
    ) -> Result<()> {
        let Some(unit_axis) = Unit::try_new(axis, self.config.normal_epsilon) else {
            return Ok(());
        };
        let rotation = Rotation3::from_axis_angle(&unit_axis, angle);
        self.map_vertices(key, |p| origin + rotation * (p - origin))
    }

    /// Scales all vertices referenced by a geometry relative to an origin.
    pub fn scale(
        &mut self,
        key: GeometryKey,
        origin: Point3<f64>,
        factors: Vector3<f64>,
    ) -> Result<()> {
        self.map_vertices(key, |p| origin + (p - origin).component_mul(&factors))
    }

    /// Applies a 4x4 affine transformation matrix to all vertices.
    pub fn transform(&mut self, key: GeometryKey, matrix: &Matrix4<f64>) -> Result<()> {
        self.map_vertices(key, |p| matrix.transform_point(&p))
    }

    fn map_vertices(
        &mut self,
        key: GeometryKey,
        f: impl Fn(Point3<f64>) -> Point3<f64>,
    ) -> Result<()> {
        if !self.contains_geometry(key) {
            return Err(Error::MissingGeometry(key));
        }
        let vertex_keys = self.downward_vertices(key);
        self.with_batch(|m| {
            for vk in vertex_keys {
                let Some(p) = m.vertex_point(vk) else {
                    continue;
                };
                m.set_vertex_position(vk, f(p))?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::{make_quad_loop, GeometryInfo};
    use crate::model::GeometricOrientation;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn unit_square_face(model: &mut ModelData) -> (FaceKey, [VertexKey; 4]) {
        let layer = model.add_layer("L", None).unwrap();
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)].map(|(x, y)| {
            model
                .add_vertex(GeometryInfo::new(layer, "V"), Point3::new(x, y, 0.0))
                .unwrap()
        });
        let (l, _) = make_quad_loop(model, layer, corners).unwrap();
        let face = model
            .add_face(
                GeometryInfo::new(layer, "F"),
                l,
                &[],
                GeometricOrientation::Forward,
            )
            .unwrap();
        (face, corners)
    }

    #[test]
    fn translate_moves_every_vertex_once() {
        let mut model = ModelData::new();
        let (face, corners) = unit_square_face(&mut model);
        model
            .translate(face.into(), Vector3::new(1.0, 2.0, 3.0))
            .unwrap();
        assert_relative_eq!(
            model.vertex_point(corners[2]).unwrap(),
            Point3::new(2.0, 3.0, 3.0)
        );
    }

    #[test]
    fn rotation_updates_the_face_normal() {
        let mut model = ModelData::new();
        let (face, _) = unit_square_face(&mut model);
        model
            .rotate(face.into(), Point3::origin(), Vector3::x(), FRAC_PI_2)
            .unwrap();
        assert_relative_eq!(
            model.face_normal(face).unwrap(),
            Vector3::new(0.0, -1.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn scale_about_origin() {
        let mut model = ModelData::new();
        let (face, corners) = unit_square_face(&mut model);
        model
            .scale(face.into(), Point3::new(1.0, 1.0, 0.0), Vector3::new(2.0, 3.0, 1.0))
            .unwrap();
        assert_relative_eq!(
            model.vertex_point(corners[0]).unwrap(),
            Point3::new(-1.0, -2.0, 0.0)
        );
        assert_relative_eq!(model.face_area(face).unwrap(), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn matrix_transform() {
        let mut model = ModelData::new();
        let (face, corners) = unit_square_face(&mut model);
        let m = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 5.0));
        model.transform(face.into(), &m).unwrap();
        assert_relative_eq!(
            model.vertex_point(corners[1]).unwrap(),
            Point3::new(1.0, 0.0, 5.0)
        );
    }
}
