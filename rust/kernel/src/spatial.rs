// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tolerance-based vertex lookup.
//!
//! Importers that receive raw coordinates use [`VertexIndex`] to reuse a
//! vertex that already sits within [`KernelConfig::tolerance`] of a point
//! instead of creating a coincident one.
//!
//! [`KernelConfig::tolerance`]: crate::config::KernelConfig::tolerance

use nalgebra::Point3;
use rustc_hash::FxHashMap;

use crate::construction::GeometryInfo;
use crate::error::Result;
use crate::keys::VertexKey;
use crate::model::ModelData;

type Cell = (i64, i64, i64);

/// Grid hash over vertex positions.
///
/// Space is divided into cubes of side `cell_size`; a query scans the 3x3x3
/// block of cells around the point. The index is a snapshot: vertices moved
/// after insertion are found at their old cell only.
#[derive(Debug)]
pub struct VertexIndex {
    cell_size: f64,
    grid: FxHashMap<Cell, Vec<VertexKey>>,
}

impl VertexIndex {
    /// `cell_size` should be at least the query tolerance.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(1e-10),
            grid: FxHashMap::default(),
        }
    }

    /// Indexes every vertex of a model, with cells sized to its tolerance.
    pub fn from_model(model: &ModelData) -> Self {
        let mut index = Self::new(model.config().tolerance);
        for (key, vertex) in model.vertices() {
            index.insert(key, vertex.position);
        }
        index
    }

    pub fn insert(&mut self, key: VertexKey, position: Point3<f64>) {
        let cell = self.cell(&position);
        self.grid.entry(cell).or_default().push(key);
    }

    /// First live vertex within `tolerance` of `point`.
    pub fn find_near(
        &self,
        model: &ModelData,
        point: &Point3<f64>,
        tolerance: f64,
    ) -> Option<VertexKey> {
        let (cx, cy, cz) = self.cell(point);
        let tol_sq = tolerance * tolerance;

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(keys) = self.grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &vk in keys {
                        let Some(p) = model.vertex_point(vk) else {
                            continue;
                        };
                        if (p - point).norm_squared() <= tol_sq {
                            return Some(vk);
                        }
                    }
                }
            }
        }
        None
    }

    fn cell(&self, p: &Point3<f64>) -> Cell {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }
}

impl ModelData {
    /// Finds a vertex within the configured tolerance of `point` by scanning
    /// all vertices. Use a [`VertexIndex`] for repeated lookups.
    pub fn find_vertex(&self, point: &Point3<f64>) -> Option<VertexKey> {
        let tol_sq = self.config.tolerance * self.config.tolerance;
        self.vertices
            .iter()
            .find(|(_, v)| (v.position - point).norm_squared() <= tol_sq)
            .map(|(k, _)| k)
    }

    /// Returns the vertex within tolerance of `point`, or adds a new one and
    /// indexes it.
    pub fn find_or_add_vertex(
        &mut self,
        index: &mut VertexIndex,
        info: GeometryInfo,
        point: Point3<f64>,
    ) -> Result<VertexKey> {
        if let Some(existing) = index.find_near(self, &point, self.config.tolerance) {
            return Ok(existing);
        }
        let key = self.add_vertex(info, point)?;
        index.insert(key, point);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;

    #[test]
    fn coincident_points_share_a_vertex() {
        let mut model = ModelData::with_config(KernelConfig {
            tolerance: 1e-3,
            ..KernelConfig::default()
        });
        let layer = model.add_layer("Import", None).unwrap();
        let mut index = VertexIndex::from_model(&model);

        let a = model
            .find_or_add_vertex(&mut index, GeometryInfo::new(layer, "V"), Point3::new(1.0, 2.0, 3.0))
            .unwrap();
        let b = model
            .find_or_add_vertex(
                &mut index,
                GeometryInfo::new(layer, "V"),
                Point3::new(1.0004, 2.0, 2.9997),
            )
            .unwrap();
        let c = model
            .find_or_add_vertex(&mut index, GeometryInfo::new(layer, "V"), Point3::new(1.01, 2.0, 3.0))
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(model.vertex_count(), 2);
    }

    #[test]
    fn removed_vertices_are_not_found() {
        let mut model = ModelData::new();
        let layer = model.add_layer("Import", None).unwrap();
        let v = model
            .add_vertex(GeometryInfo::new(layer, "V"), Point3::new(0.5, 0.5, 0.5))
            .unwrap();
        let index = VertexIndex::from_model(&model);
        let tol = model.config().tolerance;

        assert_eq!(model.find_vertex(&Point3::new(0.5, 0.5, 0.5)), Some(v));
        assert_eq!(index.find_near(&model, &Point3::new(0.5, 0.5, 0.5), tol), Some(v));

        model.remove(v.into()).unwrap();
        assert_eq!(model.find_vertex(&Point3::new(0.5, 0.5, 0.5)), None);
        assert_eq!(index.find_near(&model, &Point3::new(0.5, 0.5, 0.5), tol), None);
    }
}
