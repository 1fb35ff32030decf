// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric queries and derived state.
//!
//! Computes lengths, areas, normals, centroids and signed volumes with
//! standard computational geometry algorithms, and the orientation
//! consistency of volumes.

use std::collections::VecDeque;

use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::{GeometricOrientation, ModelData};

/// Signed uses of each edge across a face set: `(face index, sign)`.
type EdgeUses = FxHashMap<EdgeKey, SmallVec<[(usize, f64); 2]>>;

impl ModelData {
    /// Returns the position of a vertex.
    pub fn vertex_point(&self, key: VertexKey) -> Option<Point3<f64>> {
        self.vertices.get(key).map(|v| v.position)
    }

    /// Computes the Euclidean length of an edge.
    pub fn edge_length(&self, key: EdgeKey) -> Option<f64> {
        let edge = self.edges.get(key)?;
        let p0 = self.vertex_point(edge.vertices[0])?;
        let p1 = self.vertex_point(edge.vertices[1])?;
        Some((p1 - p0).norm())
    }

    /// Unnormalized Newell vector of a loop. Its length is twice the enclosed
    /// area; its direction follows the right-hand rule of the winding.
    pub fn loop_newell(&self, key: LoopKey) -> Option<Vector3<f64>> {
        let verts = self.loop_vertices_ordered(key)?;
        let points: Vec<Point3<f64>> = verts
            .iter()
            .map(|v| self.vertex_point(*v))
            .collect::<Option<_>>()?;
        Some(newell(&points))
    }

    /// Unit normal of a loop's winding, or `None` when degenerate.
    pub fn loop_normal(&self, key: LoopKey) -> Option<Vector3<f64>> {
        let n = self.loop_newell(key)?;
        let len = n.norm();
        if len < self.config.normal_epsilon {
            return None;
        }
        Some(n / len)
    }

    /// Stored normal of a face. Zero for degenerate faces.
    pub fn face_normal(&self, key: FaceKey) -> Option<Vector3<f64>> {
        self.faces.get(key).map(|f| f.normal)
    }

    /// Area of a face with the hole areas subtracted.
    pub fn face_area(&self, key: FaceKey) -> Option<f64> {
        let face = self.faces.get(key)?;
        let mut total = self.loop_newell(face.boundary)?.norm() / 2.0;
        for &hole in &face.holes {
            if let Some(n) = self.loop_newell(hole) {
                total -= n.norm() / 2.0;
            }
        }
        Some(total.max(0.0))
    }

    /// Average of the boundary vertices of a face.
    pub fn face_centroid(&self, key: FaceKey) -> Option<Point3<f64>> {
        let face = self.faces.get(key)?;
        let verts = self.loop_vertices_ordered(face.boundary)?;
        if verts.is_empty() {
            return None;
        }

        let mut sum = Vector3::new(0.0, 0.0, 0.0);
        for &vk in &verts {
            sum += self.vertex_point(vk)?.coords;
        }
        Some(Point3::from(sum / verts.len() as f64))
    }

    /// Recomputes the normal of a face from its boundary winding.
    ///
    /// Loaded loops of the face are ordered first. Fails when a hole loop is
    /// no longer stored in the model. Returns whether the stored normal
    /// changed.
    pub(crate) fn update_face_normal(&mut self, key: FaceKey) -> Result<bool> {
        let face = self.faces.get(key).ok_or(Error::MissingGeometry(key.into()))?;
        if !self.loops.contains_key(face.boundary) {
            return Err(Error::MissingGeometry(face.boundary.into()));
        }
        if let Some(hole) = face.holes.iter().find(|h| !self.loops.contains_key(**h)) {
            return Err(Error::HoleLoopNotInModel(*hole));
        }

        let (boundary, sign) = (face.boundary, face.orientation.sign());
        let holes = face.holes.clone();
        for l in std::iter::once(boundary).chain(holes) {
            self.derive_loaded_loop(l)?;
        }

        let normal = match self.loop_normal(boundary) {
            Some(n) => n * sign,
            None => {
                tracing::warn!(face = ?key, "degenerate face boundary, normal set to zero");
                Vector3::zeros()
            }
        };
        let Some(face) = self.faces.get_mut(key) else {
            return Ok(false);
        };
        let changed = face.normal != normal;
        face.normal = normal;
        Ok(changed)
    }

    // --- Volume orientation ---

    /// `-1` when a hole winds with the face boundary and has to be traversed
    /// backwards, `+1` otherwise.
    fn hole_factor(&self, boundary: LoopKey, hole: LoopKey) -> f64 {
        match (self.loop_normal(boundary), self.loop_normal(hole)) {
            (Some(b), Some(h)) if b.dot(&h) > self.config.hole_alignment_epsilon => -1.0,
            _ => 1.0,
        }
    }

    /// Signed edge uses of a face, without any volume orientation applied.
    fn face_edge_signs(&self, key: FaceKey) -> Vec<(EdgeKey, f64)> {
        let Some(face) = self.faces.get(key) else {
            return Vec::new();
        };
        let face_sign = face.orientation.sign();
        let mut out = Vec::new();
        let loops = std::iter::once((face.boundary, 1.0)).chain(
            face.holes
                .iter()
                .map(|&h| (h, self.hole_factor(face.boundary, h))),
        );
        for (lk, factor) in loops {
            let Some(edge_loop) = self.loops.get(lk) else {
                continue;
            };
            for pk in &edge_loop.edges {
                if let Some(pe) = self.pedges.get(*pk) {
                    out.push((pe.edge, pe.orientation.sign() * face_sign * factor));
                }
            }
        }
        out
    }

    /// Collects edge uses over `faces` with the given per-face signs.
    fn edge_uses(&self, faces: &[(FaceKey, f64)]) -> EdgeUses {
        let mut uses: EdgeUses = FxHashMap::default();
        for (i, (fk, sign)) in faces.iter().enumerate() {
            for (edge, s) in self.face_edge_signs(*fk) {
                uses.entry(edge).or_default().push((i, s * sign));
            }
        }
        uses
    }

    fn volume_face_uses(&self, key: VolumeKey) -> Option<Vec<(PFaceKey, FaceKey, f64)>> {
        let volume = self.volumes.get(key)?;
        volume
            .faces
            .iter()
            .map(|pk| {
                self.pfaces
                    .get(*pk)
                    .map(|pf| (*pk, pf.face, pf.orientation.sign()))
            })
            .collect()
    }

    /// Checks whether the faces of a volume form a closed shell in which every
    /// edge is used exactly twice, once in each direction.
    ///
    /// Empty and non-manifold volumes (an edge used more than twice) are not
    /// consistent.
    pub fn check_volume_orientation(&self, key: VolumeKey) -> bool {
        let Some(uses) = self.volume_face_uses(key) else {
            return false;
        };
        if uses.is_empty() {
            return false;
        }
        let faces: Vec<(FaceKey, f64)> = uses.iter().map(|(_, f, s)| (*f, *s)).collect();
        let edge_uses = self.edge_uses(&faces);
        !edge_uses.is_empty()
            && edge_uses
                .values()
                .all(|u| u.len() == 2 && u[0].1 * u[1].1 < 0.0)
    }

    /// Recomputes the derived orientation flag of a volume. Returns whether
    /// it changed.
    pub(crate) fn update_volume_orientation(&mut self, key: VolumeKey) -> bool {
        let consistent = self.check_volume_orientation(key);
        match self.volumes.get_mut(key) {
            Some(v) if v.is_consistent_oriented != consistent => {
                v.is_consistent_oriented = consistent;
                true
            }
            _ => false,
        }
    }

    /// Signed volume enclosed by a consistently oriented shell, positive when
    /// the face normals point outward. NaN for inconsistent volumes.
    pub fn volume_signed(&self, key: VolumeKey) -> Option<f64> {
        let uses = self.volume_face_uses(key)?;
        if !self.check_volume_orientation(key) {
            return Some(f64::NAN);
        }
        let mut total = 0.0;
        for (_, fk, pface_sign) in uses {
            let face = self.faces.get(fk)?;
            let face_sign = face.orientation.sign() * pface_sign;
            total += face_sign * self.loop_cone_volume(face.boundary)?;
            for &hole in &face.holes {
                let factor = self.hole_factor(face.boundary, hole);
                total += face_sign * factor * self.loop_cone_volume(hole)?;
            }
        }
        Some(total)
    }

    /// Signed volume of the cone from the origin over a loop, using a
    /// triangle fan from the first vertex.
    fn loop_cone_volume(&self, key: LoopKey) -> Option<f64> {
        let verts = self.loop_vertices_ordered(key)?;
        if verts.len() < 3 {
            return Some(0.0);
        }
        let p0 = self.vertex_point(verts[0])?.coords;
        let mut volume = 0.0;
        for i in 1..verts.len() - 1 {
            let p1 = self.vertex_point(verts[i])?.coords;
            let p2 = self.vertex_point(verts[i + 1])?.coords;
            volume += p0.dot(&p1.cross(&p2));
        }
        Some(volume / 6.0)
    }

    /// Flips PFace orientations until the shell is consistently oriented and
    /// faces outward.
    ///
    /// Walks breadth-first across shared edges from the first face of each
    /// connected component. Returns `Ok(false)` without modifying the volume
    /// when the shell is open, non-manifold or non-orientable.
    pub fn orient_volume(&mut self, key: VolumeKey) -> Result<bool> {
        let uses = self
            .volume_face_uses(key)
            .ok_or(Error::MissingGeometry(key.into()))?;
        if uses.is_empty() {
            return Ok(false);
        }

        // Face signs without the PFace orientation; the walk assigns those.
        let base: Vec<(FaceKey, f64)> = uses.iter().map(|(_, f, _)| (*f, 1.0)).collect();
        let edge_uses = self.edge_uses(&base);
        if edge_uses.is_empty() || edge_uses.values().any(|u| u.len() != 2) {
            return Ok(false);
        }

        let mut face_edges: Vec<Vec<EdgeKey>> = vec![Vec::new(); uses.len()];
        for (edge, u) in &edge_uses {
            for (i, _) in u {
                face_edges[*i].push(*edge);
            }
        }

        let mut signs: Vec<Option<f64>> = vec![None; uses.len()];
        let mut queue = VecDeque::new();
        for seed in 0..uses.len() {
            if signs[seed].is_some() {
                continue;
            }
            signs[seed] = Some(uses[seed].2);
            queue.push_back(seed);

            while let Some(i) = queue.pop_front() {
                let Some(mi) = signs[i] else {
                    continue;
                };
                for edge in &face_edges[i] {
                    let u = &edge_uses[edge];
                    let (a, b) = (u[0], u[1]);
                    let (own, other) = if a.0 == i { (a, b) } else { (b, a) };
                    // m_own * s_own == -(m_other * s_other)
                    let required = -mi * own.1 * other.1;
                    match signs[other.0] {
                        None => {
                            signs[other.0] = Some(required);
                            queue.push_back(other.0);
                        }
                        Some(m) if m != required => return Ok(false),
                        Some(_) => {}
                    }
                }
            }
        }

        let mut changed = Vec::new();
        for ((pk, _, current), sign) in uses.iter().zip(&signs) {
            let wanted = sign.unwrap_or(*current);
            if wanted != *current {
                changed.push(*pk);
            }
        }
        self.flip_pfaces(&changed);

        if self.volume_signed(key).is_some_and(|v| v < 0.0) {
            let all: Vec<PFaceKey> = uses.iter().map(|(pk, _, _)| *pk).collect();
            self.flip_pfaces(&all);
        }

        self.update_volume_orientation(key);
        self.notify_topology_changed(key.into())?;
        Ok(true)
    }

    fn flip_pfaces(&mut self, pfaces: &[PFaceKey]) {
        for pk in pfaces {
            if let Some(pf) = self.pfaces.get_mut(*pk) {
                pf.orientation = match pf.orientation {
                    GeometricOrientation::Backward => GeometricOrientation::Forward,
                    _ => GeometricOrientation::Backward,
                };
            }
        }
    }
}

/// Newell's method for the (unnormalized) normal of a closed polygon.
///
/// Works for any planar polygon (convex or concave).
pub fn newell(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::new(0.0, 0.0, 0.0);
    let n = points.len();
    if n < 3 {
        return normal;
    }
    for i in 0..n {
        let curr = points[i];
        let next = points[(i + 1) % n];
        normal.x += (curr.y - next.y) * (curr.z + next.z);
        normal.y += (curr.z - next.z) * (curr.x + next.x);
        normal.z += (curr.x - next.x) * (curr.y + next.y);
    }
    normal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::{make_quad_loop, GeometryInfo};
    use approx::assert_relative_eq;

    fn rectangle(
        model: &mut ModelData,
        layer: LayerKey,
        corners: [(f64, f64); 4],
    ) -> LoopKey {
        let verts = corners.map(|(x, y)| {
            model
                .add_vertex(GeometryInfo::new(layer, "V"), Point3::new(x, y, 0.0))
                .unwrap()
        });
        make_quad_loop(model, layer, verts).unwrap().0
    }

    fn face(model: &mut ModelData, layer: LayerKey, boundary: LoopKey, holes: &[LoopKey]) -> FaceKey {
        model
            .add_face(
                GeometryInfo::new(layer, "F"),
                boundary,
                holes,
                GeometricOrientation::Forward,
            )
            .unwrap()
    }

    #[test]
    fn newell_of_unit_square() {
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let n = newell(&pts);
        assert_relative_eq!(n, Vector3::new(0.0, 0.0, 2.0), epsilon = 1e-12);
    }

    #[test]
    fn face_normal_follows_winding_and_orientation() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let l = rectangle(&mut model, layer, [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let f = face(&mut model, layer, l, &[]);
        assert_relative_eq!(
            model.face_normal(f).unwrap(),
            Vector3::new(0.0, 0.0, 1.0),
            epsilon = 1e-12
        );

        model
            .set_face_orientation(f, GeometricOrientation::Backward)
            .unwrap();
        assert_relative_eq!(
            model.face_normal(f).unwrap(),
            Vector3::new(0.0, 0.0, -1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn face_area_subtracts_holes() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let outer = rectangle(&mut model, layer, [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let hole = rectangle(&mut model, layer, [(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0)]);
        let f = face(&mut model, layer, outer, &[hole]);

        assert_relative_eq!(model.face_area(f).unwrap(), 96.0, epsilon = 1e-10);
        assert_relative_eq!(
            model.face_centroid(f).unwrap(),
            Point3::new(5.0, 5.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn degenerate_face_has_zero_normal() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let l = rectangle(&mut model, layer, [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        let f = face(&mut model, layer, l, &[]);
        assert_eq!(model.face_normal(f).unwrap(), Vector3::zeros());
        assert_relative_eq!(model.face_area(f).unwrap(), 0.0);
    }

    #[test]
    fn edge_length() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let a = model
            .add_vertex(GeometryInfo::new(layer, "V"), Point3::new(0.0, 0.0, 0.0))
            .unwrap();
        let b = model
            .add_vertex(GeometryInfo::new(layer, "V"), Point3::new(3.0, 4.0, 0.0))
            .unwrap();
        let e = model.add_edge(GeometryInfo::new(layer, "E"), &[a, b]).unwrap();
        assert_relative_eq!(model.edge_length(e).unwrap(), 5.0);
    }

    #[test]
    fn single_face_volume_is_open() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let l = rectangle(&mut model, layer, [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let f = face(&mut model, layer, l, &[]);
        let v = model
            .add_volume(GeometryInfo::new(layer, "Vol"), &[f])
            .unwrap();

        assert!(!model.volume(v).unwrap().is_consistent_oriented);
        assert!(model.volume_signed(v).unwrap().is_nan());
        assert!(!model.orient_volume(v).unwrap());
    }
}
