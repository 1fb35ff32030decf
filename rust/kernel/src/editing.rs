// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mutation of existing geometry.
//!
//! Every edit updates the back-reference lists first and then reports itself
//! through [`notify_geometry_changed`](ModelData::notify_geometry_changed) or
//! [`notify_topology_changed`](ModelData::notify_topology_changed). Inside a
//! batch, edits that break derived invariants (for example a loop that no
//! longer closes) are accepted and reported by the end-of-batch sweep.

use nalgebra::Point3;

use crate::color::DerivedColor;
use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::{GeometricOrientation, ModelData};
use crate::ordering::OrientedEdge;

impl ModelData {
    // --- Vertices and edges ---

    pub fn set_vertex_position(&mut self, key: VertexKey, position: Point3<f64>) -> Result<()> {
        let vertex = self
            .vertices
            .get_mut(key)
            .ok_or(Error::MissingGeometry(key.into()))?;
        vertex.position = position;
        self.notify_geometry_changed(key.into())
    }

    /// Replaces the two vertices of an edge.
    pub fn set_edge_vertices(&mut self, key: EdgeKey, vertices: &[VertexKey]) -> Result<()> {
        let old = self
            .edges
            .get(key)
            .ok_or(Error::MissingGeometry(key.into()))?
            .vertices;
        let new = self.validate_edge_vertices(vertices)?;

        for v in old {
            self.unlink_vertex_edge(v, key);
        }
        for v in new {
            self.link_vertex_edge(v, key);
        }
        if let Some(edge) = self.edges.get_mut(key) {
            edge.vertices = new;
        }
        self.notify_topology_changed(key.into())
    }

    // --- Edge containers ---

    /// Replaces the edges of a loop. The new set is ordered by the next
    /// re-derivation.
    pub fn set_loop_edges(&mut self, key: LoopKey, edges: &[EdgeKey]) -> Result<()> {
        if !self.loops.contains_key(key) {
            return Err(Error::MissingGeometry(key.into()));
        }
        self.validate_edge_set(edges, 3)?;
        self.replace_container_edges(EdgeContainerKey::Loop(key), edges, true);
        self.notify_topology_changed(key.into())
    }

    /// Replaces the edges of a polyline.
    pub fn set_polyline_edges(&mut self, key: PolylineKey, edges: &[EdgeKey]) -> Result<()> {
        if !self.polylines.contains_key(key) {
            return Err(Error::MissingGeometry(key.into()));
        }
        self.validate_edge_set(edges, 1)?;
        self.replace_container_edges(EdgeContainerKey::Polyline(key), edges, false);
        self.notify_topology_changed(key.into())
    }

    /// Appends an edge to a polyline.
    pub fn add_polyline_edge(&mut self, key: PolylineKey, edge: EdgeKey) -> Result<()> {
        let container = EdgeContainerKey::Polyline(key);
        if !self.polylines.contains_key(key) {
            return Err(Error::MissingGeometry(key.into()));
        }
        if !self.edges.contains_key(edge) {
            return Err(Error::MissingGeometry(edge.into()));
        }
        if self.container_edges(container).contains(&edge) {
            return Err(Error::DuplicateEdge(edge));
        }

        let created = self.create_pedges(
            container,
            &[OrientedEdge {
                edge,
                orientation: GeometricOrientation::Undefined,
            }],
        );
        if let Some(polyline) = self.polylines.get_mut(key) {
            polyline.edges.extend(created);
        }
        self.relink_pedges(container, false);
        self.notify_topology_changed(key.into())
    }

    fn replace_container_edges(
        &mut self,
        container: EdgeContainerKey,
        edges: &[EdgeKey],
        cyclic: bool,
    ) {
        let old = self.container_pedges(container).to_vec();
        self.destroy_pedges(&old);
        let order: Vec<OrientedEdge> = edges
            .iter()
            .map(|&edge| OrientedEdge {
                edge,
                orientation: GeometricOrientation::Undefined,
            })
            .collect();
        let created = self.create_pedges(container, &order);
        match container {
            EdgeContainerKey::Loop(k) => {
                if let Some(l) = self.loops.get_mut(k) {
                    l.edges = created;
                }
            }
            EdgeContainerKey::Polyline(k) => {
                if let Some(p) = self.polylines.get_mut(k) {
                    p.edges = created;
                }
            }
        }
        self.relink_pedges(container, cyclic);
    }

    // --- Faces ---

    pub fn set_face_boundary(&mut self, key: FaceKey, boundary: LoopKey) -> Result<()> {
        if !self.loops.contains_key(boundary) {
            return Err(Error::MissingGeometry(boundary.into()));
        }
        let face = self
            .faces
            .get_mut(key)
            .ok_or(Error::MissingGeometry(key.into()))?;
        let old = std::mem::replace(&mut face.boundary, boundary);
        self.unlink_loop_face(old, key);
        self.link_loop_face(boundary, key);
        self.notify_topology_changed(key.into())
    }

    pub fn set_face_holes(&mut self, key: FaceKey, holes: &[LoopKey]) -> Result<()> {
        if let Some(hole) = holes.iter().find(|h| !self.loops.contains_key(**h)) {
            return Err(Error::HoleLoopNotInModel(*hole));
        }
        let face = self
            .faces
            .get_mut(key)
            .ok_or(Error::MissingGeometry(key.into()))?;
        let old = std::mem::replace(&mut face.holes, holes.to_vec());
        for hole in old {
            self.unlink_loop_face(hole, key);
        }
        for &hole in holes {
            self.link_loop_face(hole, key);
        }
        self.notify_topology_changed(key.into())
    }

    pub fn add_face_hole(&mut self, key: FaceKey, hole: LoopKey) -> Result<()> {
        if !self.loops.contains_key(hole) {
            return Err(Error::HoleLoopNotInModel(hole));
        }
        let face = self
            .faces
            .get_mut(key)
            .ok_or(Error::MissingGeometry(key.into()))?;
        if face.holes.contains(&hole) {
            return Ok(());
        }
        face.holes.push(hole);
        self.link_loop_face(hole, key);
        self.notify_topology_changed(key.into())
    }

    pub fn remove_face_hole(&mut self, key: FaceKey, hole: LoopKey) -> Result<()> {
        let face = self
            .faces
            .get_mut(key)
            .ok_or(Error::MissingGeometry(key.into()))?;
        let Some(pos) = face.holes.iter().position(|h| *h == hole) else {
            return Err(Error::NotAMember {
                container: key.into(),
                member: hole.into(),
            });
        };
        face.holes.remove(pos);
        self.unlink_loop_face(hole, key);
        self.notify_topology_changed(key.into())
    }

    pub fn set_face_orientation(
        &mut self,
        key: FaceKey,
        orientation: GeometricOrientation,
    ) -> Result<()> {
        let face = self
            .faces
            .get_mut(key)
            .ok_or(Error::MissingGeometry(key.into()))?;
        if face.orientation == orientation {
            return Ok(());
        }
        face.orientation = orientation;
        self.notify_geometry_changed(key.into())
    }

    // --- Volumes ---

    /// Replaces the faces of a volume; every face is used forward.
    pub fn set_volume_faces(&mut self, key: VolumeKey, faces: &[FaceKey]) -> Result<()> {
        if !self.volumes.contains_key(key) {
            return Err(Error::MissingGeometry(key.into()));
        }
        self.validate_face_set(faces.iter().copied())?;

        let old = self
            .volumes
            .get_mut(key)
            .map(|v| std::mem::take(&mut v.faces))
            .unwrap_or_default();
        for pk in old {
            self.destroy_pface(pk);
        }
        for &face in faces {
            let pk = self.create_pface(key, face, GeometricOrientation::Forward);
            if let Some(v) = self.volumes.get_mut(key) {
                v.faces.push(pk);
            }
        }
        self.notify_topology_changed(key.into())
    }

    pub fn add_volume_face(
        &mut self,
        key: VolumeKey,
        face: FaceKey,
        orientation: GeometricOrientation,
    ) -> Result<PFaceKey> {
        if !self.faces.contains_key(face) {
            return Err(Error::MissingGeometry(face.into()));
        }
        if !self.volumes.contains_key(key) {
            return Err(Error::MissingGeometry(key.into()));
        }
        if self.volume_faces(key).contains(&face) {
            return Err(Error::DuplicateFace(face));
        }
        let pk = self.create_pface(key, face, orientation);
        if let Some(v) = self.volumes.get_mut(key) {
            v.faces.push(pk);
        }
        self.notify_topology_changed(key.into())?;
        Ok(pk)
    }

    pub fn remove_volume_face(&mut self, key: VolumeKey, face: FaceKey) -> Result<()> {
        let volume = self
            .volumes
            .get(key)
            .ok_or(Error::MissingGeometry(key.into()))?;
        let found = volume
            .faces
            .iter()
            .copied()
            .find(|pk| self.pfaces.get(*pk).is_some_and(|pf| pf.face == face));
        let Some(pk) = found else {
            return Err(Error::NotAMember {
                container: key.into(),
                member: face.into(),
            });
        };
        if let Some(v) = self.volumes.get_mut(key) {
            v.faces.retain(|p| *p != pk);
        }
        self.destroy_pface(pk);
        self.notify_topology_changed(key.into())
    }

    /// Sets the orientation with which `volume` uses `face`.
    pub fn set_pface_orientation(
        &mut self,
        volume: VolumeKey,
        face: FaceKey,
        orientation: GeometricOrientation,
    ) -> Result<()> {
        let found = self.volumes.get(volume).and_then(|v| {
            v.faces
                .iter()
                .copied()
                .find(|pk| self.pfaces.get(*pk).is_some_and(|pf| pf.face == face))
        });
        let Some(pface) = found.and_then(|pk| self.pfaces.get_mut(pk)) else {
            return Err(Error::NotAMember {
                container: volume.into(),
                member: face.into(),
            });
        };
        if pface.orientation == orientation {
            return Ok(());
        }
        pface.orientation = orientation;
        self.notify_topology_changed(volume.into())
    }

    // --- Display state ---

    pub fn set_name(&mut self, key: GeometryKey, name: impl Into<String>) -> Result<()> {
        self.require_base_mut(key)?.name = name.into();
        self.notify_geometry_changed(key)
    }

    pub fn set_visibility(&mut self, key: GeometryKey, visible: bool) -> Result<()> {
        let base = self.require_base_mut(key)?;
        if base.is_visible == visible {
            return Ok(());
        }
        base.is_visible = visible;
        self.notify_geometry_changed(key)
    }

    pub fn set_color(&mut self, key: GeometryKey, color: DerivedColor) -> Result<()> {
        let base = self.require_base_mut(key)?;
        if base.color == color {
            return Ok(());
        }
        base.color = color;
        self.notify_geometry_changed(key)
    }
}
