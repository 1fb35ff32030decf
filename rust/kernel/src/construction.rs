// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction methods for geometry entities.
//!
//! Each entity is created through the model, which checks referential
//! integrity (all referenced entities must exist), maintains the back-reference
//! lists and registers the new identity.
//!
//! Constructors come in two flavours selected by [`GeometryInfo::id`]:
//! - without an explicit id, derived state (loop order, normals, orientation
//!   consistency) is computed right away and invalid input is rejected,
//! - with an explicit id (loading), the input is stored as given and derived
//!   state waits for the next [`ModelData::make_consistent`] or the end of the
//!   surrounding batch.

use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::*;
use crate::ordering::OrientedEdge;

/// Identity, name and layer of a geometry about to be created.
#[derive(Debug, Clone)]
pub struct GeometryInfo {
    pub layer: LayerKey,
    /// Display name; every `{0}` is replaced by the identity.
    pub name_format: String,
    /// Explicit identity for loaded entities.
    pub id: Option<GeometryId>,
}

impl GeometryInfo {
    pub fn new(layer: LayerKey, name_format: impl Into<String>) -> Self {
        Self {
            layer,
            name_format: name_format.into(),
            id: None,
        }
    }

    /// Marks the entity as loaded with a fixed identity.
    pub fn with_id(mut self, id: GeometryId) -> Self {
        self.id = Some(id);
        self
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.id.is_some()
    }
}

impl ModelData {
    /// Adds a vertex at the given position.
    pub fn add_vertex(&mut self, info: GeometryInfo, position: Point3<f64>) -> Result<VertexKey> {
        self.require_layer(info.layer)?;
        let id = self.claim_id(info.id)?;

        let key = self.vertices.insert(Vertex {
            base: GeometryBase::new(id, &info.name_format, info.layer),
            position,
            edges: SmallVec::new(),
            proxies: SmallVec::new(),
        });
        self.geometry_added(key.into())?;
        Ok(key)
    }

    /// Creates an edge between two distinct, existing vertices.
    pub fn add_edge(&mut self, info: GeometryInfo, vertices: &[VertexKey]) -> Result<EdgeKey> {
        self.require_layer(info.layer)?;
        let [v0, v1] = self.validate_edge_vertices(vertices)?;
        let id = self.claim_id(info.id)?;

        let key = self.edges.insert(Edge {
            base: GeometryBase::new(id, &info.name_format, info.layer),
            vertices: [v0, v1],
            pedges: Vec::new(),
        });
        self.link_vertex_edge(v0, key);
        self.link_vertex_edge(v1, key);
        self.geometry_added(key.into())?;
        Ok(key)
    }

    /// Creates a closed loop from an unordered set of edges.
    ///
    /// The edges are ordered and oriented so that consecutive edges share
    /// exactly one vertex and the last edge returns to the first.
    pub fn add_edge_loop(&mut self, info: GeometryInfo, edges: &[EdgeKey]) -> Result<LoopKey> {
        self.require_layer(info.layer)?;
        let order = if info.is_loaded() {
            self.validate_edge_set(edges, 3)?;
            unordered(edges)
        } else {
            let order = self.order_loop(edges)?;
            if !order.is_loop {
                return Err(Error::NotAClosedLoop);
            }
            order.edges
        };
        let id = self.claim_id(info.id)?;

        let key = self.loops.insert(EdgeLoop {
            base: GeometryBase::new(id, &info.name_format, info.layer),
            edges: Vec::new(),
            faces: Vec::new(),
        });
        let container = EdgeContainerKey::Loop(key);
        let pedges = self.create_pedges(container, &order);
        self.loops[key].edges = pedges;
        self.relink_pedges(container, true);

        if info.is_loaded() {
            self.underived.insert(key.into());
        }
        self.geometry_added(key.into())?;
        Ok(key)
    }

    /// Creates an open, non-branching chain from an unordered set of edges.
    pub fn add_polyline(&mut self, info: GeometryInfo, edges: &[EdgeKey]) -> Result<PolylineKey> {
        self.require_layer(info.layer)?;
        let (order, closed) = if info.is_loaded() {
            self.validate_edge_set(edges, 1)?;
            (unordered(edges), false)
        } else {
            let order = self.order_path(edges)?;
            (order.edges, order.is_loop)
        };
        let id = self.claim_id(info.id)?;

        let key = self.polylines.insert(Polyline {
            base: GeometryBase::new(id, &info.name_format, info.layer),
            edges: Vec::new(),
            is_closed: closed,
        });
        let container = EdgeContainerKey::Polyline(key);
        let pedges = self.create_pedges(container, &order);
        self.polylines[key].edges = pedges;
        self.relink_pedges(container, closed);

        if info.is_loaded() {
            self.underived.insert(key.into());
        }
        self.geometry_added(key.into())?;
        Ok(key)
    }

    /// Creates a face from a boundary loop and optional hole loops.
    pub fn add_face(
        &mut self,
        info: GeometryInfo,
        boundary: LoopKey,
        holes: &[LoopKey],
        orientation: GeometricOrientation,
    ) -> Result<FaceKey> {
        self.require_layer(info.layer)?;
        if !self.loops.contains_key(boundary) {
            return Err(Error::MissingGeometry(boundary.into()));
        }
        for &hole in holes {
            if !self.loops.contains_key(hole) {
                return Err(Error::HoleLoopNotInModel(hole));
            }
        }
        let id = self.claim_id(info.id)?;

        let key = self.faces.insert(Face {
            base: GeometryBase::new(id, &info.name_format, info.layer),
            boundary,
            holes: holes.to_vec(),
            orientation,
            normal: Vector3::zeros(),
            pfaces: Vec::new(),
        });
        self.link_loop_face(boundary, key);
        for &hole in holes {
            self.link_loop_face(hole, key);
        }

        if info.is_loaded() {
            self.underived.insert(key.into());
        } else {
            self.update_face_normal(key)?;
        }
        self.geometry_added(key.into())?;
        Ok(key)
    }

    /// Creates a volume from a set of faces, each used in forward orientation.
    pub fn add_volume(&mut self, info: GeometryInfo, faces: &[FaceKey]) -> Result<VolumeKey> {
        let uses: Vec<(FaceKey, GeometricOrientation)> = faces
            .iter()
            .map(|&f| (f, GeometricOrientation::Forward))
            .collect();
        self.add_volume_oriented(info, &uses)
    }

    /// Creates a volume from faces with explicit orientations relative to the
    /// volume.
    pub fn add_volume_oriented(
        &mut self,
        info: GeometryInfo,
        faces: &[(FaceKey, GeometricOrientation)],
    ) -> Result<VolumeKey> {
        self.require_layer(info.layer)?;
        self.validate_face_set(faces.iter().map(|(f, _)| *f))?;
        let id = self.claim_id(info.id)?;

        let key = self.volumes.insert(Volume {
            base: GeometryBase::new(id, &info.name_format, info.layer),
            faces: Vec::with_capacity(faces.len()),
            is_consistent_oriented: false,
        });
        for &(face, orientation) in faces {
            let pface = self.create_pface(key, face, orientation);
            self.volumes[key].faces.push(pface);
        }

        if info.is_loaded() {
            self.underived.insert(key.into());
        } else {
            self.update_volume_orientation(key);
        }
        self.geometry_added(key.into())?;
        Ok(key)
    }

    // --- Validation helpers ---

    pub(crate) fn require_layer(&self, layer: LayerKey) -> Result<()> {
        if self.layers.contains_key(layer) {
            Ok(())
        } else {
            Err(Error::MissingLayer(layer))
        }
    }

    pub(crate) fn validate_edge_vertices(&self, vertices: &[VertexKey]) -> Result<[VertexKey; 2]> {
        let &[v0, v1] = vertices else {
            return Err(Error::WrongVertexCount(vertices.len()));
        };
        for v in [v0, v1] {
            if !self.vertices.contains_key(v) {
                return Err(Error::MissingGeometry(v.into()));
            }
        }
        if v0 == v1 {
            return Err(Error::DegenerateEdge(v0));
        }
        Ok([v0, v1])
    }

    /// Checks size, existence and uniqueness of an edge set.
    pub(crate) fn validate_edge_set(&self, edges: &[EdgeKey], min: usize) -> Result<()> {
        if edges.len() < min {
            return Err(Error::TooFewEdges {
                min,
                got: edges.len(),
            });
        }
        let mut seen = FxHashSet::default();
        for &e in edges {
            if !self.edges.contains_key(e) {
                return Err(Error::MissingGeometry(e.into()));
            }
            if !seen.insert(e) {
                return Err(Error::DuplicateEdge(e));
            }
        }
        Ok(())
    }

    pub(crate) fn validate_face_set(&self, faces: impl Iterator<Item = FaceKey>) -> Result<()> {
        let mut seen = FxHashSet::default();
        for f in faces {
            if !self.faces.contains_key(f) {
                return Err(Error::MissingGeometry(f.into()));
            }
            if !seen.insert(f) {
                return Err(Error::DuplicateFace(f));
            }
        }
        if seen.is_empty() {
            return Err(Error::EmptyVolume);
        }
        Ok(())
    }

    // --- Back-reference helpers ---

    pub(crate) fn link_vertex_edge(&mut self, vertex: VertexKey, edge: EdgeKey) {
        if let Some(v) = self.vertices.get_mut(vertex) {
            if !v.edges.contains(&edge) {
                v.edges.push(edge);
            }
        }
    }

    pub(crate) fn unlink_vertex_edge(&mut self, vertex: VertexKey, edge: EdgeKey) {
        if let Some(v) = self.vertices.get_mut(vertex) {
            v.edges.retain(|e| *e != edge);
        }
    }

    pub(crate) fn link_loop_face(&mut self, edge_loop: LoopKey, face: FaceKey) {
        if let Some(l) = self.loops.get_mut(edge_loop) {
            if !l.faces.contains(&face) {
                l.faces.push(face);
            }
        }
    }

    /// Drops `face` from the loop's face list unless the face still uses the
    /// loop in another role.
    pub(crate) fn unlink_loop_face(&mut self, edge_loop: LoopKey, face: FaceKey) {
        let still_used = self
            .faces
            .get(face)
            .map(|f| f.boundary == edge_loop || f.holes.contains(&edge_loop))
            .unwrap_or(false);
        if still_used {
            return;
        }
        if let Some(l) = self.loops.get_mut(edge_loop) {
            l.faces.retain(|f| *f != face);
        }
    }

    /// Creates one PEdge per entry and registers it on its edge.
    pub(crate) fn create_pedges(
        &mut self,
        container: EdgeContainerKey,
        order: &[OrientedEdge],
    ) -> Vec<PEdgeKey> {
        let mut keys = Vec::with_capacity(order.len());
        for oe in order {
            let pk = self.pedges.insert(PEdge {
                edge: oe.edge,
                parent: container,
                orientation: oe.orientation,
                next: None,
                prev: None,
            });
            if let Some(edge) = self.edges.get_mut(oe.edge) {
                edge.pedges.push(pk);
            }
            keys.push(pk);
        }
        keys
    }

    /// Removes PEdges and their registration on the edges.
    pub(crate) fn destroy_pedges(&mut self, pedges: &[PEdgeKey]) {
        for &pk in pedges {
            if let Some(pe) = self.pedges.remove(pk) {
                if let Some(edge) = self.edges.get_mut(pe.edge) {
                    edge.pedges.retain(|p| *p != pk);
                }
            }
        }
    }

    pub(crate) fn create_pface(
        &mut self,
        volume: VolumeKey,
        face: FaceKey,
        orientation: GeometricOrientation,
    ) -> PFaceKey {
        let pk = self.pfaces.insert(PFace {
            face,
            volume,
            orientation,
        });
        if let Some(f) = self.faces.get_mut(face) {
            f.pfaces.push(pk);
        }
        pk
    }

    pub(crate) fn destroy_pface(&mut self, pface: PFaceKey) {
        if let Some(pf) = self.pfaces.remove(pface) {
            if let Some(face) = self.faces.get_mut(pf.face) {
                face.pfaces.retain(|p| *p != pface);
            }
        }
    }
}

fn unordered(edges: &[EdgeKey]) -> Vec<OrientedEdge> {
    edges
        .iter()
        .map(|&edge| OrientedEdge {
            edge,
            orientation: GeometricOrientation::Undefined,
        })
        .collect()
}

/// Helper to build a quadrilateral loop from four corner vertices.
///
/// Creates 4 edges and 1 loop. Returns `(loop_key, edge_keys)`.
pub fn make_quad_loop(
    model: &mut ModelData,
    layer: LayerKey,
    corners: [VertexKey; 4],
) -> Result<(LoopKey, [EdgeKey; 4])> {
    let mut edges = [EdgeKey::default(); 4];
    for i in 0..4 {
        edges[i] = model.add_edge(
            GeometryInfo::new(layer, "Edge {0}"),
            &[corners[i], corners[(i + 1) % 4]],
        )?;
    }
    let edge_loop = model.add_edge_loop(GeometryInfo::new(layer, "Loop {0}"), &edges)?;
    Ok((edge_loop, edges))
}
