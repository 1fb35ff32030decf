// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for the geometry model.
//!
//! [`ModelData`] is the exclusive owner of every entity. Entities live in slot
//! maps with stable, generational keys and reference each other only through
//! those keys. The back-reference lists (vertex → edges, edge → PEdges,
//! loop → faces, face → PFaces) exist for O(1) upward traversal and never
//! imply ownership: removing an entity from its slot map is its destruction.
//!
//! Collaborators only ever receive shared references to entity records. All
//! mutation goes through the model so that the consistency engine and the
//! change notifications see every edit.

use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::batch::BatchState;
use crate::color::DerivedColor;
use crate::config::KernelConfig;
use crate::error::{Error, Result};
use crate::events::Observers;
use crate::identity::{IdOwner, IdTable};
use crate::keys::*;
use crate::layer::Layer;

/// Direction in which an edge or face is used by its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GeometricOrientation {
    /// Not yet derived (e.g. loop edges before ordering).
    #[default]
    Undefined,
    Forward,
    Backward,
}

impl GeometricOrientation {
    /// `+1` for forward use, `-1` for backward. Undefined counts as forward.
    pub fn sign(self) -> f64 {
        match self {
            GeometricOrientation::Backward => -1.0,
            _ => 1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            GeometricOrientation::Forward => GeometricOrientation::Backward,
            GeometricOrientation::Backward => GeometricOrientation::Forward,
            GeometricOrientation::Undefined => GeometricOrientation::Undefined,
        }
    }
}

/// State shared by every geometry entity.
#[derive(Debug, Clone)]
pub struct GeometryBase {
    pub id: GeometryId,
    /// Display name, not unique.
    pub name: String,
    pub layer: LayerKey,
    pub is_visible: bool,
    pub color: DerivedColor,
    /// Geometry changed since the last flush.
    pub geometry_changed: bool,
    /// Topology changed since the last flush.
    pub topology_changed: bool,
}

impl GeometryBase {
    pub(crate) fn new(id: GeometryId, name_format: &str, layer: LayerKey) -> Self {
        Self {
            id,
            name: format_name(name_format, id),
            layer,
            is_visible: true,
            color: DerivedColor::inherited(),
            geometry_changed: false,
            topology_changed: false,
        }
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.geometry_changed || self.topology_changed
    }

    pub(crate) fn clear_flags(&mut self) {
        self.geometry_changed = false;
        self.topology_changed = false;
    }
}

/// Expands a name format: every `{0}` becomes the entity's identity.
pub fn format_name(name_format: &str, id: GeometryId) -> String {
    name_format.replace("{0}", &id.to_string())
}

/// A point in 3D space.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub base: GeometryBase,
    pub position: Point3<f64>,
    /// Incident edges.
    pub edges: SmallVec<[EdgeKey; 4]>,
    /// Proxy meshes attached to this vertex.
    pub proxies: SmallVec<[ProxyKey; 1]>,
}

/// A straight segment between two distinct vertices.
#[derive(Debug, Clone)]
pub struct Edge {
    pub base: GeometryBase,
    pub vertices: [VertexKey; 2],
    /// Every loop or polyline use of this edge.
    pub pedges: Vec<PEdgeKey>,
}

/// The use of an edge inside a loop or polyline.
///
/// `next`/`prev` link the uses of one container in traversal order. For
/// loops the links are cyclic; for polylines the ends are `None`.
#[derive(Debug, Clone)]
pub struct PEdge {
    pub edge: EdgeKey,
    pub parent: EdgeContainerKey,
    pub orientation: GeometricOrientation,
    pub next: Option<PEdgeKey>,
    pub prev: Option<PEdgeKey>,
}

/// A closed, oriented cycle of edges.
#[derive(Debug, Clone)]
pub struct EdgeLoop {
    pub base: GeometryBase,
    /// Edge uses in traversal order.
    pub edges: Vec<PEdgeKey>,
    /// Faces using this loop as boundary or hole.
    pub faces: Vec<FaceKey>,
}

/// An open (or at most simply closed), non-branching chain of edges.
#[derive(Debug, Clone)]
pub struct Polyline {
    pub base: GeometryBase,
    /// Edge uses in traversal order.
    pub edges: Vec<PEdgeKey>,
    /// `true` when the chain happens to return to its first vertex.
    pub is_closed: bool,
}

/// A planar region bounded by one loop with optional hole loops.
#[derive(Debug, Clone)]
pub struct Face {
    pub base: GeometryBase,
    pub boundary: LoopKey,
    pub holes: Vec<LoopKey>,
    /// Whether the normal follows (`Forward`) or opposes (`Backward`) the
    /// boundary winding.
    pub orientation: GeometricOrientation,
    /// Derived unit normal. Zero for degenerate faces.
    pub normal: Vector3<f64>,
    /// Every volume use of this face.
    pub pfaces: Vec<PFaceKey>,
}

/// The use of a face inside a volume.
#[derive(Debug, Clone)]
pub struct PFace {
    pub face: FaceKey,
    pub volume: VolumeKey,
    /// `Forward` when the face normal points out of the volume.
    pub orientation: GeometricOrientation,
}

/// A set of oriented faces that should close into a shell.
#[derive(Debug, Clone)]
pub struct Volume {
    pub base: GeometryBase,
    pub faces: Vec<PFaceKey>,
    /// Derived: faces form a closed, consistently oriented shell.
    pub is_consistent_oriented: bool,
}

/// A mesh rigidly attached to a vertex.
#[derive(Debug, Clone)]
pub struct ProxyGeometry {
    pub base: GeometryBase,
    pub vertex: VertexKey,
    pub size: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    /// Mesh positions in proxy-local coordinates.
    pub positions: Vec<Point3<f64>>,
    pub normals: Vec<Vector3<f64>>,
    /// Triangle list indices into `positions`.
    pub indices: Vec<u32>,
    /// Derived local-to-world transform.
    pub transform: Matrix4<f64>,
}

/// Anchors a vertex to a geographic coordinate (longitude, latitude, height).
#[derive(Debug, Clone)]
pub struct GeoReference {
    pub vertex: VertexKey,
    pub reference_point: Point3<f64>,
}

/// The geometry model: per-type collections, the layer tree, the identity
/// table and the batch-operation state.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use plantgeo_kernel::{GeometryInfo, ModelData};
///
/// let mut model = ModelData::new();
/// let layer = model.add_layer("Layer 0", None).unwrap();
/// let v0 = model
///     .add_vertex(GeometryInfo::new(layer, "Vertex {0}"), Point3::new(0.0, 0.0, 0.0))
///     .unwrap();
///
/// assert_eq!(model.vertex_count(), 1);
/// assert_eq!(model.vertex(v0).unwrap().base.name, "Vertex 1");
/// ```
pub struct ModelData {
    /// Process-unique tag stamped into [`LayerRef`](crate::layer::LayerRef)s.
    pub(crate) token: u64,
    pub(crate) config: KernelConfig,

    // Entity storage
    pub(crate) vertices: SlotMap<VertexKey, Vertex>,
    pub(crate) edges: SlotMap<EdgeKey, Edge>,
    pub(crate) loops: SlotMap<LoopKey, EdgeLoop>,
    pub(crate) polylines: SlotMap<PolylineKey, Polyline>,
    pub(crate) faces: SlotMap<FaceKey, Face>,
    pub(crate) volumes: SlotMap<VolumeKey, Volume>,
    pub(crate) proxies: SlotMap<ProxyKey, ProxyGeometry>,
    pub(crate) geo_references: SlotMap<GeoReferenceKey, GeoReference>,

    // Association records
    pub(crate) pedges: SlotMap<PEdgeKey, PEdge>,
    pub(crate) pfaces: SlotMap<PFaceKey, PFace>,

    // Layer tree
    pub(crate) layers: SlotMap<LayerKey, Layer>,
    pub(crate) root_layers: Vec<LayerKey>,

    pub(crate) ids: IdTable,
    /// Loaded entities whose derived state has not been computed yet.
    pub(crate) underived: FxHashSet<GeometryKey>,
    pub(crate) batch: BatchState,
    pub(crate) observers: Observers,
}

static NEXT_MODEL_TOKEN: AtomicU64 = AtomicU64::new(0);

impl std::fmt::Debug for ModelData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelData")
            .field("vertices", &self.vertices.len())
            .field("edges", &self.edges.len())
            .field("loops", &self.loops.len())
            .field("polylines", &self.polylines.len())
            .field("faces", &self.faces.len())
            .field("volumes", &self.volumes.len())
            .field("proxies", &self.proxies.len())
            .field("geo_references", &self.geo_references.len())
            .field("layers", &self.layers.len())
            .field("batch_depth", &self.batch.depth)
            .finish()
    }
}

impl ModelData {
    /// Creates a new, empty model with the default configuration.
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    /// Creates a new, empty model.
    pub fn with_config(config: KernelConfig) -> Self {
        Self {
            token: NEXT_MODEL_TOKEN.fetch_add(1, Ordering::Relaxed),
            config,
            vertices: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            loops: SlotMap::with_key(),
            polylines: SlotMap::with_key(),
            faces: SlotMap::with_key(),
            volumes: SlotMap::with_key(),
            proxies: SlotMap::with_key(),
            geo_references: SlotMap::with_key(),
            pedges: SlotMap::with_key(),
            pfaces: SlotMap::with_key(),
            layers: SlotMap::with_key(),
            root_layers: Vec::new(),
            ids: IdTable::new(),
            underived: FxHashSet::default(),
            batch: BatchState::default(),
            observers: Observers::default(),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    // --- Per-type access ---

    pub fn vertex(&self, key: VertexKey) -> Option<&Vertex> {
        self.vertices.get(key)
    }

    pub fn edge(&self, key: EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    pub fn edge_loop(&self, key: LoopKey) -> Option<&EdgeLoop> {
        self.loops.get(key)
    }

    pub fn polyline(&self, key: PolylineKey) -> Option<&Polyline> {
        self.polylines.get(key)
    }

    pub fn face(&self, key: FaceKey) -> Option<&Face> {
        self.faces.get(key)
    }

    pub fn volume(&self, key: VolumeKey) -> Option<&Volume> {
        self.volumes.get(key)
    }

    pub fn proxy(&self, key: ProxyKey) -> Option<&ProxyGeometry> {
        self.proxies.get(key)
    }

    pub fn geo_reference(&self, key: GeoReferenceKey) -> Option<&GeoReference> {
        self.geo_references.get(key)
    }

    pub fn pedge(&self, key: PEdgeKey) -> Option<&PEdge> {
        self.pedges.get(key)
    }

    pub fn pface(&self, key: PFaceKey) -> Option<&PFace> {
        self.pfaces.get(key)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    pub fn polyline_count(&self) -> usize {
        self.polylines.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    pub fn geo_reference_count(&self) -> usize {
        self.geo_references.len()
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexKey, &Vertex)> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, &Edge)> {
        self.edges.iter()
    }

    pub fn edge_loops(&self) -> impl Iterator<Item = (LoopKey, &EdgeLoop)> {
        self.loops.iter()
    }

    pub fn polylines(&self) -> impl Iterator<Item = (PolylineKey, &Polyline)> {
        self.polylines.iter()
    }

    pub fn faces(&self) -> impl Iterator<Item = (FaceKey, &Face)> {
        self.faces.iter()
    }

    pub fn volumes(&self) -> impl Iterator<Item = (VolumeKey, &Volume)> {
        self.volumes.iter()
    }

    pub fn proxies(&self) -> impl Iterator<Item = (ProxyKey, &ProxyGeometry)> {
        self.proxies.iter()
    }

    pub fn geo_references(&self) -> impl Iterator<Item = (GeoReferenceKey, &GeoReference)> {
        self.geo_references.iter()
    }

    // --- Generic access ---

    /// Returns `true` if the key references a live geometry of this model.
    pub fn contains_geometry(&self, key: GeometryKey) -> bool {
        match key {
            GeometryKey::Vertex(k) => self.vertices.contains_key(k),
            GeometryKey::Edge(k) => self.edges.contains_key(k),
            GeometryKey::EdgeLoop(k) => self.loops.contains_key(k),
            GeometryKey::Polyline(k) => self.polylines.contains_key(k),
            GeometryKey::Face(k) => self.faces.contains_key(k),
            GeometryKey::Volume(k) => self.volumes.contains_key(k),
            GeometryKey::Proxy(k) => self.proxies.contains_key(k),
        }
    }

    /// Returns the shared state of any geometry.
    pub fn base(&self, key: GeometryKey) -> Option<&GeometryBase> {
        match key {
            GeometryKey::Vertex(k) => self.vertices.get(k).map(|e| &e.base),
            GeometryKey::Edge(k) => self.edges.get(k).map(|e| &e.base),
            GeometryKey::EdgeLoop(k) => self.loops.get(k).map(|e| &e.base),
            GeometryKey::Polyline(k) => self.polylines.get(k).map(|e| &e.base),
            GeometryKey::Face(k) => self.faces.get(k).map(|e| &e.base),
            GeometryKey::Volume(k) => self.volumes.get(k).map(|e| &e.base),
            GeometryKey::Proxy(k) => self.proxies.get(k).map(|e| &e.base),
        }
    }

    pub(crate) fn base_mut(&mut self, key: GeometryKey) -> Option<&mut GeometryBase> {
        match key {
            GeometryKey::Vertex(k) => self.vertices.get_mut(k).map(|e| &mut e.base),
            GeometryKey::Edge(k) => self.edges.get_mut(k).map(|e| &mut e.base),
            GeometryKey::EdgeLoop(k) => self.loops.get_mut(k).map(|e| &mut e.base),
            GeometryKey::Polyline(k) => self.polylines.get_mut(k).map(|e| &mut e.base),
            GeometryKey::Face(k) => self.faces.get_mut(k).map(|e| &mut e.base),
            GeometryKey::Volume(k) => self.volumes.get_mut(k).map(|e| &mut e.base),
            GeometryKey::Proxy(k) => self.proxies.get_mut(k).map(|e| &mut e.base),
        }
    }

    /// Like [`base_mut`](Self::base_mut) but reports missing geometry.
    pub(crate) fn require_base_mut(&mut self, key: GeometryKey) -> Result<&mut GeometryBase> {
        self.base_mut(key).ok_or(Error::MissingGeometry(key))
    }

    /// Keys of all live geometry of one type, in storage order.
    pub fn keys_of_type(&self, ty: GeometryType) -> Vec<GeometryKey> {
        match ty {
            GeometryType::Vertex => self.vertices.keys().map(GeometryKey::Vertex).collect(),
            GeometryType::Edge => self.edges.keys().map(GeometryKey::Edge).collect(),
            GeometryType::EdgeLoop => self.loops.keys().map(GeometryKey::EdgeLoop).collect(),
            GeometryType::Polyline => self.polylines.keys().map(GeometryKey::Polyline).collect(),
            GeometryType::Face => self.faces.keys().map(GeometryKey::Face).collect(),
            GeometryType::Volume => self.volumes.keys().map(GeometryKey::Volume).collect(),
            GeometryType::Proxy => self.proxies.keys().map(GeometryKey::Proxy).collect(),
        }
    }

    /// Keys of all live geometry, grouped by type in sweep order.
    pub fn all_geometry(&self) -> Vec<GeometryKey> {
        GeometryType::SWEEP_ORDER
            .iter()
            .flat_map(|&ty| self.keys_of_type(ty))
            .collect()
    }

    // --- Identity ---

    /// Looks up the geometry owning an identity.
    pub fn geometry_from_id(&self, id: GeometryId) -> Option<GeometryKey> {
        match self.ids.owner(id)? {
            IdOwner::Geometry(key) => Some(key),
            IdOwner::Layer(_) => None,
        }
    }

    /// Looks up the layer owning an identity.
    pub fn layer_from_id(&self, id: GeometryId) -> Option<LayerKey> {
        match self.ids.owner(id)? {
            IdOwner::Layer(key) => Some(key),
            IdOwner::Geometry(_) => None,
        }
    }

    pub fn id_of(&self, key: GeometryKey) -> Option<GeometryId> {
        self.base(key).map(|b| b.id)
    }

    /// Returns the next unused identity, consuming it when `increment` is set.
    pub fn get_free_id(&mut self, increment: bool) -> GeometryId {
        self.ids.get_free_id(increment)
    }

    /// Commits an identity to an owner.
    pub fn register_id(&mut self, id: GeometryId, owner: IdOwner) -> Result<()> {
        self.ids.register_id(id, owner)
    }

    /// Releases an identity from the lookup table.
    pub fn free_id(&mut self, id: GeometryId) -> Option<IdOwner> {
        self.ids.free_id(id)
    }

    /// Resolves the identity for a new entity: explicit ids are registered as
    /// given, otherwise a fresh id is allocated.
    pub(crate) fn claim_id(&mut self, explicit: Option<GeometryId>) -> Result<GeometryId> {
        match explicit {
            Some(id) => {
                if !id.is_valid() {
                    return Err(Error::InvalidId);
                }
                if self.ids.contains(id) {
                    return Err(Error::DuplicateId(id));
                }
                Ok(id)
            }
            None => Ok(self.ids.get_free_id(true)),
        }
    }
}

impl Default for ModelData {
    fn default() -> Self {
        Self::new()
    }
}
