// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key and identity types for the geometry model.
//!
//! Entities live in slot maps and reference each other through type-safe,
//! generational keys. Independently of the storage key, every geometry and
//! every layer owns a model-unique [`GeometryId`] that collaborators (file
//! loaders, association layers) use to address it.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Key for a vertex (point in 3D space).
    pub struct VertexKey;

    /// Key for an edge (line segment between two vertices).
    pub struct EdgeKey;

    /// Key for a closed edge loop.
    pub struct LoopKey;

    /// Key for an open polyline.
    pub struct PolylineKey;

    /// Key for a planar face.
    pub struct FaceKey;

    /// Key for a volume (set of oriented faces).
    pub struct VolumeKey;

    /// Key for a proxy mesh attached to a vertex.
    pub struct ProxyKey;

    /// Key for a geo-coordinate anchor.
    pub struct GeoReferenceKey;

    /// Key for a layer.
    pub struct LayerKey;

    /// Key for the use of an edge inside a loop or polyline.
    pub struct PEdgeKey;

    /// Key for the use of a face inside a volume.
    pub struct PFaceKey;

    /// Key for an event subscription.
    pub struct SubscriptionKey;
}

/// Model-unique identity shared by geometry and layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeometryId(pub u64);

impl GeometryId {
    /// Reserved identity that never refers to a live entity.
    pub const INVALID: GeometryId = GeometryId(u64::MAX);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for GeometryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A key that can reference any geometry entity stored in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKey {
    Vertex(VertexKey),
    Edge(EdgeKey),
    EdgeLoop(LoopKey),
    Polyline(PolylineKey),
    Face(FaceKey),
    Volume(VolumeKey),
    Proxy(ProxyKey),
}

impl GeometryKey {
    /// Returns the geometry type of this key.
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            GeometryKey::Vertex(_) => GeometryType::Vertex,
            GeometryKey::Edge(_) => GeometryType::Edge,
            GeometryKey::EdgeLoop(_) => GeometryType::EdgeLoop,
            GeometryKey::Polyline(_) => GeometryType::Polyline,
            GeometryKey::Face(_) => GeometryType::Face,
            GeometryKey::Volume(_) => GeometryType::Volume,
            GeometryKey::Proxy(_) => GeometryType::Proxy,
        }
    }
}

/// Discriminant for geometry types.
///
/// The declaration order is the order in which the consistency sweep visits
/// the per-type collections, so derived state is always computed after the
/// state it depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryType {
    Vertex = 0,
    Edge = 1,
    EdgeLoop = 2,
    Face = 3,
    Volume = 4,
    Proxy = 5,
    Polyline = 6,
}

impl GeometryType {
    /// All geometry types in sweep order.
    pub const SWEEP_ORDER: [GeometryType; 7] = [
        GeometryType::Vertex,
        GeometryType::Edge,
        GeometryType::EdgeLoop,
        GeometryType::Face,
        GeometryType::Volume,
        GeometryType::Proxy,
        GeometryType::Polyline,
    ];

    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Vertex => "Vertex",
            GeometryType::Edge => "Edge",
            GeometryType::EdgeLoop => "EdgeLoop",
            GeometryType::Face => "Face",
            GeometryType::Volume => "Volume",
            GeometryType::Proxy => "ProxyGeometry",
            GeometryType::Polyline => "Polyline",
        }
    }
}

impl std::fmt::Display for GeometryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The container a [`PEdge`](crate::model::PEdge) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeContainerKey {
    Loop(LoopKey),
    Polyline(PolylineKey),
}

impl From<EdgeContainerKey> for GeometryKey {
    fn from(k: EdgeContainerKey) -> Self {
        match k {
            EdgeContainerKey::Loop(l) => GeometryKey::EdgeLoop(l),
            EdgeContainerKey::Polyline(p) => GeometryKey::Polyline(p),
        }
    }
}

// Conversion impls from specific keys to GeometryKey
impl From<VertexKey> for GeometryKey {
    fn from(k: VertexKey) -> Self {
        GeometryKey::Vertex(k)
    }
}

impl From<EdgeKey> for GeometryKey {
    fn from(k: EdgeKey) -> Self {
        GeometryKey::Edge(k)
    }
}

impl From<LoopKey> for GeometryKey {
    fn from(k: LoopKey) -> Self {
        GeometryKey::EdgeLoop(k)
    }
}

impl From<PolylineKey> for GeometryKey {
    fn from(k: PolylineKey) -> Self {
        GeometryKey::Polyline(k)
    }
}

impl From<FaceKey> for GeometryKey {
    fn from(k: FaceKey) -> Self {
        GeometryKey::Face(k)
    }
}

impl From<VolumeKey> for GeometryKey {
    fn from(k: VolumeKey) -> Self {
        GeometryKey::Volume(k)
    }
}

impl From<ProxyKey> for GeometryKey {
    fn from(k: ProxyKey) -> Self {
        GeometryKey::Proxy(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_type_names() {
        assert_eq!(GeometryType::Vertex.as_str(), "Vertex");
        assert_eq!(GeometryType::EdgeLoop.as_str(), "EdgeLoop");
        assert_eq!(GeometryType::Proxy.to_string(), "ProxyGeometry");
    }

    #[test]
    fn sweep_order_follows_dependencies() {
        let order = GeometryType::SWEEP_ORDER;
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(order[0], GeometryType::Vertex);
        assert_eq!(order[6], GeometryType::Polyline);
    }

    #[test]
    fn invalid_id_is_reserved() {
        assert!(!GeometryId::INVALID.is_valid());
        assert!(GeometryId(0).is_valid());
        assert_eq!(GeometryId(42).to_string(), "42");
    }
}
