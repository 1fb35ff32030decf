// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # PlantGeo Kernel
//!
//! Boundary-representation geometry store for building and plant models.
//!
//! Vertices, edges, closed loops, open polylines, planar faces and volumes
//! live in slot maps owned by [`ModelData`] and reference each other through
//! typed keys. Back-reference lists give O(1) upward traversal without
//! implying ownership.
//!
//! Edits go through the model. Outside a batch operation every edit
//! re-derives the affected state (loop order, face normals, volume
//! orientation) and notifies observers right away. Between
//! [`ModelData::start_batch`] and the matching [`ModelData::end_batch`] the
//! model only records what changed, then re-derives everything once and emits
//! one aggregated event per kind.
//!
//! ```
//! use nalgebra::{Point3, Vector3};
//! use plantgeo_kernel::{GeometricOrientation, GeometryInfo, ModelData};
//!
//! let mut model = ModelData::new();
//! let layer = model.add_layer("Layer 0", None).unwrap();
//!
//! let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)].map(|(x, y)| {
//!     model
//!         .add_vertex(GeometryInfo::new(layer, "Vertex {0}"), Point3::new(x, y, 0.0))
//!         .unwrap()
//! });
//! let edges: Vec<_> = (0..4)
//!     .map(|i| {
//!         model
//!             .add_edge(GeometryInfo::new(layer, "Edge {0}"), &[corners[i], corners[(i + 1) % 4]])
//!             .unwrap()
//!     })
//!     .collect();
//!
//! let boundary = model.add_edge_loop(GeometryInfo::new(layer, "Loop {0}"), &edges).unwrap();
//! let face = model
//!     .add_face(GeometryInfo::new(layer, "Face {0}"), boundary, &[], GeometricOrientation::Forward)
//!     .unwrap();
//!
//! assert_eq!(model.face_normal(face), Some(Vector3::new(0.0, 0.0, 1.0)));
//! ```

pub mod batch;
pub mod color;
pub mod config;
pub mod consistency;
pub mod construction;
pub mod editing;
pub mod error;
pub mod events;
pub mod geometry;
pub mod georef;
pub mod identity;
pub mod keys;
pub mod layer;
pub mod model;
pub mod ordering;
pub mod proxy;
pub mod reference;
pub mod removal;
pub mod spatial;
pub mod transform;
pub mod traversal;

pub use batch::BatchState;
pub use color::{Color, DerivedColor};
pub use config::KernelConfig;
pub use construction::{make_quad_loop, GeometryInfo};
pub use error::{Error, ErrorKind, Result};
pub use events::{GeometryEvent, ModelEvent};
pub use geometry::newell;
pub use identity::{IdOwner, IdTable};
pub use keys::{
    EdgeContainerKey, EdgeKey, FaceKey, GeoReferenceKey, GeometryId, GeometryKey, GeometryType,
    LayerKey, LoopKey, PEdgeKey, PFaceKey, PolylineKey, ProxyKey, SubscriptionKey, VertexKey,
    VolumeKey,
};
pub use layer::{Layer, LayerRef};
pub use model::{
    Edge, EdgeLoop, Face, GeoReference, GeometricOrientation, GeometryBase, ModelData, PEdge,
    PFace, Polyline, ProxyGeometry, Vertex, Volume,
};
pub use ordering::{EdgeOrder, OrientedEdge};
pub use proxy::ProxyMesh;
pub use reference::{GeometryReference, ModelId, ModelRegistry, RegistryEvent};
pub use spatial::VertexIndex;
