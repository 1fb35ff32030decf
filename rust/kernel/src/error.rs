// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for geometry model operations.

use crate::keys::{
    EdgeKey, FaceKey, GeoReferenceKey, GeometryId, GeometryKey, LayerKey, LoopKey, VertexKey,
};

/// Result type alias for geometry model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed construction input.
    InvalidArgument,
    /// Structurally illegal mutation given the current model state.
    InvalidOperation,
}

/// Errors that can occur during geometry model operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An edge was given a vertex list of the wrong length.
    #[error("an edge needs exactly 2 vertices, got {0}")]
    WrongVertexCount(usize),

    /// Both vertices of an edge are the same vertex.
    #[error("edge vertices must be distinct, got {0:?} twice")]
    DegenerateEdge(VertexKey),

    /// A referenced geometry does not exist in the model.
    #[error("geometry not found in model: {0:?}")]
    MissingGeometry(GeometryKey),

    /// A referenced layer does not exist in the model.
    #[error("layer not found in model: {0:?}")]
    MissingLayer(LayerKey),

    /// A referenced geo-reference does not exist in the model.
    #[error("geo-reference not found in model: {0:?}")]
    MissingGeoReference(GeoReferenceKey),

    /// An edge container was given too few edges.
    #[error("expected at least {min} edges, got {got}")]
    TooFewEdges { min: usize, got: usize },

    /// The same edge appears twice in an edge set.
    #[error("edge {0:?} appears more than once")]
    DuplicateEdge(EdgeKey),

    /// Edges given to a loop constructor do not form one closed cycle.
    #[error("edges do not form a closed loop")]
    NotAClosedLoop,

    /// A volume must reference at least one face.
    #[error("a volume needs at least one face")]
    EmptyVolume,

    /// The same face appears twice in a volume.
    #[error("face {0:?} appears more than once in the volume")]
    DuplicateFace(FaceKey),

    /// The reserved invalid identity was passed where a real one is required.
    #[error("the reserved identity u64::MAX cannot be registered")]
    InvalidId,

    /// Proxy mesh data is malformed.
    #[error("invalid proxy mesh: {0}")]
    InvalidMesh(String),

    /// A layer from outside this model was used.
    #[error("layer {0:?} is not part of this model")]
    LayerNotInModel(LayerKey),

    /// A face references a hole loop that is no longer stored in the model.
    #[error("hole loop {0:?} not part of model; did you delete a loop without detaching it?")]
    HoleLoopNotInModel(LoopKey),

    /// An identity is already registered.
    #[error("identity {0} is already in use")]
    DuplicateId(GeometryId),

    /// An existing loop no longer forms a closed cycle after an edit.
    #[error("loop {0:?} no longer forms a closed loop")]
    LoopBroken(LoopKey),

    /// A vertex is shared by more than two polyline edges.
    #[error("polyline branches at vertex {0:?}")]
    BranchingPolyline(VertexKey),

    /// Polyline edges form more than one connected chain.
    #[error("polyline edges are not connected")]
    DisconnectedPolyline,

    /// Removal rejected because other geometry still references the target.
    #[error("{key:?} is still referenced by {} dependent(s)", .dependents.len())]
    InUse {
        key: GeometryKey,
        dependents: Vec<GeometryKey>,
    },

    /// `end_batch` was called without a matching `start_batch`.
    #[error("no batch operation is running")]
    BatchNotStarted,

    /// The operation is not allowed while a batch operation is running.
    #[error("operation not allowed while a batch operation is running")]
    BatchInProgress,

    /// A layer still has members or child layers.
    #[error("layer {0:?} still has members or child layers")]
    LayerNotEmpty(LayerKey),

    /// The given element is not a member of the container.
    #[error("{member:?} is not a member of {container:?}")]
    NotAMember {
        container: GeometryKey,
        member: GeometryKey,
    },
}

impl Error {
    /// Returns the taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::WrongVertexCount(_)
            | Error::DegenerateEdge(_)
            | Error::MissingGeometry(_)
            | Error::MissingLayer(_)
            | Error::MissingGeoReference(_)
            | Error::TooFewEdges { .. }
            | Error::DuplicateEdge(_)
            | Error::NotAClosedLoop
            | Error::EmptyVolume
            | Error::DuplicateFace(_)
            | Error::InvalidId
            | Error::InvalidMesh(_) => ErrorKind::InvalidArgument,

            Error::LayerNotInModel(_)
            | Error::HoleLoopNotInModel(_)
            | Error::DuplicateId(_)
            | Error::LoopBroken(_)
            | Error::BranchingPolyline(_)
            | Error::DisconnectedPolyline
            | Error::InUse { .. }
            | Error::BatchNotStarted
            | Error::BatchInProgress
            | Error::LayerNotEmpty(_)
            | Error::NotAMember { .. } => ErrorKind::InvalidOperation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_errors_are_invalid_argument() {
        assert_eq!(Error::WrongVertexCount(3).kind(), ErrorKind::InvalidArgument);
        assert_eq!(Error::NotAClosedLoop.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            Error::TooFewEdges { min: 3, got: 2 }.kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn state_errors_are_invalid_operation() {
        assert_eq!(
            Error::DuplicateId(GeometryId(7)).kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(Error::DisconnectedPolyline.kind(), ErrorKind::InvalidOperation);
        assert_eq!(Error::BatchNotStarted.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn messages_are_readable() {
        let msg = Error::TooFewEdges { min: 3, got: 1 }.to_string();
        assert_eq!(msg, "expected at least 3 edges, got 1");
        assert_eq!(
            Error::DuplicateId(GeometryId(12)).to_string(),
            "identity 12 is already in use"
        );
    }
}
