// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Batch operations and change propagation.
//!
//! The model is either idle (depth 0) or batching (depth > 0).
//!
//! - Idle: every notification re-derives the notified entities and their
//!   dependents right away and emits the resulting events.
//! - Batching: notifications only set dirty flags and collection changes are
//!   recorded. The outermost [`ModelData::end_batch`] sweeps the whole model
//!   once and emits one aggregated event per kind, followed by
//!   [`ModelEvent::BatchOperationFinished`].
//!
//! Nothing is rolled back: a failing sweep leaves the edits in place and
//! reports the error to the caller.

use crate::error::{Error, Result};
use crate::events::{GeometryEvent, ModelEvent};
use crate::identity::IdOwner;
use crate::keys::*;
use crate::model::ModelData;

/// Depth counter and collection deltas of the running batch.
#[derive(Debug, Default)]
pub struct BatchState {
    pub(crate) depth: usize,
    pub(crate) added: Vec<GeometryKey>,
    pub(crate) removed: Vec<(GeometryKey, GeometryId)>,
    pub(crate) geo_references: Vec<GeoReferenceKey>,
}

impl BatchState {
    fn clear_deltas(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.geo_references.clear();
    }
}

impl ModelData {
    /// Opens a (possibly nested) batch operation.
    pub fn start_batch(&mut self) {
        if self.batch.depth == 0 {
            self.batch.clear_deltas();
        }
        self.batch.depth += 1;
        tracing::debug!(depth = self.batch.depth, "batch operation started");
    }

    /// Closes a batch operation. The outermost call re-derives the model and
    /// emits the aggregated events.
    pub fn end_batch(&mut self) -> Result<()> {
        if self.batch.depth == 0 {
            return Err(Error::BatchNotStarted);
        }
        self.batch.depth -= 1;
        if self.batch.depth > 0 {
            return Ok(());
        }

        let keys = self.all_geometry();
        let result = self.sweep(&keys, false);
        tracing::debug!(
            entities = keys.len(),
            added = self.batch.added.len(),
            removed = self.batch.removed.len(),
            "batch operation finished"
        );
        self.finish_flush(&keys, result, true)
    }

    /// Current nesting depth of batch operations.
    pub fn batch_depth(&self) -> usize {
        self.batch.depth
    }

    pub fn is_batching(&self) -> bool {
        self.batch.depth > 0
    }

    /// Runs `f` inside a batch operation. The batch is closed even when `f`
    /// fails; an error from `f` takes precedence over one from the sweep.
    pub fn with_batch<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.start_batch();
        let result = f(self);
        let end = self.end_batch();
        let value = result?;
        end?;
        Ok(value)
    }

    /// Reports that positions or other geometric properties of `key` changed.
    pub fn notify_geometry_changed(&mut self, key: GeometryKey) -> Result<()> {
        self.notify_geometry_changed_many(&[key])
    }

    /// Reports a geometry change for several entities at once.
    pub fn notify_geometry_changed_many(&mut self, keys: &[GeometryKey]) -> Result<()> {
        for &key in keys {
            self.require_base_mut(key)?.geometry_changed = true;
        }
        self.flush_if_idle(keys)
    }

    /// Reports that the connectivity of `key` changed.
    pub fn notify_topology_changed(&mut self, key: GeometryKey) -> Result<()> {
        self.require_base_mut(key)?.topology_changed = true;
        self.flush_if_idle(&[key])
    }

    fn flush_if_idle(&mut self, seeds: &[GeometryKey]) -> Result<()> {
        if self.batch.depth > 0 {
            return Ok(());
        }
        let keys = self.dependents_closure(seeds);
        let result = self.sweep(&keys, false);
        self.finish_flush(&keys, result, false)
    }

    /// Emits (or on failure discards) what the sweep over `keys` collected.
    pub(crate) fn finish_flush(
        &mut self,
        keys: &[GeometryKey],
        result: Result<()>,
        batch_finished: bool,
    ) -> Result<()> {
        match &result {
            Ok(()) => self.emit_pending(keys),
            Err(e) => {
                tracing::warn!(error = %e, "re-derivation failed, pending notifications discarded");
                for &key in keys {
                    if let Some(base) = self.base_mut(key) {
                        base.clear_flags();
                    }
                }
                self.batch.clear_deltas();
            }
        }
        if batch_finished {
            self.observers.emit(&ModelEvent::BatchOperationFinished);
        }
        result
    }

    fn emit_pending(&mut self, keys: &[GeometryKey]) {
        let mut topology = Vec::new();
        let mut geometry = Vec::new();
        for &key in keys {
            if let Some(base) = self.base_mut(key) {
                if base.topology_changed {
                    topology.push(key);
                }
                if base.geometry_changed {
                    geometry.push(key);
                }
                base.clear_flags();
            }
        }

        let removed = std::mem::take(&mut self.batch.removed);
        let added = std::mem::take(&mut self.batch.added);
        let mut geo_references = std::mem::take(&mut self.batch.geo_references);
        for (gk, g) in self.geo_references.iter() {
            if geometry.contains(&GeometryKey::Vertex(g.vertex)) && !geo_references.contains(&gk) {
                geo_references.push(gk);
            }
        }

        if !topology.is_empty() {
            self.observers.emit(&ModelEvent::TopologyChanged(topology.clone()));
        }
        if !removed.is_empty() {
            self.observers.emit(&ModelEvent::GeometryRemoved(removed));
        }
        if !added.is_empty() {
            self.observers.emit(&ModelEvent::GeometryAdded(added));
        }
        if !geometry.is_empty() {
            self.observers.emit(&ModelEvent::GeometryChanged(geometry.clone()));
        }
        if !geo_references.is_empty() {
            self.observers
                .emit(&ModelEvent::GeoReferencesChanged(geo_references));
        }

        for key in topology {
            self.observers.emit_geometry(key, GeometryEvent::TopologyChanged);
        }
        for key in geometry {
            self.observers.emit_geometry(key, GeometryEvent::GeometryChanged);
        }
    }

    // --- Collection membership ---

    /// Registers a freshly stored geometry: identity, layer membership and
    /// the `GeometryAdded` notification.
    pub(crate) fn geometry_added(&mut self, key: GeometryKey) -> Result<()> {
        let (id, layer) = self
            .base(key)
            .map(|b| (b.id, b.layer))
            .ok_or(Error::MissingGeometry(key))?;
        self.ids.register_id(id, IdOwner::Geometry(key))?;
        if let Some(l) = self.layers.get_mut(layer) {
            l.elements.push(key);
        }
        tracing::trace!(?key, %id, "geometry added");

        if self.batch.depth > 0 {
            self.batch.added.push(key);
        } else {
            self.observers.emit(&ModelEvent::GeometryAdded(vec![key]));
        }
        Ok(())
    }

    /// Counterpart of [`geometry_added`](Self::geometry_added) for a geometry
    /// that has already been taken out of its collection.
    pub(crate) fn geometry_removed(&mut self, key: GeometryKey, id: GeometryId, layer: LayerKey) {
        self.ids.free_id(id);
        if let Some(l) = self.layers.get_mut(layer) {
            l.elements.retain(|e| *e != key);
        }
        self.observers.forget(key);
        self.underived.remove(&key);
        tracing::trace!(?key, %id, "geometry removed");

        if self.batch.depth > 0 {
            match self.batch.added.iter().position(|k| *k == key) {
                Some(pos) => {
                    self.batch.added.remove(pos);
                }
                None => self.batch.removed.push((key, id)),
            }
        } else {
            self.observers
                .emit(&ModelEvent::GeometryRemoved(vec![(key, id)]));
        }
    }

    /// Records an added, removed or re-anchored geo-reference.
    pub(crate) fn geo_reference_changed(&mut self, key: GeoReferenceKey) {
        if self.batch.depth > 0 {
            if !self.batch.geo_references.contains(&key) {
                self.batch.geo_references.push(key);
            }
        } else {
            self.observers
                .emit(&ModelEvent::GeoReferencesChanged(vec![key]));
        }
    }
}
