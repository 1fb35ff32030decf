// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change notification.
//!
//! Two kinds of observer are registered on the model:
//! - model-wide handlers receive every [`ModelEvent`],
//! - per-entity handlers receive [`GeometryEvent`]s for one geometry only.
//!
//! Handlers run synchronously on the thread that performed the edit. They get
//! the event by reference and cannot reach back into the model; collaborators
//! that need to react with further edits queue the work and apply it after the
//! call returns.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::keys::{GeoReferenceKey, GeometryId, GeometryKey, SubscriptionKey};
use crate::model::ModelData;

/// Model-wide change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Geometry was added to the per-type collections.
    GeometryAdded(Vec<GeometryKey>),
    /// Geometry was removed. Keys are stale; the identity is included so
    /// collaborators can clean up id-based associations.
    GeometryRemoved(Vec<(GeometryKey, GeometryId)>),
    /// Positions or other geometric properties changed.
    GeometryChanged(Vec<GeometryKey>),
    /// Connectivity changed.
    TopologyChanged(Vec<GeometryKey>),
    /// Geo-references were added, removed, or their anchor moved.
    GeoReferencesChanged(Vec<GeoReferenceKey>),
    /// The outermost batch operation finished.
    BatchOperationFinished,
}

/// Per-entity change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryEvent {
    GeometryChanged,
    TopologyChanged,
}

type ModelHandler = Box<dyn FnMut(&ModelEvent)>;
type GeometryHandler = Box<dyn FnMut(GeometryKey, GeometryEvent)>;

enum Handler {
    Model(ModelHandler),
    Geometry(GeometryKey, GeometryHandler),
}

/// Observer registry. Both kinds of handler share one key space.
#[derive(Default)]
pub struct Observers {
    handlers: SlotMap<SubscriptionKey, Handler>,
    by_geometry: FxHashMap<GeometryKey, Vec<SubscriptionKey>>,
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("handlers", &self.handlers.len())
            .field("watched_geometry", &self.by_geometry.len())
            .finish()
    }
}

impl Observers {
    pub(crate) fn emit(&mut self, event: &ModelEvent) {
        for handler in self.handlers.values_mut() {
            if let Handler::Model(handler) = handler {
                handler(event);
            }
        }
    }

    pub(crate) fn emit_geometry(&mut self, key: GeometryKey, event: GeometryEvent) {
        let Some(subs) = self.by_geometry.get(&key) else {
            return;
        };
        for sub in subs {
            if let Some(Handler::Geometry(_, handler)) = self.handlers.get_mut(*sub) {
                handler(key, event);
            }
        }
    }

    /// Drops all per-entity handlers of a removed geometry.
    pub(crate) fn forget(&mut self, key: GeometryKey) {
        if let Some(subs) = self.by_geometry.remove(&key) {
            for sub in subs {
                self.handlers.remove(sub);
            }
        }
    }
}

impl ModelData {
    /// Registers a model-wide handler.
    pub fn subscribe(&mut self, handler: impl FnMut(&ModelEvent) + 'static) -> SubscriptionKey {
        self.observers.handlers.insert(Handler::Model(Box::new(handler)))
    }

    /// Registers a handler for one geometry. The subscription ends when the
    /// geometry is removed.
    pub fn subscribe_geometry(
        &mut self,
        key: GeometryKey,
        handler: impl FnMut(GeometryKey, GeometryEvent) + 'static,
    ) -> Option<SubscriptionKey> {
        if !self.contains_geometry(key) {
            return None;
        }
        let sub = self
            .observers
            .handlers
            .insert(Handler::Geometry(key, Box::new(handler)));
        self.observers.by_geometry.entry(key).or_default().push(sub);
        Some(sub)
    }

    /// Removes a subscription of either kind. Returns `false` if it was unknown.
    pub fn unsubscribe(&mut self, sub: SubscriptionKey) -> bool {
        match self.observers.handlers.remove(sub) {
            None => false,
            Some(Handler::Model(_)) => true,
            Some(Handler::Geometry(key, _)) => {
                if let Some(subs) = self.observers.by_geometry.get_mut(&key) {
                    subs.retain(|s| *s != sub);
                    if subs.is_empty() {
                        self.observers.by_geometry.remove(&key);
                    }
                }
                true
            }
        }
    }
}
