// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross-model geometry references.
//!
//! A [`GeometryReference`] names a geometry by `(model, identity)` and may
//! outlive both: the target model can be unloaded and loaded again. The
//! reference resolves lazily against a [`ModelRegistry`] and is re-resolved
//! when the registry reports that its model came or went.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::events::ModelEvent;
use crate::keys::{GeometryId, GeometryKey, SubscriptionKey};
use crate::model::ModelData;

/// Identity of a model inside a [`ModelRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub u64);

/// Registry change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEvent {
    ModelAdded(ModelId),
    ModelRemoved(ModelId),
}

type RegistryHandler = Box<dyn FnMut(&RegistryEvent)>;

/// Loaded models, keyed by [`ModelId`].
#[derive(Default)]
pub struct ModelRegistry {
    models: FxHashMap<ModelId, ModelData>,
    observers: SlotMap<SubscriptionKey, RegistryHandler>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.models.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a model and reports it.
    pub fn insert(&mut self, id: ModelId, model: ModelData) {
        if self.models.insert(id, model).is_some() {
            self.emit(RegistryEvent::ModelRemoved(id));
        }
        tracing::debug!(model = id.0, "model registered");
        self.emit(RegistryEvent::ModelAdded(id));
    }

    /// Takes a model out of the registry.
    pub fn remove(&mut self, id: ModelId) -> Option<ModelData> {
        let model = self.models.remove(&id)?;
        tracing::debug!(model = id.0, "model unregistered");
        self.emit(RegistryEvent::ModelRemoved(id));
        Some(model)
    }

    pub fn get(&self, id: ModelId) -> Option<&ModelData> {
        self.models.get(&id)
    }

    pub fn get_mut(&mut self, id: ModelId) -> Option<&mut ModelData> {
        self.models.get_mut(&id)
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.models.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&RegistryEvent) + 'static) -> SubscriptionKey {
        self.observers.insert(Box::new(handler))
    }

    pub fn unsubscribe(&mut self, sub: SubscriptionKey) -> bool {
        self.observers.remove(sub).is_some()
    }

    fn emit(&mut self, event: RegistryEvent) {
        for handler in self.observers.values_mut() {
            handler(&event);
        }
    }
}

/// Lazy reference to a geometry of a possibly unloaded model.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryReference {
    pub model: ModelId,
    pub geometry: GeometryId,
    /// Last known name of the target, kept while it is unresolved.
    pub name: String,
    target: Option<GeometryKey>,
}

impl GeometryReference {
    pub fn new(model: ModelId, geometry: GeometryId, name: impl Into<String>) -> Self {
        Self {
            model,
            geometry,
            name: name.into(),
            target: None,
        }
    }

    /// The resolved geometry, if its model is loaded and contains it.
    pub fn target(&self) -> Option<GeometryKey> {
        self.target
    }

    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }

    /// Looks the target up in the registry and refreshes the cached name.
    pub fn resolve(&mut self, registry: &ModelRegistry) -> Option<GeometryKey> {
        let target = registry
            .get(self.model)
            .and_then(|model| self.lookup(model));
        self.target = target;
        target
    }

    /// Re-resolves after a registry change concerning this reference's model.
    pub fn handle_registry_event(&mut self, event: &RegistryEvent, registry: &ModelRegistry) {
        match *event {
            RegistryEvent::ModelAdded(id) if id == self.model => {
                self.resolve(registry);
            }
            RegistryEvent::ModelRemoved(id) if id == self.model => {
                self.target = None;
            }
            _ => {}
        }
    }

    /// Follows add/remove notifications of the referenced model.
    pub fn handle_model_event(&mut self, event: &ModelEvent, model: &ModelData) {
        match event {
            ModelEvent::GeometryRemoved(removed)
                if removed.iter().any(|(_, id)| *id == self.geometry) =>
            {
                self.target = None;
            }
            ModelEvent::GeometryAdded(_) if self.target.is_none() => {
                let target = self.lookup(model);
                self.target = target;
            }
            _ => {}
        }
    }

    fn lookup(&mut self, model: &ModelData) -> Option<GeometryKey> {
        let key = model.geometry_from_id(self.geometry)?;
        if let Some(base) = model.base(key) {
            self.name.clone_from(&base.name);
        }
        Some(key)
    }
}
