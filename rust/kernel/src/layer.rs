// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hierarchical layers.
//!
//! Layers group geometry and pass visibility and color down the tree: a layer
//! is actually visible only if it and all its ancestors are visible, and a
//! layer whose color is inherited shows its parent's effective color. Layers
//! share the identity space with geometry.

use crate::color::{Color, DerivedColor};
use crate::error::{Error, Result};
use crate::identity::IdOwner;
use crate::keys::*;
use crate::model::ModelData;

/// A node of the layer tree.
#[derive(Debug, Clone)]
pub struct Layer {
    pub id: GeometryId,
    pub name: String,
    pub parent: Option<LayerKey>,
    pub children: Vec<LayerKey>,
    pub is_visible: bool,
    pub color: DerivedColor,
    /// Geometry assigned to this layer.
    pub elements: Vec<GeometryKey>,
}

/// A layer handle bound to the model that issued it.
///
/// Slot-map keys of two models overlap, so a bare [`LayerKey`] cannot tell
/// which model it came from. Cross-model moves are rejected by comparing the
/// model tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerRef {
    model: u64,
    key: LayerKey,
}

impl LayerRef {
    pub fn key(&self) -> LayerKey {
        self.key
    }
}

impl ModelData {
    /// Handle to one of this model's layers, for [`ModelData::set_layer`].
    pub fn layer_ref(&self, key: LayerKey) -> Option<LayerRef> {
        self.layers.contains_key(key).then_some(LayerRef {
            model: self.token,
            key,
        })
    }

    /// Adds a layer below `parent`, or as a root layer.
    pub fn add_layer(&mut self, name: &str, parent: Option<LayerKey>) -> Result<LayerKey> {
        self.add_layer_with_id(name, parent, None)
    }

    /// Adds a layer with an explicit identity (used when loading).
    pub fn add_layer_with_id(
        &mut self,
        name: &str,
        parent: Option<LayerKey>,
        id: Option<GeometryId>,
    ) -> Result<LayerKey> {
        if let Some(p) = parent {
            if !self.layers.contains_key(p) {
                return Err(Error::LayerNotInModel(p));
            }
        }
        let id = self.claim_id(id)?;
        let key = self.layers.insert(Layer {
            id,
            name: name.to_string(),
            parent,
            children: Vec::new(),
            is_visible: true,
            color: if parent.is_some() {
                DerivedColor::inherited()
            } else {
                DerivedColor::local(Color::BLACK)
            },
            elements: Vec::new(),
        });
        self.ids.register_id(id, IdOwner::Layer(key))?;

        match parent {
            Some(p) => self.layers[p].children.push(key),
            None => self.root_layers.push(key),
        }
        Ok(key)
    }

    /// Removes an empty layer without children.
    pub fn remove_layer(&mut self, key: LayerKey) -> Result<()> {
        let layer = self.layers.get(key).ok_or(Error::LayerNotInModel(key))?;
        if !layer.elements.is_empty() || !layer.children.is_empty() {
            return Err(Error::LayerNotEmpty(key));
        }
        let (id, parent) = (layer.id, layer.parent);
        match parent {
            Some(p) => {
                if let Some(parent) = self.layers.get_mut(p) {
                    parent.children.retain(|c| *c != key);
                }
            }
            None => self.root_layers.retain(|c| *c != key),
        }
        self.layers.remove(key);
        self.ids.free_id(id);
        Ok(())
    }

    pub fn layer(&self, key: LayerKey) -> Option<&Layer> {
        self.layers.get(key)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn root_layers(&self) -> &[LayerKey] {
        &self.root_layers
    }

    /// Geometry assigned to a layer (not including child layers).
    pub fn layer_elements(&self, key: LayerKey) -> &[GeometryKey] {
        self.layers
            .get(key)
            .map(|l| l.elements.as_slice())
            .unwrap_or(&[])
    }

    /// `true` if the layer and all of its ancestors are visible.
    pub fn layer_is_visible(&self, key: LayerKey) -> bool {
        let mut current = Some(key);
        while let Some(k) = current {
            match self.layers.get(k) {
                Some(layer) if layer.is_visible => current = layer.parent,
                _ => return false,
            }
        }
        true
    }

    /// Effective color of a layer after inheritance.
    pub fn layer_color(&self, key: LayerKey) -> Option<Color> {
        let layer = self.layers.get(key)?;
        let parent = layer.parent.and_then(|p| self.layer_color(p));
        Some(layer.color.resolve(parent))
    }

    pub fn set_layer_visibility(&mut self, key: LayerKey, visible: bool) -> Result<()> {
        let layer = self.layers.get_mut(key).ok_or(Error::LayerNotInModel(key))?;
        if layer.is_visible == visible {
            return Ok(());
        }
        layer.is_visible = visible;
        self.notify_layer_subtree(key)
    }

    pub fn set_layer_color(&mut self, key: LayerKey, color: DerivedColor) -> Result<()> {
        let layer = self.layers.get_mut(key).ok_or(Error::LayerNotInModel(key))?;
        if layer.color == color {
            return Ok(());
        }
        layer.color = color;
        self.notify_layer_subtree(key)
    }

    /// `true` if the geometry and its layer chain are visible.
    pub fn is_actually_visible(&self, key: GeometryKey) -> bool {
        self.base(key)
            .map(|b| b.is_visible && self.layer_is_visible(b.layer))
            .unwrap_or(false)
    }

    /// Effective color of a geometry after inheritance from its layer.
    pub fn effective_color(&self, key: GeometryKey) -> Option<Color> {
        let base = self.base(key)?;
        Some(base.color.resolve(self.layer_color(base.layer)))
    }

    /// Moves a geometry to another layer of the same model.
    ///
    /// Fails with [`Error::LayerNotInModel`] if `layer` was issued by a
    /// different model or has been removed.
    pub fn set_layer(&mut self, key: GeometryKey, layer: LayerRef) -> Result<()> {
        let LayerRef { model, key: layer } = layer;
        if model != self.token || !self.layers.contains_key(layer) {
            return Err(Error::LayerNotInModel(layer));
        }
        let base = self.require_base_mut(key)?;
        let old = base.layer;
        if old == layer {
            return Ok(());
        }
        base.layer = layer;
        if let Some(old_layer) = self.layers.get_mut(old) {
            old_layer.elements.retain(|e| *e != key);
        }
        self.layers[layer].elements.push(key);
        self.notify_geometry_changed(key)
    }

    /// Layers of the subtree rooted at `key`, parents before children.
    pub(crate) fn layer_subtree(&self, key: LayerKey) -> Vec<LayerKey> {
        let mut out = vec![key];
        let mut i = 0;
        while i < out.len() {
            if let Some(layer) = self.layers.get(out[i]) {
                out.extend(layer.children.iter().copied());
            }
            i += 1;
        }
        out
    }

    fn notify_layer_subtree(&mut self, key: LayerKey) -> Result<()> {
        let members: Vec<GeometryKey> = self
            .layer_subtree(key)
            .into_iter()
            .flat_map(|l| self.layer_elements(l).to_vec())
            .collect();
        if members.is_empty() {
            return Ok(());
        }
        self.notify_geometry_changed_many(&members)
    }
}
