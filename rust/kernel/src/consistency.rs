// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Re-derivation of dependent state.
//!
//! Each entity type has a `make_consistent` step that looks at its own dirty
//! flags and those of the entities it references, rebuilds its derived state
//! (loop order, face normal, volume orientation flag, proxy transform) and
//! propagates the flags upward so the flush can report it. Steps run in
//! [`GeometryType::SWEEP_ORDER`], so an entity is always visited after
//! everything it depends on.

use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::ModelData;

/// Dirty flags aggregated over a set of referenced entities.
#[derive(Debug, Clone, Copy, Default)]
struct Dirty {
    geometry: bool,
    topology: bool,
}

impl Dirty {
    fn any(self) -> bool {
        self.geometry || self.topology
    }
}

impl ModelData {
    /// Re-derives the state of every entity and reports what changed.
    ///
    /// Used after loading entities with explicit identities and after bulk
    /// structural changes. Not allowed while a batch operation is running.
    pub fn make_consistent(&mut self) -> Result<()> {
        if self.batch.depth > 0 {
            return Err(Error::BatchInProgress);
        }
        let keys = self.all_geometry();
        let result = self.sweep(&keys, true);
        self.finish_flush(&keys, result, false)
    }

    /// Runs the per-entity step over `keys`, which must be in sweep order.
    pub(crate) fn sweep(&mut self, keys: &[GeometryKey], force: bool) -> Result<()> {
        tracing::debug!(count = keys.len(), force, "consistency sweep");
        for &key in keys {
            let forced = force || self.underived.contains(&key);
            self.make_consistent_entity(key, forced)?;
            self.underived.remove(&key);
        }
        Ok(())
    }

    fn make_consistent_entity(&mut self, key: GeometryKey, forced: bool) -> Result<()> {
        tracing::trace!(?key, forced, "make consistent");
        match key {
            GeometryKey::Vertex(_) => Ok(()),
            GeometryKey::Edge(k) => {
                let dirty = self.dirty_of(&self.references(key));
                if dirty.geometry {
                    if let Some(edge) = self.edges.get_mut(k) {
                        edge.base.geometry_changed = true;
                    }
                }
                Ok(())
            }
            GeometryKey::EdgeLoop(k) => self.make_loop_consistent(k, forced),
            GeometryKey::Polyline(k) => self.make_polyline_consistent(k, forced),
            GeometryKey::Face(k) => self.make_face_consistent(k, forced),
            GeometryKey::Volume(k) => {
                let dirty = self.dirty_of(&self.references(key));
                let own = self.base(key).is_some_and(|b| b.is_dirty());
                if forced || own || dirty.any() {
                    let flipped = self.update_volume_orientation(k);
                    self.propagate(key, dirty.geometry, dirty.topology || flipped);
                }
                Ok(())
            }
            GeometryKey::Proxy(k) => {
                let dirty = self.dirty_of(&self.references(key));
                let own = self.base(key).is_some_and(|b| b.is_dirty());
                if forced || own || dirty.geometry {
                    self.update_proxy_transform(k);
                    self.propagate(key, dirty.geometry, false);
                }
                Ok(())
            }
        }
    }

    /// Orders a loaded loop ahead of the sweep. No-op for loops that have
    /// already been derived.
    pub(crate) fn derive_loaded_loop(&mut self, key: LoopKey) -> Result<()> {
        if !self.underived.contains(&GeometryKey::EdgeLoop(key)) {
            return Ok(());
        }
        let container = EdgeContainerKey::Loop(key);
        let edges = self.container_edges(container);
        let order = self.order_loop(&edges)?;
        if !order.is_loop {
            return Err(Error::LoopBroken(key));
        }
        self.apply_order(container, &order.edges, true);
        self.underived.remove(&GeometryKey::EdgeLoop(key));
        Ok(())
    }

    fn make_loop_consistent(&mut self, key: LoopKey, forced: bool) -> Result<()> {
        let container = EdgeContainerKey::Loop(key);
        let edges = self.container_edges(container);
        let dirty = self.dirty_of(&edge_keys(&edges));
        let own_topology = self.loops.get(key).is_some_and(|l| l.base.topology_changed);

        if forced || own_topology || dirty.topology {
            let order = self.order_loop(&edges)?;
            if !order.is_loop {
                tracing::warn!(edge_loop = ?key, "loop no longer closes");
                return Err(Error::LoopBroken(key));
            }
            self.apply_order(container, &order.edges, true);
        }
        self.propagate(key.into(), dirty.geometry, dirty.topology);
        Ok(())
    }

    fn make_polyline_consistent(&mut self, key: PolylineKey, forced: bool) -> Result<()> {
        let container = EdgeContainerKey::Polyline(key);
        let edges = self.container_edges(container);
        let dirty = self.dirty_of(&edge_keys(&edges));
        let own_topology = self
            .polylines
            .get(key)
            .is_some_and(|p| p.base.topology_changed);

        if forced || own_topology || dirty.topology {
            let order = self.order_path(&edges)?;
            if let Some(polyline) = self.polylines.get_mut(key) {
                polyline.is_closed = order.is_loop;
            }
            self.apply_order(container, &order.edges, order.is_loop);
        }
        self.propagate(key.into(), dirty.geometry, dirty.topology);
        Ok(())
    }

    fn make_face_consistent(&mut self, key: FaceKey, forced: bool) -> Result<()> {
        let dirty = self.dirty_of(&self.references(key.into()));
        let own = self.faces.get(key).is_some_and(|f| f.base.is_dirty());
        if forced || own || dirty.any() {
            let changed = self.update_face_normal(key)?;
            self.propagate(key.into(), changed || dirty.any(), dirty.topology);
        }
        Ok(())
    }

    /// Union of the dirty flags of `keys`.
    fn dirty_of(&self, keys: &[GeometryKey]) -> Dirty {
        keys.iter()
            .filter_map(|k| self.base(*k))
            .fold(Dirty::default(), |acc, b| Dirty {
                geometry: acc.geometry || b.geometry_changed,
                topology: acc.topology || b.topology_changed,
            })
    }

    fn propagate(&mut self, key: GeometryKey, geometry: bool, topology: bool) {
        if let Some(base) = self.base_mut(key) {
            base.geometry_changed |= geometry;
            base.topology_changed |= topology;
        }
    }
}

fn edge_keys(edges: &[EdgeKey]) -> Vec<GeometryKey> {
    edges.iter().map(|e| GeometryKey::Edge(*e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::GeometryInfo;
    use crate::model::GeometricOrientation;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn make_consistent_rejected_during_batch() {
        let mut model = ModelData::new();
        model.start_batch();
        assert!(matches!(model.make_consistent(), Err(Error::BatchInProgress)));
        model.end_batch().unwrap();
        model.make_consistent().unwrap();
    }

    #[test]
    fn loaded_face_gets_its_normal() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let v: Vec<_> = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| {
                model
                    .add_vertex(GeometryInfo::new(layer, "V"), Point3::new(x, y, 0.0))
                    .unwrap()
            })
            .collect();
        let edges: Vec<_> = (0..3)
            .map(|i| {
                model
                    .add_edge(GeometryInfo::new(layer, "E"), &[v[i], v[(i + 1) % 3]])
                    .unwrap()
            })
            .collect();

        model.start_batch();
        let l = model
            .add_edge_loop(GeometryInfo::new(layer, "L").with_id(GeometryId(40)), &edges)
            .unwrap();
        let f = model
            .add_face(
                GeometryInfo::new(layer, "F").with_id(GeometryId(41)),
                l,
                &[],
                GeometricOrientation::Forward,
            )
            .unwrap();
        assert_eq!(model.face_normal(f).unwrap(), Vector3::zeros());
        model.end_batch().unwrap();

        assert_eq!(model.face_normal(f).unwrap(), Vector3::new(0.0, 0.0, 1.0));
        assert!(model.underived.is_empty());
    }
}
