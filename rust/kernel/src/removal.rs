// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Removal of geometry.
//!
//! [`ModelData::remove`] refuses to remove anything that is still referenced,
//! so no edge can end up with a dangling vertex and no loop with a dangling
//! edge. [`ModelData::remove_cascade`] removes the dependents first.

use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::ModelData;

impl ModelData {
    /// Removes a geometry that nothing else references.
    ///
    /// References held by the geometry are detached; geo-references anchored
    /// at a removed vertex are removed with it. Fails with [`Error::InUse`]
    /// while dependents exist.
    pub fn remove(&mut self, key: GeometryKey) -> Result<()> {
        if !self.contains_geometry(key) {
            return Err(Error::MissingGeometry(key));
        }
        let dependents = self.dependents(key);
        if !dependents.is_empty() {
            tracing::warn!(?key, dependents = dependents.len(), "removal rejected, geometry in use");
            return Err(Error::InUse { key, dependents });
        }

        let (id, layer) = self
            .base(key)
            .map(|b| (b.id, b.layer))
            .ok_or(Error::MissingGeometry(key))?;

        match key {
            GeometryKey::Vertex(k) => {
                for gk in self.vertex_geo_references(k) {
                    self.geo_references.remove(gk);
                    self.geo_reference_changed(gk);
                }
                self.vertices.remove(k);
            }
            GeometryKey::Edge(k) => {
                if let Some(edge) = self.edges.remove(k) {
                    for v in edge.vertices {
                        self.unlink_vertex_edge(v, k);
                    }
                }
            }
            GeometryKey::EdgeLoop(k) => {
                if let Some(edge_loop) = self.loops.remove(k) {
                    self.destroy_pedges(&edge_loop.edges);
                }
            }
            GeometryKey::Polyline(k) => {
                if let Some(polyline) = self.polylines.remove(k) {
                    self.destroy_pedges(&polyline.edges);
                }
            }
            GeometryKey::Face(k) => {
                if let Some(face) = self.faces.remove(k) {
                    for lk in std::iter::once(face.boundary).chain(face.holes) {
                        if let Some(l) = self.loops.get_mut(lk) {
                            l.faces.retain(|f| *f != k);
                        }
                    }
                }
            }
            GeometryKey::Volume(k) => {
                if let Some(volume) = self.volumes.remove(k) {
                    for pk in volume.faces {
                        self.destroy_pface(pk);
                    }
                }
            }
            GeometryKey::Proxy(k) => {
                if let Some(proxy) = self.proxies.remove(k) {
                    if let Some(v) = self.vertices.get_mut(proxy.vertex) {
                        v.proxies.retain(|p| *p != k);
                    }
                }
            }
        }

        self.geometry_removed(key, id, layer);
        Ok(())
    }

    /// Removes a geometry together with everything that depends on it,
    /// top-down, inside one batch. Returns the removed keys in removal order.
    pub fn remove_cascade(&mut self, key: GeometryKey) -> Result<Vec<GeometryKey>> {
        if !self.contains_geometry(key) {
            return Err(Error::MissingGeometry(key));
        }
        let mut closure = self.dependents_closure(&[key]);
        closure.reverse();
        tracing::debug!(?key, count = closure.len(), "cascading removal");

        self.with_batch(|m| {
            for k in &closure {
                m.remove(*k)?;
            }
            Ok(())
        })?;
        Ok(closure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::GeometryInfo;
    use crate::error::ErrorKind;
    use crate::events::ModelEvent;
    use nalgebra::Point3;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn shared_vertex_cannot_be_removed() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let v: Vec<_> = (0..3)
            .map(|i| {
                model
                    .add_vertex(GeometryInfo::new(layer, "V"), Point3::new(i as f64, 0.0, 0.0))
                    .unwrap()
            })
            .collect();
        let e0 = model.add_edge(GeometryInfo::new(layer, "E"), &[v[0], v[1]]).unwrap();
        let e1 = model.add_edge(GeometryInfo::new(layer, "E"), &[v[1], v[2]]).unwrap();
        let p0 = model.add_polyline(GeometryInfo::new(layer, "P"), &[e0]).unwrap();
        let p1 = model.add_polyline(GeometryInfo::new(layer, "P"), &[e1]).unwrap();

        let err = model.remove(v[1].into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(matches!(err, Error::InUse { ref dependents, .. } if dependents.len() == 2));

        let removed = model.remove_cascade(v[1].into()).unwrap();
        assert_eq!(removed.len(), 5);
        assert!(model.polyline(p0).is_none() && model.polyline(p1).is_none());
        assert_eq!(model.edge_count(), 0);
        assert!(model.vertex(v[0]).unwrap().edges.is_empty());
        assert!(model.vertex(v[2]).unwrap().edges.is_empty());
    }

    #[test]
    fn removal_frees_identity_and_reports() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let v = model
            .add_vertex(GeometryInfo::new(layer, "V"), Point3::origin())
            .unwrap();
        let id = model.id_of(v.into()).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        model.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        model.remove(v.into()).unwrap();
        assert_eq!(model.geometry_from_id(id), None);
        assert!(model.layer_elements(layer).is_empty());
        assert_eq!(
            *events.borrow(),
            vec![ModelEvent::GeometryRemoved(vec![(v.into(), id)])]
        );
        assert!(matches!(
            model.remove(v.into()),
            Err(Error::MissingGeometry(_))
        ));
    }

    #[test]
    fn cascade_reports_once() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let a = model
            .add_vertex(GeometryInfo::new(layer, "V"), Point3::origin())
            .unwrap();
        let b = model
            .add_vertex(GeometryInfo::new(layer, "V"), Point3::new(1.0, 0.0, 0.0))
            .unwrap();
        let e = model.add_edge(GeometryInfo::new(layer, "E"), &[a, b]).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        model.subscribe(move |ev| sink.borrow_mut().push(ev.clone()));

        model.remove_cascade(a.into()).unwrap();
        let events = events.borrow();
        assert_eq!(events.len(), 2);
        let ModelEvent::GeometryRemoved(removed) = &events[0] else {
            panic!("expected GeometryRemoved, got {:?}", events[0]);
        };
        let keys: Vec<_> = removed.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![GeometryKey::Edge(e), GeometryKey::Vertex(a)]);
        assert_eq!(events[1], ModelEvent::BatchOperationFinished);
    }
}
