// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geo-coordinate anchors.
//!
//! A [`GeoReference`] ties a model vertex to a geographic reference point
//! (longitude, latitude, height). Adding, removing or re-anchoring one, and
//! moving its vertex, is reported as [`ModelEvent::GeoReferencesChanged`].
//!
//! [`ModelEvent::GeoReferencesChanged`]: crate::events::ModelEvent::GeoReferencesChanged

use nalgebra::Point3;

use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::{GeoReference, ModelData};

impl ModelData {
    pub fn add_geo_reference(
        &mut self,
        vertex: VertexKey,
        reference_point: Point3<f64>,
    ) -> Result<GeoReferenceKey> {
        if !self.vertices.contains_key(vertex) {
            return Err(Error::MissingGeometry(vertex.into()));
        }
        let key = self.geo_references.insert(GeoReference {
            vertex,
            reference_point,
        });
        self.geo_reference_changed(key);
        Ok(key)
    }

    /// Removes a geo-reference. Returns `false` if it was unknown.
    pub fn remove_geo_reference(&mut self, key: GeoReferenceKey) -> bool {
        if self.geo_references.remove(key).is_none() {
            return false;
        }
        self.geo_reference_changed(key);
        true
    }

    pub fn set_reference_point(
        &mut self,
        key: GeoReferenceKey,
        reference_point: Point3<f64>,
    ) -> Result<()> {
        let georef = self
            .geo_references
            .get_mut(key)
            .ok_or(Error::MissingGeoReference(key))?;
        georef.reference_point = reference_point;
        self.geo_reference_changed(key);
        Ok(())
    }

    /// Anchors a geo-reference at another vertex.
    pub fn set_geo_reference_vertex(&mut self, key: GeoReferenceKey, vertex: VertexKey) -> Result<()> {
        if !self.vertices.contains_key(vertex) {
            return Err(Error::MissingGeometry(vertex.into()));
        }
        let georef = self
            .geo_references
            .get_mut(key)
            .ok_or(Error::MissingGeoReference(key))?;
        georef.vertex = vertex;
        self.geo_reference_changed(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::GeometryInfo;
    use crate::events::ModelEvent;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn moving_the_anchor_reports_the_reference() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let v = model
            .add_vertex(GeometryInfo::new(layer, "V"), Point3::origin())
            .unwrap();
        let g = model
            .add_geo_reference(v, Point3::new(8.55, 47.37, 408.0))
            .unwrap();

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        model.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        model.set_vertex_position(v, Point3::new(1.0, 0.0, 0.0)).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                ModelEvent::GeometryChanged(vec![v.into()]),
                ModelEvent::GeoReferencesChanged(vec![g]),
            ]
        );
    }

    #[test]
    fn removing_the_vertex_removes_its_references() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let v = model
            .add_vertex(GeometryInfo::new(layer, "V"), Point3::origin())
            .unwrap();
        let g = model.add_geo_reference(v, Point3::origin()).unwrap();

        model.remove(v.into()).unwrap();
        assert!(model.geo_reference(g).is_none());
        assert!(!model.remove_geo_reference(g));
        assert!(matches!(
            model.set_reference_point(g, Point3::origin()),
            Err(Error::MissingGeoReference(_))
        ));
    }
}
