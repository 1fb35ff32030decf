// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Traversal methods for navigating the geometry hierarchy.
//!
//! Supports both downward traversal (volume → faces → loops → edges →
//! vertices) and upward traversal (vertex → edges → loops → faces → volumes)
//! via the back-reference lists.

use rustc_hash::FxHashSet;

use crate::keys::*;
use crate::model::{GeometricOrientation, ModelData};

// =============================================================================
// Downward traversal
// =============================================================================

impl ModelData {
    /// Returns the two vertex keys of an edge.
    pub fn edge_vertices(&self, key: EdgeKey) -> Option<(VertexKey, VertexKey)> {
        self.edges.get(key).map(|e| (e.vertices[0], e.vertices[1]))
    }

    /// Vertex an edge use starts at, taking its orientation into account.
    pub fn pedge_start_vertex(&self, key: PEdgeKey) -> Option<VertexKey> {
        let pe = self.pedges.get(key)?;
        let edge = self.edges.get(pe.edge)?;
        Some(match pe.orientation {
            GeometricOrientation::Backward => edge.vertices[1],
            _ => edge.vertices[0],
        })
    }

    /// Vertex an edge use ends at, taking its orientation into account.
    pub fn pedge_end_vertex(&self, key: PEdgeKey) -> Option<VertexKey> {
        let pe = self.pedges.get(key)?;
        let edge = self.edges.get(pe.edge)?;
        Some(match pe.orientation {
            GeometricOrientation::Backward => edge.vertices[0],
            _ => edge.vertices[1],
        })
    }

    /// Follows `next` links from `start` until the walk returns to `start` or
    /// runs off the end of an open chain.
    pub fn walk_pedges(&self, start: PEdgeKey) -> Vec<PEdgeKey> {
        let mut out = Vec::new();
        let mut current = Some(start);
        while let Some(pk) = current {
            let Some(pe) = self.pedges.get(pk) else {
                break;
            };
            out.push(pk);
            current = pe.next.filter(|n| *n != start);
        }
        out
    }

    /// Vertices of a loop in traversal order (one per edge use).
    pub fn loop_vertices_ordered(&self, key: LoopKey) -> Option<Vec<VertexKey>> {
        let edge_loop = self.loops.get(key)?;
        edge_loop
            .edges
            .iter()
            .map(|pk| self.pedge_start_vertex(*pk))
            .collect()
    }

    /// Vertices of a polyline in traversal order, including the final end
    /// vertex of an open chain.
    pub fn polyline_vertices_ordered(&self, key: PolylineKey) -> Option<Vec<VertexKey>> {
        let polyline = self.polylines.get(key)?;
        let mut vertices: Vec<VertexKey> = polyline
            .edges
            .iter()
            .map(|pk| self.pedge_start_vertex(*pk))
            .collect::<Option<_>>()?;
        if !polyline.is_closed {
            if let Some(last) = polyline.edges.last() {
                vertices.push(self.pedge_end_vertex(*last)?);
            }
        }
        Some(vertices)
    }

    /// Boundary loop followed by the hole loops of a face.
    pub fn face_loops(&self, key: FaceKey) -> Vec<LoopKey> {
        self.faces
            .get(key)
            .map(|f| std::iter::once(f.boundary).chain(f.holes.iter().copied()).collect())
            .unwrap_or_default()
    }

    /// Faces of a volume (without orientation).
    pub fn volume_faces(&self, key: VolumeKey) -> Vec<FaceKey> {
        self.volumes
            .get(key)
            .map(|v| {
                v.faces
                    .iter()
                    .filter_map(|pk| self.pfaces.get(*pk).map(|pf| pf.face))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Geometry directly referenced by `key`.
    pub fn references(&self, key: GeometryKey) -> Vec<GeometryKey> {
        match key {
            GeometryKey::Vertex(_) => Vec::new(),
            GeometryKey::Edge(k) => self
                .edges
                .get(k)
                .map(|e| e.vertices.iter().map(|v| GeometryKey::Vertex(*v)).collect())
                .unwrap_or_default(),
            GeometryKey::EdgeLoop(k) => self
                .container_edges(EdgeContainerKey::Loop(k))
                .into_iter()
                .map(GeometryKey::Edge)
                .collect(),
            GeometryKey::Polyline(k) => self
                .container_edges(EdgeContainerKey::Polyline(k))
                .into_iter()
                .map(GeometryKey::Edge)
                .collect(),
            GeometryKey::Face(k) => {
                let mut loops = self.face_loops(k);
                dedup_in_place(&mut loops);
                loops.into_iter().map(GeometryKey::EdgeLoop).collect()
            }
            GeometryKey::Volume(k) => self
                .volume_faces(k)
                .into_iter()
                .map(GeometryKey::Face)
                .collect(),
            GeometryKey::Proxy(k) => self
                .proxies
                .get(k)
                .map(|p| vec![GeometryKey::Vertex(p.vertex)])
                .unwrap_or_default(),
        }
    }

    /// All unique vertices reachable downward from `key`, in discovery order.
    pub fn downward_vertices(&self, key: GeometryKey) -> Vec<VertexKey> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if !seen.insert(k) {
                continue;
            }
            match k {
                GeometryKey::Vertex(v) if self.vertices.contains_key(v) => out.push(v),
                _ => stack.extend(self.references(k).into_iter().rev()),
            }
        }
        out
    }
}

// =============================================================================
// Upward traversal
// =============================================================================

impl ModelData {
    /// Returns all edges incident to a vertex.
    pub fn vertex_edges(&self, key: VertexKey) -> Vec<EdgeKey> {
        self.vertices
            .get(key)
            .map(|v| v.edges.to_vec())
            .unwrap_or_default()
    }

    /// Returns all loops and polylines that use an edge.
    pub fn edge_containers(&self, key: EdgeKey) -> Vec<EdgeContainerKey> {
        let mut out: Vec<EdgeContainerKey> = self
            .edges
            .get(key)
            .map(|e| {
                e.pedges
                    .iter()
                    .filter_map(|pk| self.pedges.get(*pk).map(|pe| pe.parent))
                    .collect()
            })
            .unwrap_or_default();
        dedup_in_place(&mut out);
        out
    }

    /// Returns all faces that use a loop as boundary or hole.
    pub fn loop_faces(&self, key: LoopKey) -> Vec<FaceKey> {
        self.loops
            .get(key)
            .map(|l| l.faces.clone())
            .unwrap_or_default()
    }

    /// Returns all volumes that use a face.
    pub fn face_volumes(&self, key: FaceKey) -> Vec<VolumeKey> {
        let mut out: Vec<VolumeKey> = self
            .faces
            .get(key)
            .map(|f| {
                f.pfaces
                    .iter()
                    .filter_map(|pk| self.pfaces.get(*pk).map(|pf| pf.volume))
                    .collect()
            })
            .unwrap_or_default();
        dedup_in_place(&mut out);
        out
    }

    /// Geometry that directly references `key`.
    pub fn dependents(&self, key: GeometryKey) -> Vec<GeometryKey> {
        match key {
            GeometryKey::Vertex(k) => self
                .vertices
                .get(k)
                .map(|v| {
                    v.edges
                        .iter()
                        .map(|e| GeometryKey::Edge(*e))
                        .chain(v.proxies.iter().map(|p| GeometryKey::Proxy(*p)))
                        .collect()
                })
                .unwrap_or_default(),
            GeometryKey::Edge(k) => self
                .edge_containers(k)
                .into_iter()
                .map(GeometryKey::from)
                .collect(),
            GeometryKey::EdgeLoop(k) => self
                .loop_faces(k)
                .into_iter()
                .map(GeometryKey::Face)
                .collect(),
            GeometryKey::Face(k) => self
                .face_volumes(k)
                .into_iter()
                .map(GeometryKey::Volume)
                .collect(),
            GeometryKey::Polyline(_) | GeometryKey::Volume(_) | GeometryKey::Proxy(_) => {
                Vec::new()
            }
        }
    }

    /// `seeds` plus everything that transitively depends on them, grouped by
    /// geometry type in sweep order.
    pub fn dependents_closure(&self, seeds: &[GeometryKey]) -> Vec<GeometryKey> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        let mut stack: Vec<GeometryKey> = seeds.iter().rev().copied().collect();
        while let Some(k) = stack.pop() {
            if !self.contains_geometry(k) || !seen.insert(k) {
                continue;
            }
            out.push(k);
            stack.extend(self.dependents(k).into_iter().rev());
        }
        out.sort_by_key(|k| k.geometry_type());
        out
    }

    /// Geo-references anchored at a vertex.
    pub fn vertex_geo_references(&self, key: VertexKey) -> Vec<GeoReferenceKey> {
        self.geo_references
            .iter()
            .filter(|(_, g)| g.vertex == key)
            .map(|(k, _)| k)
            .collect()
    }
}

fn dedup_in_place<T: PartialEq + Copy>(items: &mut Vec<T>) {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items.iter() {
        if !unique.contains(item) {
            unique.push(*item);
        }
    }
    *items = unique;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::{make_quad_loop, GeometryInfo};
    use nalgebra::Point3;

    fn square(model: &mut ModelData, layer: LayerKey) -> ([VertexKey; 4], LoopKey, [EdgeKey; 4]) {
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)].map(|(x, y)| {
            model
                .add_vertex(GeometryInfo::new(layer, "V"), Point3::new(x, y, 0.0))
                .unwrap()
        });
        let (l, edges) = make_quad_loop(model, layer, corners).unwrap();
        (corners, l, edges)
    }

    #[test]
    fn loop_walk_returns_to_start() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let (corners, l, _) = square(&mut model, layer);

        let pedges = &model.edge_loop(l).unwrap().edges;
        let walk = model.walk_pedges(pedges[0]);
        assert_eq!(walk.len(), 4);
        assert_eq!(&walk, pedges);
        assert_eq!(model.loop_vertices_ordered(l).unwrap(), corners.to_vec());
        for pk in pedges {
            let next = model.pedge(*pk).unwrap().next.unwrap();
            assert_eq!(model.pedge_end_vertex(*pk), model.pedge_start_vertex(next));
        }
    }

    #[test]
    fn upward_queries() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let (corners, l, edges) = square(&mut model, layer);
        let face = model
            .add_face(
                GeometryInfo::new(layer, "F"),
                l,
                &[],
                GeometricOrientation::Forward,
            )
            .unwrap();

        assert_eq!(model.vertex_edges(corners[0]).len(), 2);
        assert_eq!(model.edge_containers(edges[0]), vec![EdgeContainerKey::Loop(l)]);
        assert_eq!(model.loop_faces(l), vec![face]);
        assert!(model.face_volumes(face).is_empty());
    }

    #[test]
    fn closure_is_in_sweep_order() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let (corners, l, edges) = square(&mut model, layer);
        let face = model
            .add_face(
                GeometryInfo::new(layer, "F"),
                l,
                &[],
                GeometricOrientation::Forward,
            )
            .unwrap();

        let closure = model.dependents_closure(&[corners[0].into()]);
        assert_eq!(
            closure,
            vec![
                GeometryKey::Vertex(corners[0]),
                GeometryKey::Edge(edges[0]),
                GeometryKey::Edge(edges[3]),
                GeometryKey::EdgeLoop(l),
                GeometryKey::Face(face),
            ]
        );
    }

    #[test]
    fn downward_vertices_are_unique() {
        let mut model = ModelData::new();
        let layer = model.add_layer("L", None).unwrap();
        let (corners, l, _) = square(&mut model, layer);
        let mut found = model.downward_vertices(l.into());
        found.sort();
        let mut expected = corners.to_vec();
        expected.sort();
        assert_eq!(found, expected);
    }
}
