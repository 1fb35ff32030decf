// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use plantgeo_kernel::{
    make_quad_loop, EdgeKey, Error, ErrorKind, GeometricOrientation, GeometryId, GeometryInfo,
    GeometryKey, IdOwner, LayerKey, LoopKey, ModelData, ModelEvent, VertexKey,
};
use std::cell::RefCell;
use std::rc::Rc;

fn record_events(model: &mut ModelData) -> Rc<RefCell<Vec<ModelEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    model.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    events
}

fn vertex(model: &mut ModelData, layer: LayerKey, x: f64, y: f64) -> VertexKey {
    model
        .add_vertex(GeometryInfo::new(layer, "Vertex {0}"), Point3::new(x, y, 0.0))
        .unwrap()
}

fn edge(model: &mut ModelData, layer: LayerKey, a: VertexKey, b: VertexKey) -> EdgeKey {
    model
        .add_edge(GeometryInfo::new(layer, "Edge {0}"), &[a, b])
        .unwrap()
}

fn square(model: &mut ModelData, layer: LayerKey) -> (LoopKey, [VertexKey; 4]) {
    let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
        .map(|(x, y)| vertex(model, layer, x, y));
    let (l, _) = make_quad_loop(model, layer, corners).unwrap();
    (l, corners)
}

#[test]
fn edges_need_two_distinct_vertices() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Piping", None).unwrap();
    let a = vertex(&mut model, layer, 0.0, 0.0);
    let b = vertex(&mut model, layer, 1.0, 0.0);

    let same = model.add_edge(GeometryInfo::new(layer, "E"), &[a, a]);
    assert!(matches!(same, Err(Error::DegenerateEdge(v)) if v == a));

    let three = model.add_edge(GeometryInfo::new(layer, "E"), &[a, b, a]);
    assert!(matches!(three, Err(Error::WrongVertexCount(3))));
    assert_eq!(three.unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(model.edge_count(), 0);
}

#[test]
fn loop_next_links_walk_back_to_the_start() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Walls", None).unwrap();
    let (l, _) = square(&mut model, layer);

    let pedges = model.edge_loop(l).unwrap().edges.clone();
    assert_eq!(pedges.len(), 4);

    let mut current = pedges[0];
    for _ in 0..pedges.len() {
        let next = model.pedge(current).unwrap().next.unwrap();
        assert_eq!(
            model.pedge_end_vertex(current),
            model.pedge_start_vertex(next)
        );
        current = next;
    }
    assert_eq!(current, pedges[0]);
}

#[test]
fn scrambled_edges_are_ordered_into_a_loop() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Walls", None).unwrap();
    let v = [(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (0.0, 1.0)].map(|(x, y)| vertex(&mut model, layer, x, y));
    let e01 = edge(&mut model, layer, v[0], v[1]);
    let e12 = edge(&mut model, layer, v[1], v[2]);
    let e32 = edge(&mut model, layer, v[3], v[2]);
    let e30 = edge(&mut model, layer, v[3], v[0]);

    let l = model
        .add_edge_loop(GeometryInfo::new(layer, "Loop {0}"), &[e01, e32, e30, e12])
        .unwrap();
    assert_eq!(
        model.loop_vertices_ordered(l).unwrap(),
        vec![v[0], v[1], v[2], v[3]]
    );
    assert_relative_eq!(
        model.loop_normal(l).unwrap(),
        Vector3::new(0.0, 0.0, 1.0)
    );
}

#[test]
fn open_edge_set_is_not_a_loop() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Walls", None).unwrap();
    let v = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)].map(|(x, y)| vertex(&mut model, layer, x, y));
    let e0 = edge(&mut model, layer, v[0], v[1]);
    let e1 = edge(&mut model, layer, v[1], v[2]);
    let e2 = edge(&mut model, layer, v[2], v[0]);
    let extra = {
        let w = vertex(&mut model, layer, 5.0, 5.0);
        edge(&mut model, layer, v[2], w)
    };

    let result = model.add_edge_loop(GeometryInfo::new(layer, "L"), &[e0, e1, e2, extra]);
    assert!(matches!(result, Err(Error::NotAClosedLoop)));
    assert_eq!(model.loop_count(), 0);
    assert!(model.edge(e0).unwrap().pedges.is_empty());
}

#[test]
fn branching_edges_are_not_a_polyline() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Piping", None).unwrap();
    let hub = vertex(&mut model, layer, 0.0, 0.0);
    let spokes: Vec<EdgeKey> = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0)]
        .iter()
        .map(|&(x, y)| {
            let tip = vertex(&mut model, layer, x, y);
            edge(&mut model, layer, hub, tip)
        })
        .collect();

    let result = model.add_polyline(GeometryInfo::new(layer, "Pipe {0}"), &spokes);
    let err = result.unwrap_err();
    assert!(matches!(err, Error::BranchingPolyline(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    let pipe = model
        .add_polyline(GeometryInfo::new(layer, "Pipe {0}"), &spokes[..2])
        .unwrap();
    let ordered = model.polyline_vertices_ordered(pipe).unwrap();
    assert_eq!(ordered.len(), 3);
    assert_eq!(ordered[1], hub);
    assert!(!model.polyline(pipe).unwrap().is_closed);
}

#[test]
fn square_face_normal_points_up() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Slabs", None).unwrap();
    let (l, _) = square(&mut model, layer);
    let face = model
        .add_face(
            GeometryInfo::new(layer, "Slab {0}"),
            l,
            &[],
            GeometricOrientation::Forward,
        )
        .unwrap();

    assert_relative_eq!(model.face_normal(face).unwrap(), Vector3::new(0.0, 0.0, 1.0));
    assert_relative_eq!(model.face_area(face).unwrap(), 1.0);
    assert_relative_eq!(
        model.face_centroid(face).unwrap(),
        Point3::new(0.5, 0.5, 0.0)
    );
}

#[test]
fn moving_a_corner_updates_the_face_normal() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Slabs", None).unwrap();
    let (l, corners) = square(&mut model, layer);
    let face = model
        .add_face(
            GeometryInfo::new(layer, "Slab {0}"),
            l,
            &[],
            GeometricOrientation::Forward,
        )
        .unwrap();

    model.start_batch();
    for c in &corners {
        let p = model.vertex_point(*c).unwrap();
        model
            .set_vertex_position(*c, Point3::new(p.x, 0.0, p.y))
            .unwrap();
    }
    model.end_batch().unwrap();

    assert_relative_eq!(
        model.face_normal(face).unwrap(),
        Vector3::new(0.0, -1.0, 0.0),
        epsilon = 1e-12
    );
}

#[test]
fn empty_batch_only_reports_completion() {
    let mut model = ModelData::new();
    let layer = model.add_layer("L", None).unwrap();
    square(&mut model, layer);
    let events = record_events(&mut model);

    model.start_batch();
    model.end_batch().unwrap();
    model.start_batch();
    model.end_batch().unwrap();

    assert_eq!(
        *events.borrow(),
        vec![
            ModelEvent::BatchOperationFinished,
            ModelEvent::BatchOperationFinished
        ]
    );
    assert!(matches!(model.end_batch(), Err(Error::BatchNotStarted)));
}

#[test]
fn batching_aggregates_geometry_changes() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Equipment", None).unwrap();
    let pumps: Vec<VertexKey> = (0..5)
        .map(|i| vertex(&mut model, layer, i as f64, 0.0))
        .collect();
    let events = record_events(&mut model);

    for &p in &pumps {
        let moved = model.vertex_point(p).unwrap() + Vector3::z();
        model.set_vertex_position(p, moved).unwrap();
    }
    assert_eq!(events.borrow().len(), pumps.len());
    assert!(events
        .borrow()
        .iter()
        .all(|e| matches!(e, ModelEvent::GeometryChanged(keys) if keys.len() == 1)));

    events.borrow_mut().clear();
    model
        .with_batch(|m| {
            for &p in &pumps {
                let moved = m.vertex_point(p).unwrap() + Vector3::z();
                m.set_vertex_position(p, moved)?;
            }
            Ok(())
        })
        .unwrap();

    let events = events.borrow();
    assert_eq!(events.len(), 2);
    match &events[0] {
        ModelEvent::GeometryChanged(keys) => {
            assert_eq!(keys.len(), pumps.len());
            for p in &pumps {
                assert!(keys.contains(&GeometryKey::Vertex(*p)));
            }
        }
        other => panic!("expected GeometryChanged, got {other:?}"),
    }
    assert_eq!(events[1], ModelEvent::BatchOperationFinished);
}

#[test]
fn identities_are_unique_and_never_reissued() {
    let mut model = ModelData::new();
    let layer = model.add_layer("L", None).unwrap();
    let a = vertex(&mut model, layer, 0.0, 0.0);
    let id = model.id_of(a.into()).unwrap();

    let err = model
        .register_id(id, IdOwner::Geometry(a.into()))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateId(dup) if dup == id));
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    model.remove(a.into()).unwrap();
    assert_eq!(model.geometry_from_id(id), None);
    let b = vertex(&mut model, layer, 0.0, 0.0);
    assert_ne!(model.id_of(b.into()), Some(id));

    let taken = model.id_of(b.into()).unwrap();
    let clash = model.add_vertex(GeometryInfo::new(layer, "V").with_id(taken), Point3::origin());
    assert!(matches!(clash, Err(Error::DuplicateId(_))));
}

#[test]
fn loaded_geometry_is_derived_when_the_batch_ends() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Loaded", None).unwrap();

    model.start_batch();
    let v: Vec<VertexKey> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| {
            model
                .add_vertex(
                    GeometryInfo::new(layer, "Vertex {0}").with_id(GeometryId(100 + i as u64)),
                    Point3::new(x, y, 0.0),
                )
                .unwrap()
        })
        .collect();
    let e: Vec<EdgeKey> = (0..4)
        .map(|i| {
            model
                .add_edge(
                    GeometryInfo::new(layer, "Edge {0}").with_id(GeometryId(200 + i as u64)),
                    &[v[i], v[(i + 1) % 4]],
                )
                .unwrap()
        })
        .collect();
    let l = model
        .add_edge_loop(
            GeometryInfo::new(layer, "Loop {0}").with_id(GeometryId(300)),
            &[e[2], e[0], e[3], e[1]],
        )
        .unwrap();
    let face = model
        .add_face(
            GeometryInfo::new(layer, "Face {0}").with_id(GeometryId(400)),
            l,
            &[],
            GeometricOrientation::Forward,
        )
        .unwrap();
    model.end_batch().unwrap();

    assert_eq!(model.vertex(v[0]).unwrap().base.name, "Vertex 100");
    assert_eq!(model.geometry_from_id(GeometryId(400)), Some(face.into()));
    assert_eq!(model.loop_vertices_ordered(l).unwrap().len(), 4);
    assert_relative_eq!(model.face_normal(face).unwrap().z.abs(), 1.0);
    assert!(model.get_free_id(false).0 > 400);
}

#[test]
fn face_on_a_loaded_loop_gets_its_normal_without_a_batch() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Loaded", None).unwrap();
    let v: Vec<VertexKey> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
        .iter()
        .map(|&(x, y)| vertex(&mut model, layer, x, y))
        .collect();
    let e: Vec<EdgeKey> = (0..4)
        .map(|i| edge(&mut model, layer, v[i], v[(i + 1) % 4]))
        .collect();

    // Loaded loop: edges stay in file order until derived.
    let l = model
        .add_edge_loop(
            GeometryInfo::new(layer, "Loop {0}").with_id(GeometryId(300)),
            &[e[0], e[2], e[1], e[3]],
        )
        .unwrap();
    let face = model
        .add_face(
            GeometryInfo::new(layer, "Face {0}"),
            l,
            &[],
            GeometricOrientation::Forward,
        )
        .unwrap();

    let normal = model.face_normal(face).unwrap();
    assert_relative_eq!(normal.z.abs(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(model.face_area(face).unwrap(), 1.0, epsilon = 1e-12);

    model.make_consistent().unwrap();
    assert_relative_eq!(model.face_normal(face).unwrap().z.abs(), 1.0, epsilon = 1e-12);
}

#[test]
fn shared_vertex_removal_requires_cascade() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Piping", None).unwrap();
    let v: Vec<VertexKey> = (0..4)
        .map(|i| vertex(&mut model, layer, i as f64, 0.0))
        .collect();
    let e01 = edge(&mut model, layer, v[0], v[1]);
    let e12 = edge(&mut model, layer, v[1], v[2]);
    let e23 = edge(&mut model, layer, v[2], v[3]);
    let first = model
        .add_polyline(GeometryInfo::new(layer, "Pipe {0}"), &[e01, e12])
        .unwrap();
    let second = model
        .add_polyline(GeometryInfo::new(layer, "Pipe {0}"), &[e23])
        .unwrap();

    let shared = v[2];
    let err = model.remove(shared.into()).unwrap_err();
    assert!(matches!(err, Error::InUse { .. }));
    assert_eq!(model.vertex_count(), 4);

    let removed = model.remove_cascade(shared.into()).unwrap();
    assert_eq!(removed.len(), 5);
    assert_eq!(model.polyline_count(), 0);
    assert_eq!(model.edge_count(), 1);
    for (_, e) in model.edges() {
        for vk in e.vertices {
            assert!(model.vertex(vk).is_some());
        }
    }
    assert!(model.polyline(first).is_none());
    assert!(model.polyline(second).is_none());
    assert_eq!(model.vertex(v[1]).unwrap().edges.as_slice(), &[e01]);
}

#[test]
fn layer_with_geometry_cannot_be_removed() {
    let mut model = ModelData::new();
    let layer = model.add_layer("Site", None).unwrap();
    let v = vertex(&mut model, layer, 0.0, 0.0);

    assert!(matches!(
        model.remove_layer(layer),
        Err(Error::LayerNotEmpty(_))
    ));
    model.remove(v.into()).unwrap();
    model.remove_layer(layer).unwrap();
    assert!(model.layer(layer).is_none());
}
