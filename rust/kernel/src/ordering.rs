// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ordering and orienting of edge sets.
//!
//! Loops and polylines accept their edges in any order. Before the edges are
//! stored they are arranged into a walk where every edge starts at the vertex
//! the previous edge ended at; the orientation records whether an edge is
//! traversed from its first to its second vertex (`Forward`) or reversed.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::{GeometricOrientation, ModelData, PEdge};

/// An edge together with the direction it is traversed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientedEdge {
    pub edge: EdgeKey,
    pub orientation: GeometricOrientation,
}

/// Result of ordering an edge set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeOrder {
    /// The walk visits every edge and ends where it started.
    pub is_loop: bool,
    pub edges: Vec<OrientedEdge>,
}

type Incidence = FxHashMap<VertexKey, SmallVec<[usize; 2]>>;

impl ModelData {
    /// Orders an edge set into a closed loop.
    ///
    /// Every vertex of a closed loop is shared by exactly two of the edges.
    /// The walk starts with the first given edge in forward direction. When
    /// the set does not close, `is_loop` is `false` and the returned order is
    /// only partially meaningful.
    pub fn order_loop(&self, edges: &[EdgeKey]) -> Result<EdgeOrder> {
        self.validate_edge_set(edges, 3)?;
        let ends = self.edge_ends(edges);
        let incidence = incidence(&ends);

        if incidence.values().any(|uses| uses.len() != 2) {
            return Ok(EdgeOrder {
                is_loop: false,
                edges: as_given(edges),
            });
        }

        let (ordered, end) = walk(edges, &ends, &incidence, 0, GeometricOrientation::Forward);
        let is_loop = ordered.len() == edges.len() && end == ends[0][0];
        Ok(EdgeOrder {
            is_loop,
            edges: complete(ordered, edges),
        })
    }

    /// Orders an edge set into a non-branching chain.
    ///
    /// The chain starts at the first given edge that has a free end, oriented
    /// away from that end. A set without free ends is walked as a closed chain
    /// and reported with `is_loop` set.
    pub fn order_path(&self, edges: &[EdgeKey]) -> Result<EdgeOrder> {
        self.validate_edge_set(edges, 1)?;
        let ends = self.edge_ends(edges);
        let incidence = incidence(&ends);

        for (vertex, uses) in &incidence {
            if uses.len() > 2 {
                return Err(Error::BranchingPolyline(*vertex));
            }
        }

        let free_end = ends.iter().enumerate().find_map(|(i, [a, b])| {
            if incidence[a].len() == 1 {
                Some((i, GeometricOrientation::Forward))
            } else if incidence[b].len() == 1 {
                Some((i, GeometricOrientation::Backward))
            } else {
                None
            }
        });
        let (start, orientation) = free_end.unwrap_or((0, GeometricOrientation::Forward));

        let (ordered, end) = walk(edges, &ends, &incidence, start, orientation);
        if ordered.len() != edges.len() {
            return Err(Error::DisconnectedPolyline);
        }
        let first = match orientation {
            GeometricOrientation::Backward => ends[start][1],
            _ => ends[start][0],
        };
        Ok(EdgeOrder {
            is_loop: free_end.is_none() && end == first,
            edges: ordered,
        })
    }

    fn edge_ends(&self, edges: &[EdgeKey]) -> Vec<[VertexKey; 2]> {
        edges
            .iter()
            .filter_map(|e| self.edges.get(*e).map(|edge| edge.vertices))
            .collect()
    }

    /// Rewrites a container's edge uses to follow `order`.
    ///
    /// Existing PEdges are reused per edge so their keys stay stable, uses of
    /// edges missing from `order` are dropped, and the `next`/`prev` links are
    /// rebuilt afterwards.
    pub(crate) fn apply_order(
        &mut self,
        container: EdgeContainerKey,
        order: &[OrientedEdge],
        cyclic: bool,
    ) {
        let current = self.container_pedges(container).to_vec();
        let by_edge: FxHashMap<EdgeKey, PEdgeKey> = current
            .iter()
            .filter_map(|pk| self.pedges.get(*pk).map(|pe| (pe.edge, *pk)))
            .collect();

        let mut ordered = Vec::with_capacity(order.len());
        for oe in order {
            match by_edge.get(&oe.edge) {
                Some(&pk) => {
                    if let Some(pe) = self.pedges.get_mut(pk) {
                        pe.orientation = oe.orientation;
                    }
                    ordered.push(pk);
                }
                None => ordered.extend(self.create_pedges(container, &[*oe])),
            }
        }
        let stale: Vec<PEdgeKey> = current
            .into_iter()
            .filter(|pk| !ordered.contains(pk))
            .collect();
        self.destroy_pedges(&stale);
        match container {
            EdgeContainerKey::Loop(k) => {
                if let Some(l) = self.loops.get_mut(k) {
                    l.edges = ordered;
                }
            }
            EdgeContainerKey::Polyline(k) => {
                if let Some(p) = self.polylines.get_mut(k) {
                    p.edges = ordered;
                }
            }
        }
        self.relink_pedges(container, cyclic);
    }

    /// Rebuilds the `next`/`prev` links of a container's edge uses.
    pub(crate) fn relink_pedges(&mut self, container: EdgeContainerKey, cyclic: bool) {
        let list = self.container_pedges(container).to_vec();
        let n = list.len();
        for (i, pk) in list.iter().enumerate() {
            let next = if i + 1 < n {
                Some(list[i + 1])
            } else if cyclic {
                Some(list[0])
            } else {
                None
            };
            let prev = if i > 0 {
                Some(list[i - 1])
            } else if cyclic {
                Some(list[n - 1])
            } else {
                None
            };
            if let Some(pe) = self.pedges.get_mut(*pk) {
                pe.next = next;
                pe.prev = prev;
            }
        }
    }

    /// Edge uses of a loop or polyline in traversal order.
    pub fn container_pedges(&self, container: EdgeContainerKey) -> &[PEdgeKey] {
        match container {
            EdgeContainerKey::Loop(k) => self.loops.get(k).map(|l| l.edges.as_slice()),
            EdgeContainerKey::Polyline(k) => self.polylines.get(k).map(|p| p.edges.as_slice()),
        }
        .unwrap_or(&[])
    }

    /// Edges of a loop or polyline in traversal order.
    pub fn container_edges(&self, container: EdgeContainerKey) -> Vec<EdgeKey> {
        self.container_pedges(container)
            .iter()
            .filter_map(|pk| self.pedges.get(*pk).map(|pe: &PEdge| pe.edge))
            .collect()
    }
}

fn incidence(ends: &[[VertexKey; 2]]) -> Incidence {
    let mut map: Incidence = FxHashMap::default();
    for (i, [a, b]) in ends.iter().enumerate() {
        map.entry(*a).or_default().push(i);
        map.entry(*b).or_default().push(i);
    }
    map
}

/// Follows shared vertices from `start` until no unused edge remains at the
/// current vertex. Returns the walk and the vertex it ended at.
fn walk(
    edges: &[EdgeKey],
    ends: &[[VertexKey; 2]],
    incidence: &Incidence,
    start: usize,
    orientation: GeometricOrientation,
) -> (Vec<OrientedEdge>, VertexKey) {
    let mut used = vec![false; edges.len()];
    let mut ordered = Vec::with_capacity(edges.len());

    used[start] = true;
    ordered.push(OrientedEdge {
        edge: edges[start],
        orientation,
    });
    let mut current = match orientation {
        GeometricOrientation::Backward => ends[start][0],
        _ => ends[start][1],
    };

    while ordered.len() < edges.len() {
        let next = incidence
            .get(&current)
            .and_then(|uses| uses.iter().copied().find(|i| !used[*i]));
        let Some(i) = next else {
            break;
        };
        used[i] = true;
        let [a, b] = ends[i];
        if a == current {
            ordered.push(OrientedEdge {
                edge: edges[i],
                orientation: GeometricOrientation::Forward,
            });
            current = b;
        } else {
            ordered.push(OrientedEdge {
                edge: edges[i],
                orientation: GeometricOrientation::Backward,
            });
            current = a;
        }
    }
    (ordered, current)
}

fn as_given(edges: &[EdgeKey]) -> Vec<OrientedEdge> {
    edges
        .iter()
        .map(|&edge| OrientedEdge {
            edge,
            orientation: GeometricOrientation::Undefined,
        })
        .collect()
}

/// Appends edges the walk did not reach, unoriented.
fn complete(mut ordered: Vec<OrientedEdge>, edges: &[EdgeKey]) -> Vec<OrientedEdge> {
    if ordered.len() < edges.len() {
        let seen: Vec<EdgeKey> = ordered.iter().map(|oe| oe.edge).collect();
        ordered.extend(as_given(edges).into_iter().filter(|oe| !seen.contains(&oe.edge)));
    }
    ordered
}
