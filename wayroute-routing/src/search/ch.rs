//! Bidirectional contraction hierarchy query
//!
//! The forward search relaxes outgoing arcs that lead to a vertex of equal
//! or higher level; the backward search relaxes incoming arcs that come from
//! one. Each direction stops once its queue minimum exceeds the best meeting
//! weight found so far. The winning path is unpacked into original arcs.

use std::sync::OnceLock;
use tracing::trace;
use wayroute_common::Result;

use super::state::SearchState;
use super::{assemble_path, walk_parents, Direction, Meeting, SearchPath, Seed};
use crate::graph::{ArcId, DynamicGraph, GraphSource, VertexId};

/// Per-vertex upward arc lists, computed on first use
///
/// Only valid for the graph it was first queried with; owners must drop it
/// when the graph changes.
pub struct UpwardCache {
    forward: Vec<OnceLock<Box<[ArcId]>>>,
    backward: Vec<OnceLock<Box<[ArcId]>>>,
}

impl UpwardCache {
    pub fn new(n_vertices: usize) -> Self {
        Self {
            forward: (0..n_vertices).map(|_| OnceLock::new()).collect(),
            backward: (0..n_vertices).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Outgoing arcs of `v` to vertices of equal or higher level
    pub fn forward<'a, G: GraphSource>(&'a self, graph: &G, v: VertexId) -> &'a [ArcId] {
        self.forward[v as usize].get_or_init(|| {
            let level = graph.level_of(v);
            graph
                .out_arcs(v)
                .iter()
                .copied()
                .filter(|&id| graph.level_of(graph.arc_at(id).target) >= level)
                .collect()
        })
    }

    /// Incoming arcs of `v` from vertices of equal or higher level
    pub fn backward<'a, G: GraphSource>(&'a self, graph: &G, v: VertexId) -> &'a [ArcId] {
        self.backward[v as usize].get_or_init(|| {
            let level = graph.level_of(v);
            graph
                .in_arcs(v)
                .iter()
                .copied()
                .filter(|&id| graph.level_of(graph.arc_at(id).source) >= level)
                .collect()
        })
    }

    fn arcs<'a, G: GraphSource>(&'a self, graph: &G, v: VertexId, direction: Direction) -> &'a [ArcId] {
        match direction {
            Direction::Forward => self.forward(graph, v),
            Direction::Backward => self.backward(graph, v),
        }
    }

    /// Number of vertices whose lists have been computed (either direction)
    pub fn populated(&self) -> usize {
        self.forward
            .iter()
            .zip(&self.backward)
            .filter(|(f, b)| f.get().is_some() || b.get().is_some())
            .count()
    }
}

/// Settle every vertex reachable upward from `seeds`, calling `visit` for each
pub(crate) fn upward_sweep<G, F>(
    graph: &G,
    cache: &UpwardCache,
    state: &mut SearchState,
    seeds: &[Seed],
    direction: Direction,
    mut visit: F,
) where
    G: GraphSource,
    F: FnMut(VertexId, f64),
{
    state.reset();
    for &(v, weight) in seeds {
        state.relax(v, weight, None);
    }
    while let Some((v, dist)) = state.pop() {
        visit(v, dist);
        relax_upward(graph, cache, state, v, dist, direction);
    }
}

fn relax_upward<G: GraphSource>(
    graph: &G,
    cache: &UpwardCache,
    state: &mut SearchState,
    v: VertexId,
    dist: f64,
    direction: Direction,
) {
    for &id in cache.arcs(graph, v, direction) {
        let arc = graph.arc_at(id);
        let next = match direction {
            Direction::Forward => arc.target,
            Direction::Backward => arc.source,
        };
        state.relax(next, dist + arc.data.weight, Some(id));
    }
}

pub struct ChQuery {
    forward: SearchState,
    backward: SearchState,
}

impl ChQuery {
    pub fn new(n_vertices: usize) -> Self {
        Self {
            forward: SearchState::new(n_vertices),
            backward: SearchState::new(n_vertices),
        }
    }

    /// Best meeting of an upward search from `sources` and one from `targets`
    pub fn shortest<G: GraphSource>(
        &mut self,
        graph: &G,
        cache: &UpwardCache,
        sources: &[Seed],
        targets: &[Seed],
    ) -> Option<Meeting> {
        self.forward.reset();
        self.backward.reset();
        for &(v, weight) in sources {
            self.forward.relax(v, weight, None);
        }
        for &(v, weight) in targets {
            self.backward.relax(v, weight, None);
        }

        let mut best: Option<Meeting> = None;
        loop {
            let bound = best.map_or(f64::INFINITY, |b| b.weight);
            let forward_min = self.forward.peek_min().filter(|&m| m <= bound);
            let backward_min = self.backward.peek_min().filter(|&m| m <= bound);

            let direction = match (forward_min, backward_min) {
                (None, None) => break,
                (Some(_), None) => Direction::Forward,
                (None, Some(_)) => Direction::Backward,
                (Some(f), Some(b)) if f <= b => Direction::Forward,
                (Some(_), Some(_)) => Direction::Backward,
            };
            let (this, other) = match direction {
                Direction::Forward => (&mut self.forward, &self.backward),
                Direction::Backward => (&mut self.backward, &self.forward),
            };

            let Some((v, dist)) = this.pop() else {
                break;
            };
            let total = dist + other.dist(v);
            if total < bound {
                best = Some(Meeting {
                    weight: total,
                    vertex: v,
                });
            }
            relax_upward(graph, cache, this, v, dist, direction);
        }

        trace!(
            forward_settled = self.forward.settled(),
            backward_settled = self.backward.settled(),
            found = best.is_some(),
            "ch query"
        );
        best
    }

    /// Unpacked path of the last [`ChQuery::shortest`] result
    pub fn path(&self, graph: &DynamicGraph, meeting: Meeting) -> Result<SearchPath> {
        let forward = walk_parents(graph, &self.forward, meeting.vertex, Direction::Forward);
        let backward = walk_parents(graph, &self.backward, meeting.vertex, Direction::Backward);
        assemble_path(graph, meeting.weight, meeting.vertex, &forward, &backward)
    }
}
