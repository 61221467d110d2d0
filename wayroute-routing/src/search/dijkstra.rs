//! Plain Dijkstra over original arcs
//!
//! Shortcut arcs are skipped, so this works on contracted and uncontracted
//! graphs alike and serves as the reference for CH results.

use tracing::trace;
use wayroute_common::Result;

use super::state::SearchState;
use super::{assemble_path, walk_parents, Direction, Meeting, SearchPath, Seed};
use crate::graph::{DynamicGraph, GraphSource, VertexId};

pub struct Dijkstra {
    state: SearchState,
}

impl Dijkstra {
    pub fn new(n_vertices: usize) -> Self {
        Self {
            state: SearchState::new(n_vertices),
        }
    }

    fn seed(&mut self, seeds: &[Seed]) {
        self.state.reset();
        for &(v, weight) in seeds {
            self.state.relax(v, weight, None);
        }
    }

    fn relax_from<G: GraphSource>(&mut self, graph: &G, v: VertexId, dist: f64, direction: Direction) {
        let arcs = match direction {
            Direction::Forward => graph.out_arcs(v),
            Direction::Backward => graph.in_arcs(v),
        };
        for &id in arcs {
            let arc = graph.arc_at(id);
            if arc.data.is_shortcut() {
                continue;
            }
            let next = match direction {
                Direction::Forward => arc.target,
                Direction::Backward => arc.source,
            };
            self.state.relax(next, dist + arc.data.weight, Some(id));
        }
    }

    /// Best path from any source to any target
    ///
    /// A target seed's weight is added when the target is settled.
    pub fn shortest<G: GraphSource>(
        &mut self,
        graph: &G,
        sources: &[Seed],
        targets: &[Seed],
    ) -> Option<Meeting> {
        self.seed(sources);
        let mut best: Option<Meeting> = None;

        while let Some((v, dist)) = self.state.pop() {
            if best.is_some_and(|b| dist >= b.weight) {
                break;
            }
            for &(t, extra) in targets {
                let candidate = dist + extra;
                if t == v && best.map_or(true, |b| candidate < b.weight) {
                    best = Some(Meeting {
                        weight: candidate,
                        vertex: v,
                    });
                }
            }
            self.relax_from(graph, v, dist, Direction::Forward);
        }

        trace!(settled = self.state.settled(), found = best.is_some(), "dijkstra query");
        best
    }

    /// Path of the last [`Dijkstra::shortest`] result
    pub fn path(&self, graph: &DynamicGraph, meeting: Meeting) -> Result<SearchPath> {
        let walked = walk_parents(graph, &self.state, meeting.vertex, Direction::Forward);
        assemble_path(graph, meeting.weight, meeting.vertex, &walked, &[])
    }

    /// Distance from the sources to every vertex (infinity if unreachable)
    pub fn one_to_all<G: GraphSource>(&mut self, graph: &G, sources: &[Seed]) -> Vec<f64> {
        self.seed(sources);
        while let Some((v, dist)) = self.state.pop() {
            self.relax_from(graph, v, dist, Direction::Forward);
        }
        (0..graph.vertex_count() as VertexId)
            .map(|v| self.state.dist(v))
            .collect()
    }

    /// Whether the search keeps going until it settles a vertex at weight
    /// ≥ `max_weight` instead of running out of vertices
    pub fn reaches<G: GraphSource>(
        &mut self,
        graph: &G,
        sources: &[Seed],
        direction: Direction,
        max_weight: f64,
    ) -> bool {
        self.seed(sources);
        while let Some((v, dist)) = self.state.pop() {
            if dist >= max_weight {
                return true;
            }
            self.relax_from(graph, v, dist, direction);
        }
        false
    }
}
