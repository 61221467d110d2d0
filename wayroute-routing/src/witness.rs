//! Witness searches for vertex contraction
//!
//! Before contracting `via`, every pair `u → via → w` needs a shortcut
//! unless some other path from `u` to `w` is at most as heavy. That path is
//! the witness. Searches only traverse vertices that are not yet contracted.

use tracing::trace;

use crate::graph::{ArcId, DynamicGraph, GraphSource, VertexId};
use crate::search::state::SearchState;

/// A shortcut the contractor intends to insert
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShortcutPlan {
    pub from: VertexId,
    pub to: VertexId,
    pub via: VertexId,
    pub weight: f64,
    pub distance: f64,
    pub first: ArcId,
    pub second: ArcId,
}

/// Lightest arc to or from one neighbor
#[derive(Debug, Clone, Copy)]
pub(crate) struct Neighbor {
    pub vertex: VertexId,
    pub arc: ArcId,
    pub weight: f64,
    pub distance: f64,
}

/// Uncontracted neighbors of `v`, one entry per vertex (lightest arc wins)
pub(crate) fn neighbors<G: GraphSource>(
    graph: &G,
    v: VertexId,
) -> (Vec<Neighbor>, Vec<Neighbor>) {
    fn collect<G: GraphSource>(
        graph: &G,
        v: VertexId,
        arcs: &[ArcId],
        incoming: bool,
    ) -> Vec<Neighbor> {
        let mut out: Vec<Neighbor> = Vec::with_capacity(arcs.len());
        for &id in arcs {
            let arc = graph.arc_at(id);
            let vertex = if incoming { arc.source } else { arc.target };
            if vertex == v || graph.level_of(vertex).is_some() {
                continue;
            }
            match out.iter_mut().find(|n| n.vertex == vertex) {
                Some(existing) if existing.weight <= arc.data.weight => {}
                Some(existing) => {
                    *existing = Neighbor {
                        vertex,
                        arc: id,
                        weight: arc.data.weight,
                        distance: arc.data.distance,
                    }
                }
                None => out.push(Neighbor {
                    vertex,
                    arc: id,
                    weight: arc.data.weight,
                    distance: arc.data.distance,
                }),
            }
        }
        out
    }

    (
        collect(graph, v, graph.in_arcs(v), true),
        collect(graph, v, graph.out_arcs(v), false),
    )
}

pub struct WitnessCalculator {
    state: SearchState,
    max_settled: Option<usize>,
}

impl WitnessCalculator {
    /// `max_settled` caps each search; `None` searches exhaustively up to
    /// the weight bound
    pub fn new(n_vertices: usize, max_settled: Option<usize>) -> Self {
        Self {
            state: SearchState::new(n_vertices),
            max_settled,
        }
    }

    /// Whether a path `from → to` of weight ≤ `max_weight` avoids `via`
    pub fn has_witness<G: GraphSource>(
        &mut self,
        graph: &G,
        via: VertexId,
        from: VertexId,
        to: VertexId,
        max_weight: f64,
    ) -> bool {
        self.witness_distances(graph, via, from, &[to], max_weight)[0] <= max_weight
    }

    /// Weight of the best path found from `from` to each target avoiding
    /// `via`, or infinity
    ///
    /// A finite value is always the weight of a real path. Infinity means
    /// none was found within `max_weight` (or within the settle budget), in
    /// which case the caller has to assume there is no witness.
    pub fn witness_distances<G: GraphSource>(
        &mut self,
        graph: &G,
        via: VertexId,
        from: VertexId,
        targets: &[VertexId],
        max_weight: f64,
    ) -> Vec<f64> {
        let state = &mut self.state;
        state.reset();
        state.relax(from, 0.0, None);

        let mut remaining = targets.len();
        let mut seen_targets: Vec<bool> = vec![false; targets.len()];

        while let Some((u, dist)) = state.pop() {
            if dist > max_weight {
                break;
            }
            for (i, &t) in targets.iter().enumerate() {
                if t == u && !seen_targets[i] {
                    seen_targets[i] = true;
                    remaining -= 1;
                }
            }
            if remaining == 0 {
                break;
            }
            if self.max_settled.is_some_and(|limit| state.settled() >= limit) {
                trace!(from, via, settled = state.settled(), "witness search hit settle limit");
                break;
            }

            for &id in graph.out_arcs(u) {
                let arc = graph.arc_at(id);
                let w = arc.target;
                if w == via || graph.level_of(w).is_some() {
                    continue;
                }
                let candidate = dist + arc.data.weight;
                if candidate <= max_weight {
                    state.relax(w, candidate, Some(id));
                }
            }
        }

        targets.iter().map(|&t| state.dist(t)).collect()
    }

    /// Shortcuts needed for paths entering `via` from `source`
    pub(crate) fn plan_from(
        &mut self,
        graph: &DynamicGraph,
        via: VertexId,
        source: &Neighbor,
        outgoing: &[Neighbor],
    ) -> Vec<ShortcutPlan> {
        let candidates: Vec<&Neighbor> = outgoing
            .iter()
            .filter(|w| w.vertex != source.vertex)
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let targets: Vec<VertexId> = candidates.iter().map(|w| w.vertex).collect();
        let bound = candidates
            .iter()
            .map(|w| source.weight + w.weight)
            .fold(0.0, f64::max);
        let found = self.witness_distances(graph, via, source.vertex, &targets, bound);

        candidates
            .iter()
            .zip(found)
            .filter_map(|(w, witness)| {
                let weight = source.weight + w.weight;
                (witness > weight).then_some(ShortcutPlan {
                    from: source.vertex,
                    to: w.vertex,
                    via,
                    weight,
                    distance: source.distance + w.distance,
                    first: source.arc,
                    second: w.arc,
                })
            })
            .collect()
    }

    /// All shortcuts contracting `via` would need right now
    pub fn plan_shortcuts(&mut self, graph: &DynamicGraph, via: VertexId) -> Vec<ShortcutPlan> {
        let (incoming, outgoing) = neighbors(graph, via);
        incoming
            .iter()
            .flat_map(|u| self.plan_from(graph, via, u, &outgoing))
            .collect()
    }
}
