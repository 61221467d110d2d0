//! Correctness checks for contracted graphs
//!
//! Compares CH query weights against plain Dijkstra on random vertex pairs
//! and checks that every shortcut expands to arcs of the same total weight.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};
use wayroute_common::{Error, Result};

use crate::graph::{ArcId, DynamicGraph, VertexId};
use crate::search::ch::{ChQuery, UpwardCache};
use crate::search::dijkstra::Dijkstra;

/// Mismatches kept in a report
const MAX_REPORTED: usize = 10;

fn same_weight(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub source: VertexId,
    pub target: VertexId,
    pub dijkstra: Option<f64>,
    pub ch: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub queries: usize,
    pub correct: usize,
    pub incorrect: usize,
    /// Pairs neither search could connect (counted as correct)
    pub unreachable_both: usize,
    pub mismatches: Vec<Mismatch>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.incorrect == 0
    }

    pub fn accuracy(&self) -> f64 {
        if self.queries == 0 {
            1.0
        } else {
            self.correct as f64 / self.queries as f64
        }
    }
}

/// Run `n_queries` random vertex-to-vertex queries through both searches
pub fn validate_against_dijkstra(
    graph: &DynamicGraph,
    n_queries: usize,
    seed: u64,
) -> Result<ValidationReport> {
    if !graph.is_fully_contracted() {
        return Err(Error::InconsistentGraphState(
            "validation needs a fully contracted graph".to_string(),
        ));
    }
    let n = graph.vertex_count();
    let mut report = ValidationReport::default();
    if n == 0 {
        return Ok(report);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let cache = UpwardCache::new(n);
    let mut query = ChQuery::new(n);
    let mut dijkstra = Dijkstra::new(n);

    for i in 0..n_queries {
        let source = rng.random_range(0..n as VertexId);
        let target = rng.random_range(0..n as VertexId);
        let seeds = ([(source, 0.0)], [(target, 0.0)]);

        let expected = dijkstra.shortest(graph, &seeds.0, &seeds.1).map(|m| m.weight);
        let actual = query.shortest(graph, &cache, &seeds.0, &seeds.1).map(|m| m.weight);

        report.queries += 1;
        match (expected, actual) {
            (None, None) => {
                report.unreachable_both += 1;
                report.correct += 1;
            }
            (Some(a), Some(b)) if same_weight(a, b) => report.correct += 1,
            _ => {
                report.incorrect += 1;
                if report.mismatches.len() < MAX_REPORTED {
                    report.mismatches.push(Mismatch {
                        source,
                        target,
                        dijkstra: expected,
                        ch: actual,
                    });
                }
            }
        }

        if (i + 1) % 1000 == 0 {
            debug!(done = i + 1, total = n_queries, incorrect = report.incorrect, "validating");
        }
    }

    if report.is_valid() {
        info!(queries = report.queries, "validation passed");
    } else {
        warn!(
            queries = report.queries,
            incorrect = report.incorrect,
            "validation found mismatches"
        );
    }
    Ok(report)
}

/// Check every live shortcut; returns how many were checked
pub fn verify_shortcuts(graph: &DynamicGraph) -> Result<usize> {
    let shortcuts = graph.shortcuts();
    let mut unpacked: Vec<ArcId> = Vec::new();

    for &(id, source, target, _) in &shortcuts {
        unpacked.clear();
        graph.unpack(id, &mut unpacked)?;

        let mut total = 0.0;
        let mut at = source;
        for &original in &unpacked {
            let arc = graph.arc(original)?;
            if arc.data.is_shortcut() || arc.source != at {
                return Err(Error::InconsistentGraphState(format!(
                    "shortcut {} does not unpack into a chain of original arcs",
                    id.0
                )));
            }
            total += arc.data.weight;
            at = arc.target;
        }

        let weight = graph.arc(id)?.data.weight;
        if at != target || !same_weight(total, weight) {
            return Err(Error::InconsistentGraphState(format!(
                "shortcut {} ({source}->{target}) weighs {weight} but its arcs sum to {total}",
                id.0
            )));
        }
    }
    Ok(shortcuts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contraction::{contract_graph, ContractionConfig};
    use crate::graph::{EdgeData, Shortcut};
    use crate::tags::TagsId;
    use wayroute_common::Coordinate;

    fn ring(n: u32) -> DynamicGraph {
        let mut graph = DynamicGraph::new();
        for i in 0..n {
            graph.add_vertex(Coordinate::new(0.0, i as f32 * 0.001));
        }
        for i in 0..n {
            let j = (i + 1) % n;
            let w = 1.0 + (i % 3) as f64;
            graph.add_arc(i, j, EdgeData::original(w, w, TagsId(0))).unwrap();
            graph.add_arc(j, i, EdgeData::original(w + 0.5, w, TagsId(0))).unwrap();
        }
        graph
    }

    #[test]
    fn test_requires_contraction() {
        assert!(validate_against_dijkstra(&ring(4), 10, 1).is_err());
    }

    #[test]
    fn test_contracted_ring_validates() {
        let mut graph = ring(12);
        contract_graph(&mut graph, ContractionConfig::default()).unwrap();

        let report = validate_against_dijkstra(&graph, 200, 42).unwrap();
        assert!(report.is_valid(), "{:?}", report.mismatches);
        assert_eq!(report.queries, 200);
        assert_eq!(report.accuracy(), 1.0);
        verify_shortcuts(&graph).unwrap();
    }

    #[test]
    fn test_bad_shortcut_detected() {
        let mut graph = ring(3);
        let first = graph.find_arc(0, 1).unwrap().unwrap().0;
        let second = graph.find_arc(1, 2).unwrap().unwrap().0;
        graph
            .add_arc(0, 2, EdgeData::shortcut(1.0, 1.0, Shortcut { via: 1, first, second }))
            .unwrap();
        assert!(matches!(
            verify_shortcuts(&graph),
            Err(Error::InconsistentGraphState(_))
        ));
    }
}
