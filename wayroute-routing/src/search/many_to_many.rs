//! Bucket-based many-to-many over a contracted graph
//!
//! 1. One backward upward search per target stores `(vertex, target, dist)`
//!    in buckets.
//! 2. Buckets are sorted by vertex once.
//! 3. One forward upward search per source scans the bucket of every vertex
//!    it settles. Sources are independent and run in parallel.

use rayon::prelude::*;
use std::time::Instant;
use tracing::debug;

use super::ch::{upward_sweep, UpwardCache};
use super::state::SearchState;
use super::{Direction, Seed};
use crate::graph::{GraphSource, VertexId};

/// Sorted bucket structure for O(log n) lookup
#[derive(Default)]
pub struct SortedBuckets {
    // (vertex, target index, dist) sorted by vertex
    items: Vec<(VertexId, u32, f64)>,
}

impl SortedBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, vertex: VertexId, target: u32, dist: f64) {
        self.items.push((vertex, target, dist));
    }

    pub fn sort(&mut self) {
        self.items.sort_unstable_by_key(|&(vertex, target, _)| (vertex, target));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline(always)]
    pub fn get(&self, vertex: VertexId) -> &[(VertexId, u32, f64)] {
        let start = self.items.partition_point(|&(v, _, _)| v < vertex);
        let end = self.items[start..].partition_point(|&(v, _, _)| v == vertex) + start;
        &self.items[start..end]
    }
}

/// Row-major `sources × targets` weights; `None` where unreachable
pub fn many_to_many<G: GraphSource + Sync>(
    graph: &G,
    cache: &UpwardCache,
    sources: &[Vec<Seed>],
    targets: &[Vec<Seed>],
    parallel: bool,
) -> Vec<Option<f64>> {
    let start = Instant::now();
    let n = graph.vertex_count();
    let n_targets = targets.len();

    let mut buckets = SortedBuckets::new();
    let mut state = SearchState::new(n);
    for (index, seeds) in targets.iter().enumerate() {
        upward_sweep(graph, cache, &mut state, seeds, Direction::Backward, |v, dist| {
            buckets.add(v, index as u32, dist)
        });
    }
    buckets.sort();

    let row = |state: &mut SearchState, seeds: &Vec<Seed>| -> Vec<Option<f64>> {
        let mut row = vec![f64::INFINITY; n_targets];
        upward_sweep(graph, cache, state, seeds, Direction::Forward, |v, dist| {
            for &(_, target, back) in buckets.get(v) {
                let total = dist + back;
                if total < row[target as usize] {
                    row[target as usize] = total;
                }
            }
        });
        row.into_iter()
            .map(|w| w.is_finite().then_some(w))
            .collect()
    };

    let rows: Vec<Vec<Option<f64>>> = if parallel {
        sources
            .par_iter()
            .map_init(|| SearchState::new(n), |state, seeds| row(state, seeds))
            .collect()
    } else {
        sources.iter().map(|seeds| row(&mut state, seeds)).collect()
    };

    debug!(
        sources = sources.len(),
        targets = n_targets,
        bucket_entries = buckets.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "many-to-many computed"
    );
    rows.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contraction::{contract_graph, ContractionConfig};
    use crate::graph::{DynamicGraph, EdgeData};
    use crate::search::ch::ChQuery;
    use crate::tags::TagsId;
    use wayroute_common::Coordinate;

    #[test]
    fn test_sorted_buckets() {
        let mut buckets = SortedBuckets::new();
        buckets.add(5, 0, 1.0);
        buckets.add(2, 1, 2.0);
        buckets.add(5, 1, 3.0);
        buckets.sort();
        assert_eq!(buckets.get(5).len(), 2);
        assert_eq!(buckets.get(2), &[(2, 1, 2.0)]);
        assert!(buckets.get(3).is_empty());
    }

    #[test]
    fn test_matrix_matches_pairwise() {
        let mut graph = DynamicGraph::new();
        for i in 0..6 {
            graph.add_vertex(Coordinate::new(0.0, i as f32 * 0.001));
        }
        let arcs = [
            (0, 1, 2.0),
            (1, 2, 2.0),
            (2, 3, 1.0),
            (3, 0, 4.0),
            (1, 4, 1.0),
            (4, 2, 0.5),
            (5, 0, 1.0),
        ];
        for (a, b, w) in arcs {
            graph
                .add_arc(a, b, EdgeData::original(w, w, TagsId(0)))
                .unwrap();
        }
        contract_graph(&mut graph, ContractionConfig::default()).unwrap();

        let cache = UpwardCache::new(6);
        let points: Vec<Vec<Seed>> = (0..6).map(|v| vec![(v, 0.0)]).collect();
        let sequential = many_to_many(&graph, &cache, &points, &points, false);
        let parallel = many_to_many(&graph, &cache, &points, &points, true);
        assert_eq!(sequential, parallel);

        let mut query = ChQuery::new(6);
        for s in 0..6u32 {
            for t in 0..6u32 {
                let pairwise = query
                    .shortest(&graph, &cache, &points[s as usize], &points[t as usize])
                    .map(|m| m.weight);
                assert_eq!(sequential[(s * 6 + t) as usize], pairwise, "{s}->{t}");
            }
        }
        // nothing leads to 5
        assert_eq!(sequential[5], None);
    }
}
