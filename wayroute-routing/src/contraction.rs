//! Contraction hierarchy preprocessing
//!
//! Vertices are contracted one at a time in order of a lazily maintained
//! priority. Contracting `v` inserts a shortcut `u → w` for every pair of
//! uncontracted neighbors whose shortest connection runs through `v`, then
//! assigns `v` the next level. Arcs are never removed, so levels are what
//! separates the upward and downward graphs at query time.
//!
//! Witness searches of one step run in parallel over a read-only graph;
//! insertion is single-threaded and happens only after every planned
//! shortcut has been validated.

use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};
use wayroute_common::{Error, Result};

use crate::graph::{DuplicateArc, DynamicGraph, EdgeData, GraphSource, Level, Shortcut, VertexId};
use crate::ordering::{EdgeDifference, VertexOrdering, VertexState};
use crate::witness::{neighbors, ShortcutPlan, WitnessCalculator};

/// Below this many incoming neighbors the per-step witness searches run
/// sequentially
const PARALLEL_MIN_SOURCES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractionConfig {
    pub edge_difference_weight: f64,
    pub contracted_neighbors_weight: f64,
    pub depth_weight: f64,
    /// Settle budget per witness search; `None` is unlimited
    pub max_settled: Option<usize>,
    pub parallel_witness: bool,
}

impl Default for ContractionConfig {
    fn default() -> Self {
        let ordering = EdgeDifference::default();
        Self {
            edge_difference_weight: ordering.edge_difference_weight,
            contracted_neighbors_weight: ordering.contracted_neighbors_weight,
            depth_weight: ordering.depth_weight,
            max_settled: None,
            parallel_witness: true,
        }
    }
}

impl ContractionConfig {
    pub fn ordering(&self) -> EdgeDifference {
        EdgeDifference {
            edge_difference_weight: self.edge_difference_weight,
            contracted_neighbors_weight: self.contracted_neighbors_weight,
            depth_weight: self.depth_weight,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let weights = [
            self.edge_difference_weight,
            self.contracted_neighbors_weight,
            self.depth_weight,
        ];
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::InvalidInput(
                "contraction weights must be finite".to_string(),
            ));
        }
        if self.max_settled == Some(0) {
            return Err(Error::InvalidInput(
                "max_settled must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractionProgress {
    pub contracted: usize,
    pub total: usize,
    pub shortcuts: usize,
}

impl ContractionProgress {
    pub fn is_complete(&self) -> bool {
        self.contracted == self.total
    }
}

/// Cooperative cancellation checked between contraction steps
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

type QueueKey = Reverse<(OrderedFloat<f64>, VertexId)>;

fn queue_key(priority: f64, v: VertexId) -> QueueKey {
    Reverse((OrderedFloat(priority), v))
}

pub struct Contractor<'g, O: VertexOrdering = EdgeDifference> {
    graph: &'g mut DynamicGraph,
    config: ContractionConfig,
    ordering: O,
    queue: PriorityQueue<VertexId, QueueKey>,
    states: Vec<VertexState>,
    dirty: Vec<bool>,
    witness: WitnessCalculator,
    next_level: Level,
    contracted: usize,
    shortcuts: usize,
    stop: StopSignal,
    initialized: bool,
}

impl<'g> Contractor<'g, EdgeDifference> {
    pub fn new(graph: &'g mut DynamicGraph, config: ContractionConfig) -> Result<Self> {
        let ordering = config.ordering();
        Self::with_ordering(graph, config, ordering)
    }
}

impl<'g, O: VertexOrdering> Contractor<'g, O> {
    pub fn with_ordering(
        graph: &'g mut DynamicGraph,
        config: ContractionConfig,
        ordering: O,
    ) -> Result<Self> {
        config.validate()?;
        let n = graph.vertex_count();
        let levels: Vec<Level> = (0..n as VertexId)
            .filter_map(|v| graph.level_of(v))
            .collect();
        let contracted = levels.len();
        let next_level = levels.iter().max().map_or(0, |max| max + 1);
        let shortcuts = graph.shortcut_count();

        Ok(Self {
            witness: WitnessCalculator::new(n, config.max_settled),
            graph,
            config,
            ordering,
            queue: PriorityQueue::with_capacity(n),
            states: vec![VertexState::default(); n],
            dirty: vec![false; n],
            next_level,
            contracted,
            shortcuts,
            stop: StopSignal::new(),
            initialized: false,
        })
    }

    /// Signal checked by [`Contractor::contract`] between steps
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn progress(&self) -> ContractionProgress {
        ContractionProgress {
            contracted: self.contracted,
            total: self.graph.vertex_count(),
            shortcuts: self.shortcuts,
        }
    }

    fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        let start = Instant::now();
        let graph: &DynamicGraph = self.graph;
        let pending: Vec<VertexId> = (0..graph.vertex_count() as VertexId)
            .filter(|&v| !graph.is_contracted(v))
            .collect();

        let n = graph.vertex_count();
        let max_settled = self.config.max_settled;
        let ordering = &self.ordering;
        let states = &self.states;
        let priorities: Vec<f64> = if self.config.parallel_witness {
            pending
                .par_iter()
                .map_init(
                    || WitnessCalculator::new(n, max_settled),
                    |witness, &v| ordering.priority(graph, &states[v as usize], v, witness),
                )
                .collect()
        } else {
            pending
                .iter()
                .map(|&v| ordering.priority(graph, &states[v as usize], v, &mut self.witness))
                .collect()
        };

        for (&v, priority) in pending.iter().zip(priorities) {
            self.queue.push(v, queue_key(priority, v));
        }
        info!(
            vertices = pending.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "initial priorities computed"
        );
    }

    /// Contract the next vertex; `Ok(None)` once every vertex has a level
    pub fn step(&mut self) -> Result<Option<VertexId>> {
        self.initialize();

        while let Some((v, Reverse((OrderedFloat(old), _)))) = self.queue.pop() {
            if self.dirty[v as usize] {
                self.dirty[v as usize] = false;
                let priority = self.ordering.priority(
                    self.graph,
                    &self.states[v as usize],
                    v,
                    &mut self.witness,
                );
                let grew_past_next = self
                    .queue
                    .peek()
                    .is_some_and(|(_, next)| queue_key(priority, v) < *next);
                if grew_past_next {
                    trace!(vertex = v, old, priority, "priority increased, reinserted");
                    self.queue.push(v, queue_key(priority, v));
                    continue;
                }
            }

            if let Err(e) = self.contract_vertex(v) {
                self.queue.push(v, queue_key(old, v));
                return Err(e);
            }
            return Ok(Some(v));
        }
        Ok(None)
    }

    /// Contract `v` now regardless of its priority; returns the number of
    /// shortcuts inserted
    ///
    /// On error the graph is left untouched.
    pub fn contract_vertex(&mut self, v: VertexId) -> Result<usize> {
        self.graph.check_vertex(v)?;
        if self.graph.is_contracted(v) {
            return Err(Error::InconsistentGraphState(format!(
                "vertex {v} is already contracted"
            )));
        }

        let plans = self.plan(v);
        self.commit(v, &plans)
    }

    /// Insert the planned shortcuts of `v` and give it the next level
    ///
    /// Every plan is checked before anything is inserted.
    fn commit(&mut self, v: VertexId, plans: &[ShortcutPlan]) -> Result<usize> {
        self.validate_plans(v, plans)?;

        let mut inserted = 0;
        for plan in plans {
            let data = EdgeData::shortcut(
                plan.weight,
                plan.distance,
                Shortcut {
                    via: plan.via,
                    first: plan.first,
                    second: plan.second,
                },
            );
            // never Replace: plain searches still need the original arcs
            let added = self.graph.add_arc_with(plan.from, plan.to, data, |existing, new| {
                if existing.weight <= new.weight {
                    DuplicateArc::KeepExisting
                } else {
                    DuplicateArc::KeepBoth
                }
            })?;
            if added.is_some() {
                inserted += 1;
            }
        }

        let (incoming, outgoing) = neighbors(&*self.graph, v);
        self.graph.set_level(v, self.next_level)?;
        self.queue.remove(&v);

        let depth = self.states[v as usize].depth + 1;
        for n in incoming.iter().chain(outgoing.iter()) {
            let i = n.vertex as usize;
            self.states[i].contracted_neighbors += 1;
            self.states[i].depth = self.states[i].depth.max(depth);
            self.dirty[i] = true;
        }

        debug!(
            vertex = v,
            level = self.next_level,
            shortcuts = inserted,
            "vertex contracted"
        );
        self.next_level += 1;
        self.contracted += 1;
        self.shortcuts += inserted;
        Ok(inserted)
    }

    fn plan(&mut self, v: VertexId) -> Vec<ShortcutPlan> {
        let graph: &DynamicGraph = self.graph;
        let (incoming, outgoing) = neighbors(graph, v);

        if self.config.parallel_witness && incoming.len() >= PARALLEL_MIN_SOURCES {
            let n = graph.vertex_count();
            let max_settled = self.config.max_settled;
            incoming
                .par_iter()
                .map_init(
                    || WitnessCalculator::new(n, max_settled),
                    |witness, u| witness.plan_from(graph, v, u, &outgoing),
                )
                .flatten()
                .collect()
        } else {
            incoming
                .iter()
                .flat_map(|u| self.witness.plan_from(graph, v, u, &outgoing))
                .collect()
        }
    }

    fn validate_plans(&self, v: VertexId, plans: &[ShortcutPlan]) -> Result<()> {
        for plan in plans {
            let first = self.graph.arc(plan.first)?;
            let second = self.graph.arc(plan.second)?;
            let consistent = plan.via == v
                && first.source == plan.from
                && first.target == v
                && second.source == v
                && second.target == plan.to
                && plan.weight == first.data.weight + second.data.weight
                && plan.weight.is_finite()
                && !self.graph.is_contracted(plan.from)
                && !self.graph.is_contracted(plan.to);
            if !consistent {
                return Err(Error::InconsistentGraphState(format!(
                    "shortcut {}->{} via {} does not match arcs {} and {}",
                    plan.from, plan.to, v, plan.first.0, plan.second.0
                )));
            }
        }
        Ok(())
    }

    /// Run to completion or until stopped, reporting after every step
    pub fn contract<F>(&mut self, mut observer: F) -> Result<ContractionProgress>
    where
        F: FnMut(&ContractionProgress),
    {
        let start = Instant::now();
        info!(
            vertices = self.graph.vertex_count(),
            arcs = self.graph.arc_count(),
            "contracting graph"
        );

        while !self.stop.is_stopped() {
            if self.step()?.is_none() {
                break;
            }
            observer(&self.progress());
        }

        let progress = self.progress();
        if progress.is_complete() {
            info!(
                shortcuts = progress.shortcuts,
                arcs = self.graph.arc_count(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "contraction complete"
            );
        } else {
            info!(
                contracted = progress.contracted,
                total = progress.total,
                "contraction stopped early"
            );
        }
        Ok(progress)
    }
}

/// Contract every vertex of `graph` with `config`
pub fn contract_graph(
    graph: &mut DynamicGraph,
    config: ContractionConfig,
) -> Result<ContractionProgress> {
    Contractor::new(graph, config)?.contract(|_| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagsId;
    use wayroute_common::Coordinate;

    fn graph(n: usize, arcs: &[(u32, u32, f64)]) -> DynamicGraph {
        let mut graph = DynamicGraph::new();
        for i in 0..n {
            graph.add_vertex(Coordinate::new(0.0, i as f32 * 0.001));
        }
        for &(a, b, w) in arcs {
            graph
                .add_arc(a, b, EdgeData::original(w, w, TagsId(0)))
                .unwrap();
        }
        graph
    }

    fn sequential() -> ContractionConfig {
        ContractionConfig {
            parallel_witness: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_contract_line_middle_vertex() {
        let mut g = graph(4, &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)]);
        let mut contractor = Contractor::new(&mut g, sequential()).unwrap();
        assert_eq!(contractor.contract_vertex(1).unwrap(), 1);
        assert_eq!(contractor.progress().contracted, 1);

        let (_, shortcut) = g.find_arc(0, 2).unwrap().unwrap();
        assert_eq!(shortcut.data.weight, 2.0);
        assert_eq!(shortcut.data.shortcut.map(|s| s.via), Some(1));
        assert_eq!(g.level(1).unwrap(), Some(0));
    }

    #[test]
    fn test_full_contraction_assigns_unique_levels() {
        let mut g = graph(
            5,
            &[(0, 1, 1.0), (1, 0, 1.0), (1, 2, 1.0), (2, 1, 1.0), (2, 3, 2.0), (3, 4, 1.0), (4, 0, 3.0)],
        );
        let mut steps = 0;
        let progress = Contractor::new(&mut g, sequential())
            .unwrap()
            .contract(|_| steps += 1)
            .unwrap();

        assert!(progress.is_complete());
        assert_eq!(steps, 5);
        let mut levels: Vec<Level> = (0..5).map(|v| g.level(v).unwrap().unwrap()).collect();
        levels.sort_unstable();
        assert_eq!(levels, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_stop_signal_halts_between_steps() {
        let mut g = graph(3, &[(0, 1, 1.0), (1, 2, 1.0)]);
        let mut contractor = Contractor::new(&mut g, sequential()).unwrap();
        let stop = contractor.stop_signal();
        let progress = contractor.contract(|_| stop.stop()).unwrap();
        assert_eq!(progress.contracted, 1);
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_contracting_twice_fails() {
        let mut g = graph(2, &[(0, 1, 1.0)]);
        let mut contractor = Contractor::new(&mut g, sequential()).unwrap();
        contractor.contract_vertex(0).unwrap();
        assert!(matches!(
            contractor.contract_vertex(0),
            Err(Error::InconsistentGraphState(_))
        ));
        assert!(matches!(
            contractor.contract_vertex(7),
            Err(Error::InvalidVertexId { .. })
        ));
    }

    #[test]
    fn test_bad_plan_leaves_graph_untouched() {
        let mut g = graph(3, &[(0, 1, 1.0), (1, 2, 1.0)]);
        let (arena, arcs) = (g.arena_len(), g.arc_count());
        let mut contractor = Contractor::new(&mut g, sequential()).unwrap();

        let plans = contractor.plan(1);
        assert_eq!(plans.len(), 1);

        let mut heavier = plans.clone();
        heavier[0].weight += 1.0;
        let mut swapped = plans.clone();
        swapped[0].second = swapped[0].first;
        for bad in [heavier, swapped] {
            // a valid plan ahead of the bad one must not be inserted either
            let batch = [plans[0], bad[0]];
            assert!(matches!(
                contractor.commit(1, &batch),
                Err(Error::InconsistentGraphState(_))
            ));
        }
        assert_eq!(contractor.progress().contracted, 0);
        assert_eq!(contractor.progress().shortcuts, 0);

        assert_eq!(g.arena_len(), arena);
        assert_eq!(g.arc_count(), arcs);
        assert_eq!(g.level(1).unwrap(), None);
        assert!(g.find_arc(0, 2).unwrap().is_none());
    }

    #[test]
    fn test_resume_counts_existing_shortcuts() {
        let mut g = graph(4, &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)]);
        Contractor::new(&mut g, sequential())
            .unwrap()
            .contract_vertex(1)
            .unwrap();
        let resumed = Contractor::new(&mut g, sequential()).unwrap();
        let progress = resumed.progress();
        assert_eq!(progress.contracted, 1);
        assert_eq!(progress.shortcuts, 1);
    }

    #[test]
    fn test_config_rejects_unknown_keys() {
        let err = serde_json::from_str::<ContractionConfig>(r#"{"max_setled": 5}"#);
        assert!(err.is_err());
        let config: ContractionConfig = serde_json::from_str(r#"{"max_settled": 5}"#).unwrap();
        assert_eq!(config.max_settled, Some(5));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut g = graph(1, &[]);
        let config = ContractionConfig {
            max_settled: Some(0),
            ..Default::default()
        };
        assert!(Contractor::new(&mut g, config).is_err());
    }
}
