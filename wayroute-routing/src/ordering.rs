//! Vertex importance for contraction order
//!
//! Lower priority is contracted first; ties go to the lower vertex id.

use serde::{Deserialize, Serialize};

use crate::graph::{DynamicGraph, VertexId};
use crate::witness::{neighbors, WitnessCalculator};

/// Bookkeeping the contractor keeps per vertex
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexState {
    /// Neighbors already contracted
    pub contracted_neighbors: u32,
    /// Length of the longest chain of contracted vertices leading here
    pub depth: u32,
}

pub trait VertexOrdering: Send + Sync {
    fn priority(
        &self,
        graph: &DynamicGraph,
        state: &VertexState,
        v: VertexId,
        witness: &mut WitnessCalculator,
    ) -> f64;
}

/// Edge difference heuristic
///
/// `edge_difference_weight × (shortcuts − removed arcs)
///  + contracted_neighbors_weight × contracted neighbors
///  + depth_weight × depth`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeDifference {
    pub edge_difference_weight: f64,
    pub contracted_neighbors_weight: f64,
    pub depth_weight: f64,
}

impl Default for EdgeDifference {
    fn default() -> Self {
        Self {
            edge_difference_weight: 2.0,
            contracted_neighbors_weight: 1.0,
            depth_weight: 1.0,
        }
    }
}

impl VertexOrdering for EdgeDifference {
    fn priority(
        &self,
        graph: &DynamicGraph,
        state: &VertexState,
        v: VertexId,
        witness: &mut WitnessCalculator,
    ) -> f64 {
        let (incoming, outgoing) = neighbors(graph, v);
        let removed = (incoming.len() + outgoing.len()) as f64;
        let shortcuts: usize = incoming
            .iter()
            .map(|u| witness.plan_from(graph, v, u, &outgoing).len())
            .sum();

        self.edge_difference_weight * (shortcuts as f64 - removed)
            + self.contracted_neighbors_weight * state.contracted_neighbors as f64
            + self.depth_weight * state.depth as f64
    }
}
