//! Query-time searches
//!
//! - [`dijkstra`]: plain Dijkstra over original arcs
//! - [`ch`]: bidirectional upward search over a contracted graph
//! - [`many_to_many`]: bucket-based distance matrices over a contracted graph
//!
//! All searches accept several seeds per side with initial weights, which is
//! how a location part-way along an arc enters the graph.

pub mod ch;
pub mod dijkstra;
pub mod many_to_many;
pub mod state;

use serde::{Deserialize, Serialize};
use wayroute_common::Result;

use crate::graph::{ArcId, DynamicGraph, GraphSource, VertexId};
use crate::path::PathArena;
use state::SearchState;

/// Which search answers point-to-point queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    PlainDijkstra,
    #[default]
    ContractionHierarchy,
}

/// Search seed: a vertex and the weight already spent to reach it
pub type Seed = (VertexId, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow outgoing arcs
    Forward,
    /// Follow incoming arcs against their direction
    Backward,
}

/// Where the best path was found
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meeting {
    /// Total weight, seed weights included
    pub weight: f64,
    pub vertex: VertexId,
}

/// An unpacked vertex path over original arcs
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPath {
    pub weight: f64,
    pub vertices: Vec<VertexId>,
    pub arcs: Vec<ArcId>,
}

/// Parent arcs from `v` back to the seed that reached it, `v`'s arc first
pub(crate) fn walk_parents<G: GraphSource>(
    graph: &G,
    state: &SearchState,
    v: VertexId,
    direction: Direction,
) -> Vec<ArcId> {
    let mut arcs = Vec::new();
    let mut current = v;
    while let Some(id) = state.parent(current) {
        if arcs.len() > graph.vertex_count() {
            break;
        }
        arcs.push(id);
        let arc = graph.arc_at(id);
        current = match direction {
            Direction::Forward => arc.source,
            Direction::Backward => arc.target,
        };
    }
    arcs
}

/// Stitch the two halves of a search tree together at `meet`
///
/// `forward` lists the arcs walked back from `meet` to a source, `backward`
/// the arcs walked from `meet` on to a target. Shortcuts are unpacked.
pub(crate) fn assemble_path(
    graph: &DynamicGraph,
    weight: f64,
    meet: VertexId,
    forward: &[ArcId],
    backward: &[ArcId],
) -> Result<SearchPath> {
    let mut arena = PathArena::new();
    let mut unpacked = Vec::new();

    let mut head = arena.start(meet);
    let mut head_arcs = Vec::new();
    for &id in forward {
        unpacked.clear();
        graph.unpack(id, &mut unpacked)?;
        for &original in unpacked.iter().rev() {
            let arc = graph.arc(original)?;
            head = arena.extend(head, arc.source, arc.data.weight)?;
            head_arcs.push(original);
        }
    }
    let head = arena.reverse(head)?;
    head_arcs.reverse();

    let mut tail = arena.start(meet);
    let mut tail_arcs = Vec::new();
    for &id in backward {
        unpacked.clear();
        graph.unpack(id, &mut unpacked)?;
        for &original in &unpacked {
            let arc = graph.arc(original)?;
            tail = arena.extend(tail, arc.target, arc.data.weight)?;
            tail_arcs.push(original);
        }
    }

    let joined = arena.concatenate(head, tail)?;
    head_arcs.extend(tail_arcs);
    Ok(SearchPath {
        weight,
        vertices: arena.vertices(joined)?,
        arcs: head_arcs,
    })
}
