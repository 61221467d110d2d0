//! Reusable Dijkstra state with version stamping (O(1) reset)

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::graph::{ArcId, VertexId};

#[derive(Clone, Copy)]
struct Entry {
    dist: f64,
    parent: Option<ArcId>,
    version: u32,
}

const UNREACHED: Entry = Entry {
    dist: f64::INFINITY,
    parent: None,
    version: 0,
};

pub struct SearchState {
    entries: Vec<Entry>,
    version: u32,
    heap: BinaryHeap<Reverse<(OrderedFloat<f64>, VertexId)>>,
    settled: usize,
}

impl SearchState {
    pub fn new(n_vertices: usize) -> Self {
        Self {
            entries: vec![UNREACHED; n_vertices],
            version: 1,
            heap: BinaryHeap::with_capacity(1024),
            settled: 0,
        }
    }

    pub fn reset(&mut self) {
        self.version = self.version.wrapping_add(1);
        if self.version == 0 {
            // wrapped: stale stamps could collide with the new version
            for entry in &mut self.entries {
                entry.version = 0;
            }
            self.version = 1;
        }
        self.heap.clear();
        self.settled = 0;
    }

    #[inline(always)]
    pub fn dist(&self, v: VertexId) -> f64 {
        let entry = &self.entries[v as usize];
        if entry.version == self.version {
            entry.dist
        } else {
            f64::INFINITY
        }
    }

    /// Arc through which `v` was last improved
    #[inline(always)]
    pub fn parent(&self, v: VertexId) -> Option<ArcId> {
        let entry = &self.entries[v as usize];
        if entry.version == self.version {
            entry.parent
        } else {
            None
        }
    }

    /// Lower the tentative distance of `v`; returns whether it improved
    #[inline(always)]
    pub fn relax(&mut self, v: VertexId, dist: f64, parent: Option<ArcId>) -> bool {
        if dist >= self.dist(v) {
            return false;
        }
        self.entries[v as usize] = Entry {
            dist,
            parent,
            version: self.version,
        };
        self.heap.push(Reverse((OrderedFloat(dist), v)));
        true
    }

    /// Pop the next settled vertex, skipping stale heap entries
    pub fn pop(&mut self) -> Option<(VertexId, f64)> {
        while let Some(Reverse((OrderedFloat(dist), v))) = self.heap.pop() {
            if dist > self.dist(v) {
                continue;
            }
            self.settled += 1;
            return Some((v, dist));
        }
        None
    }

    /// Smallest live tentative distance in the queue
    pub fn peek_min(&mut self) -> Option<f64> {
        while let Some(&Reverse((OrderedFloat(dist), v))) = self.heap.peek() {
            if dist > self.dist(v) {
                self.heap.pop();
                continue;
            }
            return Some(dist);
        }
        None
    }

    /// Vertices settled since the last reset
    pub fn settled(&self) -> usize {
        self.settled
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}
