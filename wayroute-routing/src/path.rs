//! Backward-linked path segments stored in an arena
//!
//! A handle names the last segment of a path; following `previous` links
//! walks back to the start. Segments are immutable, so many paths can share
//! a common prefix.

use wayroute_common::{Error, Result};

use crate::graph::VertexId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentHandle(u32);

#[derive(Debug, Clone, Copy)]
struct Segment {
    vertex: VertexId,
    /// Cumulative weight from the start of the path
    weight: f64,
    previous: Option<SegmentHandle>,
}

#[derive(Debug, Default)]
pub struct PathArena {
    segments: Vec<Segment>,
}

impl PathArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn push(&mut self, segment: Segment) -> SegmentHandle {
        let handle = SegmentHandle(self.segments.len() as u32);
        self.segments.push(segment);
        handle
    }

    fn segment(&self, handle: SegmentHandle) -> Result<&Segment> {
        self.segments.get(handle.0 as usize).ok_or_else(|| {
            Error::InconsistentGraphState(format!("unknown path segment {}", handle.0))
        })
    }

    /// One-vertex path with zero weight
    pub fn start(&mut self, vertex: VertexId) -> SegmentHandle {
        self.push(Segment {
            vertex,
            weight: 0.0,
            previous: None,
        })
    }

    /// Append `vertex`, reached over an arc of `weight`
    pub fn extend(&mut self, handle: SegmentHandle, vertex: VertexId, weight: f64) -> Result<SegmentHandle> {
        let total = self.segment(handle)?.weight + weight;
        Ok(self.push(Segment {
            vertex,
            weight: total,
            previous: Some(handle),
        }))
    }

    pub fn weight(&self, handle: SegmentHandle) -> Result<f64> {
        Ok(self.segment(handle)?.weight)
    }

    pub fn last(&self, handle: SegmentHandle) -> Result<VertexId> {
        Ok(self.segment(handle)?.vertex)
    }

    pub fn first(&self, handle: SegmentHandle) -> Result<VertexId> {
        let mut segment = self.segment(handle)?;
        while let Some(previous) = segment.previous {
            segment = self.segment(previous)?;
        }
        Ok(segment.vertex)
    }

    /// `(vertex, cumulative weight)` from start to end
    pub fn to_entries(&self, handle: SegmentHandle) -> Result<Vec<(VertexId, f64)>> {
        let mut entries = Vec::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            let segment = self.segment(h)?;
            entries.push((segment.vertex, segment.weight));
            current = segment.previous;
        }
        entries.reverse();
        Ok(entries)
    }

    pub fn vertices(&self, handle: SegmentHandle) -> Result<Vec<VertexId>> {
        Ok(self
            .to_entries(handle)?
            .into_iter()
            .map(|(vertex, _)| vertex)
            .collect())
    }

    /// Same vertices in opposite order; weights are re-based so the new path
    /// also starts at zero
    pub fn reverse(&mut self, handle: SegmentHandle) -> Result<SegmentHandle> {
        let entries = self.to_entries(handle)?;
        let total = entries.last().map_or(0.0, |&(_, w)| w);

        let mut iter = entries.iter().rev();
        let Some(&(end, _)) = iter.next() else {
            return Err(Error::InconsistentGraphState("empty path".to_string()));
        };
        let mut reversed = self.start(end);
        for &(vertex, weight) in iter {
            let previous = self.segment(reversed)?.weight;
            reversed = self.extend(reversed, vertex, (total - weight) - previous)?;
        }
        Ok(reversed)
    }

    /// `first` followed by `second`; the last vertex of `first` must be the
    /// first vertex of `second`
    pub fn concatenate(&mut self, first: SegmentHandle, second: SegmentHandle) -> Result<SegmentHandle> {
        let join = self.last(first)?;
        let entries = self.to_entries(second)?;
        match entries.first() {
            Some(&(start, _)) if start == join => {}
            Some(&(start, _)) => {
                return Err(Error::InconsistentGraphState(format!(
                    "cannot join path ending at {join} with path starting at {start}"
                )))
            }
            None => return Err(Error::InconsistentGraphState("empty path".to_string())),
        }

        let mut joined = first;
        let mut previous_weight = 0.0;
        for &(vertex, weight) in &entries[1..] {
            joined = self.extend(joined, vertex, weight - previous_weight)?;
            previous_weight = weight;
        }
        Ok(joined)
    }
}
