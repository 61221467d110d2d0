//! Mutable adjacency-list graph used from graph building through contraction
//!
//! Arcs live in an arena addressed by [`ArcId`]. Per-vertex outgoing and
//! incoming lists index into that arena. Deleting an arc only unlinks it from
//! the adjacency lists: shortcuts keep referring to the arcs they replace, so
//! arena entries are never reused.

use serde::{Deserialize, Serialize};
use wayroute_common::{Coordinate, Error, Result};

use crate::tags::TagsId;

pub type VertexId = u32;
pub type Level = u32;

/// Stable handle into the arc arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArcId(pub u32);

/// The two arcs a shortcut stands for, joined at `via`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shortcut {
    pub via: VertexId,
    /// `source → via`
    pub first: ArcId,
    /// `via → target`
    pub second: ArcId,
}

/// Payload of a directed arc
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Cost of traversal (seconds for the fastest metric, meters for shortest)
    pub weight: f64,
    /// Geometric length in meters
    pub distance: f64,
    /// `None` for shortcuts
    pub tags: Option<TagsId>,
    pub shortcut: Option<Shortcut>,
}

impl EdgeData {
    pub fn original(weight: f64, distance: f64, tags: TagsId) -> Self {
        Self {
            weight,
            distance,
            tags: Some(tags),
            shortcut: None,
        }
    }

    pub fn shortcut(weight: f64, distance: f64, shortcut: Shortcut) -> Self {
        Self {
            weight,
            distance,
            tags: None,
            shortcut: Some(shortcut),
        }
    }

    pub fn is_shortcut(&self) -> bool {
        self.shortcut.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub source: VertexId,
    pub target: VertexId,
    pub data: EdgeData,
}

/// Outcome of an insertion that collides with an existing arc of the same pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateArc {
    /// Drop the new arc
    KeepExisting,
    /// Remove every existing arc of the pair, then insert the new one
    Replace,
    KeepBoth,
}

/// Keep whichever of two parallel arcs is lighter (ties keep the existing one)
pub fn keep_lighter(existing: &EdgeData, new: &EdgeData) -> DuplicateArc {
    if new.weight < existing.weight {
        DuplicateArc::Replace
    } else {
        DuplicateArc::KeepExisting
    }
}

/// Read access needed by the search algorithms
///
/// Methods take ids that were validated by the caller and index directly.
pub trait GraphSource {
    fn vertex_count(&self) -> usize;
    fn out_arcs(&self, v: VertexId) -> &[ArcId];
    fn in_arcs(&self, v: VertexId) -> &[ArcId];
    fn arc_at(&self, id: ArcId) -> &Arc;
    fn level_of(&self, v: VertexId) -> Option<Level>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynamicGraph {
    coordinates: Vec<Coordinate>,
    levels: Vec<Option<Level>>,
    arcs: Vec<Arc>,
    outgoing: Vec<Vec<ArcId>>,
    incoming: Vec<Vec<ArcId>>,
    live_arcs: usize,
}

impl DynamicGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize, arcs: usize) -> Self {
        Self {
            coordinates: Vec::with_capacity(vertices),
            levels: Vec::with_capacity(vertices),
            arcs: Vec::with_capacity(arcs),
            outgoing: Vec::with_capacity(vertices),
            incoming: Vec::with_capacity(vertices),
            live_arcs: 0,
        }
    }

    pub fn add_vertex(&mut self, coordinate: Coordinate) -> VertexId {
        let id = self.coordinates.len() as VertexId;
        self.coordinates.push(coordinate);
        self.levels.push(None);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    pub fn vertex(&self, id: VertexId) -> Result<Coordinate> {
        self.check_vertex(id)?;
        Ok(self.coordinates[id as usize])
    }

    /// Coordinate of a vertex known to exist
    pub(crate) fn coordinate(&self, id: VertexId) -> Coordinate {
        self.coordinates[id as usize]
    }

    pub fn vertex_count(&self) -> usize {
        self.coordinates.len()
    }

    /// Arcs currently linked into adjacency lists
    pub fn arc_count(&self) -> usize {
        self.live_arcs
    }

    /// Arena size, including arcs deleted from adjacency
    pub fn arena_len(&self) -> usize {
        self.arcs.len()
    }

    pub fn check_vertex(&self, id: VertexId) -> Result<()> {
        if (id as usize) < self.coordinates.len() {
            Ok(())
        } else {
            Err(Error::InvalidVertexId {
                id,
                count: self.coordinates.len(),
            })
        }
    }

    /// Append a directed arc, keeping any existing parallel arcs
    ///
    /// Self-loops are meaningless for routing and are ignored (`Ok(None)`).
    pub fn add_arc(&mut self, from: VertexId, to: VertexId, data: EdgeData) -> Result<Option<ArcId>> {
        self.add_arc_with(from, to, data, |_, _| DuplicateArc::KeepBoth)
    }

    /// Append a directed arc, letting `resolve` arbitrate against every
    /// existing `from → to` arc
    ///
    /// Any `KeepExisting` verdict drops the new arc; otherwise any `Replace`
    /// verdict removes all existing arcs of the pair first.
    pub fn add_arc_with<F>(
        &mut self,
        from: VertexId,
        to: VertexId,
        data: EdgeData,
        mut resolve: F,
    ) -> Result<Option<ArcId>>
    where
        F: FnMut(&EdgeData, &EdgeData) -> DuplicateArc,
    {
        self.check_vertex(from)?;
        self.check_vertex(to)?;
        if !(data.weight.is_finite() && data.weight >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "arc {from}->{to} has invalid weight {}",
                data.weight
            )));
        }
        if from == to {
            return Ok(None);
        }

        let mut replace = false;
        for &id in &self.outgoing[from as usize] {
            let existing = &self.arcs[id.0 as usize];
            if existing.target != to {
                continue;
            }
            match resolve(&existing.data, &data) {
                DuplicateArc::KeepExisting => return Ok(None),
                DuplicateArc::Replace => replace = true,
                DuplicateArc::KeepBoth => {}
            }
        }
        if replace {
            self.delete_arc(from, to)?;
        }

        Ok(Some(self.push_arc(from, to, data)))
    }

    fn push_arc(&mut self, from: VertexId, to: VertexId, data: EdgeData) -> ArcId {
        let id = ArcId(self.arcs.len() as u32);
        self.arcs.push(Arc {
            source: from,
            target: to,
            data,
        });
        self.outgoing[from as usize].push(id);
        self.incoming[to as usize].push(id);
        self.live_arcs += 1;
        id
    }

    /// Unlink every `from → to` arc; returns how many were removed
    ///
    /// Arena entries stay addressable so shortcuts can still be unpacked.
    pub fn delete_arc(&mut self, from: VertexId, to: VertexId) -> Result<usize> {
        self.check_vertex(from)?;
        self.check_vertex(to)?;

        let arcs = &self.arcs;
        let before = self.outgoing[from as usize].len();
        self.outgoing[from as usize].retain(|id| arcs[id.0 as usize].target != to);
        let removed = before - self.outgoing[from as usize].len();
        self.incoming[to as usize].retain(|id| arcs[id.0 as usize].source != from);

        self.live_arcs -= removed;
        Ok(removed)
    }

    /// Outgoing arcs of `v`
    pub fn arcs(&self, v: VertexId) -> Result<impl Iterator<Item = (ArcId, &Arc)> + '_> {
        self.check_vertex(v)?;
        Ok(self.outgoing[v as usize]
            .iter()
            .map(move |&id| (id, &self.arcs[id.0 as usize])))
    }

    /// Incoming arcs of `v`
    pub fn incoming(&self, v: VertexId) -> Result<impl Iterator<Item = (ArcId, &Arc)> + '_> {
        self.check_vertex(v)?;
        Ok(self.incoming[v as usize]
            .iter()
            .map(move |&id| (id, &self.arcs[id.0 as usize])))
    }

    pub fn arc(&self, id: ArcId) -> Result<&Arc> {
        self.arcs.get(id.0 as usize).ok_or(Error::InvalidArcId {
            id: id.0,
            count: self.arcs.len(),
        })
    }

    /// Lightest live arc `from → to`
    pub fn find_arc(&self, from: VertexId, to: VertexId) -> Result<Option<(ArcId, &Arc)>> {
        Ok(self
            .arcs(from)?
            .filter(|(_, arc)| arc.target == to)
            .min_by(|(_, a), (_, b)| a.data.weight.total_cmp(&b.data.weight)))
    }

    pub fn level(&self, v: VertexId) -> Result<Option<Level>> {
        self.check_vertex(v)?;
        Ok(self.levels[v as usize])
    }

    pub fn set_level(&mut self, v: VertexId, level: Level) -> Result<()> {
        self.check_vertex(v)?;
        self.levels[v as usize] = Some(level);
        Ok(())
    }

    pub fn is_contracted(&self, v: VertexId) -> bool {
        self.levels
            .get(v as usize)
            .is_some_and(|level| level.is_some())
    }

    /// Every vertex has a contraction level
    pub fn is_fully_contracted(&self) -> bool {
        self.levels.iter().all(Option::is_some)
    }

    pub fn shortcut_count(&self) -> usize {
        self.outgoing
            .iter()
            .flatten()
            .filter(|id| self.arcs[id.0 as usize].data.is_shortcut())
            .count()
    }

    /// All live shortcut arcs as `(arc id, source, target, shortcut)`
    pub fn shortcuts(&self) -> Vec<(ArcId, VertexId, VertexId, Shortcut)> {
        self.outgoing
            .iter()
            .flatten()
            .filter_map(|&id| {
                let arc = &self.arcs[id.0 as usize];
                arc.data
                    .shortcut
                    .map(|shortcut| (id, arc.source, arc.target, shortcut))
            })
            .collect()
    }

    /// Expand `id` into the original (non-shortcut) arcs it represents, in
    /// travel order
    pub fn unpack(&self, id: ArcId, out: &mut Vec<ArcId>) -> Result<()> {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let arc = self.arc(current)?;
            match arc.data.shortcut {
                Some(shortcut) => {
                    let first = self.arc(shortcut.first)?;
                    let second = self.arc(shortcut.second)?;
                    if first.source != arc.source
                        || first.target != shortcut.via
                        || second.source != shortcut.via
                        || second.target != arc.target
                    {
                        return Err(Error::InconsistentGraphState(format!(
                            "shortcut {} ({}->{} via {}) does not match its parts",
                            current.0, arc.source, arc.target, shortcut.via
                        )));
                    }
                    // second is pushed first so first is expanded first
                    stack.push(shortcut.second);
                    stack.push(shortcut.first);
                }
                None => out.push(current),
            }
        }
        Ok(())
    }

    /// Check that adjacency lists and the arena agree, e.g. after decoding
    pub fn check_structure(&self) -> Result<()> {
        let n = self.coordinates.len();
        if self.levels.len() != n || self.outgoing.len() != n || self.incoming.len() != n {
            return Err(Error::InconsistentGraphState(format!(
                "per-vertex tables disagree on vertex count {n}"
            )));
        }
        let mut live = 0;
        for (v, ids) in self.outgoing.iter().enumerate() {
            for &id in ids {
                let arc = self.arc(id)?;
                if arc.source as usize != v || arc.target as usize >= n {
                    return Err(Error::InconsistentGraphState(format!(
                        "arc {} listed under vertex {v} runs {}->{}",
                        id.0, arc.source, arc.target
                    )));
                }
                live += 1;
            }
        }
        let incoming: usize = self.incoming.iter().map(Vec::len).sum();
        if live != self.live_arcs || incoming != self.live_arcs {
            return Err(Error::InconsistentGraphState(format!(
                "{live} outgoing and {incoming} incoming entries for {} arcs",
                self.live_arcs
            )));
        }
        Ok(())
    }

    /// Drop all levels, e.g. before contracting again
    pub fn clear_levels(&mut self) {
        self.levels.iter_mut().for_each(|level| *level = None);
    }
}

impl GraphSource for DynamicGraph {
    fn vertex_count(&self) -> usize {
        self.coordinates.len()
    }

    #[inline]
    fn out_arcs(&self, v: VertexId) -> &[ArcId] {
        &self.outgoing[v as usize]
    }

    #[inline]
    fn in_arcs(&self, v: VertexId) -> &[ArcId] {
        &self.incoming[v as usize]
    }

    #[inline]
    fn arc_at(&self, id: ArcId) -> &Arc {
        &self.arcs[id.0 as usize]
    }

    #[inline]
    fn level_of(&self, v: VertexId) -> Option<Level> {
        self.levels[v as usize]
    }
}
