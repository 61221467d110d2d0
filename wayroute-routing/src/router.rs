//! Query façade over a built (and usually contracted) routing graph
//!
//! The router owns its graph, so nothing can change it while queries run.
//! Every method takes `&self`; concurrent queries are fine.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wayroute_common::{Coordinate, Error, Result};

use crate::builder::RoutingGraph;
use crate::graph::{DynamicGraph, VertexId};
use crate::profile::profile_by_name;
use crate::search::ch::{ChQuery, UpwardCache};
use crate::search::dijkstra::Dijkstra;
use crate::search::many_to_many::many_to_many;
use crate::search::{Direction, SearchPath, SearchStrategy, Seed};
use crate::spatial::{RouterPoint, SpatialIndex};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Maximum snapping distance for [`Router::resolve`]
    pub resolve_radius_m: f64,
    pub strategy: SearchStrategy,
    pub parallel_matrix: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            resolve_radius_m: 50.0,
            strategy: SearchStrategy::ContractionHierarchy,
            parallel_matrix: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    /// Graph vertices passed, in order
    pub vertices: Vec<VertexId>,
    /// Start location, vertex coordinates, end location
    pub coordinates: Vec<Coordinate>,
    pub weight: f64,
    pub distance_m: f64,
}

/// Row-major `sources × targets` weights
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub weights: Vec<Option<f64>>,
}

impl Matrix {
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.weights.get(row * self.cols + col).copied().flatten()
    }

    /// Weights from source `row`, `None` past the last row
    pub fn row(&self, row: usize) -> Option<&[Option<f64>]> {
        if row >= self.rows {
            return None;
        }
        self.weights.get(row * self.cols..(row + 1) * self.cols)
    }
}

/// Entry into the graph from a snapped point: vertex, weight, meters
type Entry = (VertexId, f64, f64);

pub struct Router {
    graph: RoutingGraph,
    config: RouterConfig,
    spatial: SpatialIndex,
    upward: UpwardCache,
}

impl Router {
    pub fn new(graph: RoutingGraph, config: RouterConfig) -> Result<Self> {
        if !(config.resolve_radius_m.is_finite() && config.resolve_radius_m > 0.0) {
            return Err(Error::InvalidInput(format!(
                "resolve radius must be positive, got {}",
                config.resolve_radius_m
            )));
        }
        if config.strategy == SearchStrategy::ContractionHierarchy
            && !graph.graph.is_fully_contracted()
        {
            return Err(Error::InconsistentGraphState(
                "contraction hierarchy search needs a fully contracted graph".to_string(),
            ));
        }

        let spatial = SpatialIndex::build(&graph.graph);
        info!(
            vertices = graph.graph.vertex_count(),
            segments = spatial.len(),
            strategy = ?config.strategy,
            "router ready"
        );
        Ok(Self {
            upward: UpwardCache::new(graph.graph.vertex_count()),
            graph,
            config,
            spatial,
        })
    }

    pub fn graph(&self) -> &RoutingGraph {
        &self.graph
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Give the graph back; memoized query data is dropped
    pub fn into_graph(self) -> RoutingGraph {
        self.graph
    }

    fn dynamic(&self) -> &DynamicGraph {
        &self.graph.graph
    }

    fn check_vehicle(&self, vehicle: &str) -> Result<()> {
        let profile = profile_by_name(vehicle)?;
        if profile.name() == self.graph.profile {
            Ok(())
        } else {
            Err(Error::UnknownProfile {
                name: vehicle.to_string(),
                suggestion: Some(self.graph.profile.clone()),
            })
        }
    }

    pub fn resolve(&self, coordinate: Coordinate) -> Result<RouterPoint> {
        self.resolve_with_radius(coordinate, self.config.resolve_radius_m)
    }

    pub fn resolve_with_radius(&self, coordinate: Coordinate, radius_m: f64) -> Result<RouterPoint> {
        self.spatial.resolve(self.dynamic(), coordinate, radius_m)
    }

    /// Reject points that were not resolved against this graph
    fn check_point(&self, point: &RouterPoint) -> Result<()> {
        let graph = self.dynamic();
        graph.check_vertex(point.source)?;
        graph.check_vertex(point.target)?;
        let mismatch = |what: &str| {
            Error::InconsistentGraphState(format!(
                "router point on {}->{} has a {what} arc that does not match the segment",
                point.source, point.target
            ))
        };
        if let Some(id) = point.forward {
            let arc = graph.arc(id)?;
            if (arc.source, arc.target) != (point.source, point.target) {
                return Err(mismatch("forward"));
            }
        }
        if let Some(id) = point.backward {
            let arc = graph.arc(id)?;
            if (arc.source, arc.target) != (point.target, point.source) {
                return Err(mismatch("backward"));
            }
        }
        if !(0.0..=1.0).contains(&point.offset) {
            return Err(Error::InvalidInput(format!(
                "router point offset must be within [0, 1], got {}",
                point.offset
            )));
        }
        Ok(())
    }

    /// Vertices reachable when leaving `point`
    fn exits(&self, point: &RouterPoint) -> Result<Vec<Entry>> {
        self.check_point(point)?;
        let graph = self.dynamic();
        let mut entries = Vec::with_capacity(2);
        if let Some(id) = point.forward {
            let arc = graph.arc(id)?;
            let rest = 1.0 - point.offset;
            entries.push((point.target, rest * arc.data.weight, rest * arc.data.distance));
        }
        if let Some(id) = point.backward {
            let arc = graph.arc(id)?;
            entries.push((point.source, point.offset * arc.data.weight, point.offset * arc.data.distance));
        }
        Ok(entries)
    }

    /// Vertices from which `point` can be reached, with the remaining cost
    fn approaches(&self, point: &RouterPoint) -> Result<Vec<Entry>> {
        self.check_point(point)?;
        let graph = self.dynamic();
        let mut entries = Vec::with_capacity(2);
        if let Some(id) = point.forward {
            let arc = graph.arc(id)?;
            entries.push((point.source, point.offset * arc.data.weight, point.offset * arc.data.distance));
        }
        if let Some(id) = point.backward {
            let arc = graph.arc(id)?;
            let rest = 1.0 - point.offset;
            entries.push((point.target, rest * arc.data.weight, rest * arc.data.distance));
        }
        Ok(entries)
    }

    /// Travel along the shared segment without entering the graph
    fn direct(&self, from: &RouterPoint, to: &RouterPoint) -> Result<Option<(f64, f64)>> {
        if (from.source, from.target) != (to.source, to.target) {
            return Ok(None);
        }
        let graph = self.dynamic();
        let mut best: Option<(f64, f64)> = None;
        if let (Some(id), true) = (from.forward, from.offset <= to.offset) {
            let arc = graph.arc(id)?;
            let part = to.offset - from.offset;
            best = Some((part * arc.data.weight, part * arc.data.distance));
        }
        if let (Some(id), true) = (from.backward, from.offset >= to.offset) {
            let arc = graph.arc(id)?;
            let part = from.offset - to.offset;
            let candidate = (part * arc.data.weight, part * arc.data.distance);
            if best.map_or(true, |(w, _)| candidate.0 < w) {
                best = Some(candidate);
            }
        }
        Ok(best)
    }

    fn seeds(entries: &[Entry]) -> Vec<Seed> {
        entries.iter().map(|&(v, w, _)| (v, w)).collect()
    }

    fn search_path(&self, sources: &[Seed], targets: &[Seed]) -> Result<Option<SearchPath>> {
        let graph = self.dynamic();
        let n = graph.vertex_count();
        match self.config.strategy {
            SearchStrategy::ContractionHierarchy => {
                let mut query = ChQuery::new(n);
                query
                    .shortest(graph, &self.upward, sources, targets)
                    .map(|meeting| query.path(graph, meeting))
                    .transpose()
            }
            SearchStrategy::PlainDijkstra => {
                let mut dijkstra = Dijkstra::new(n);
                dijkstra
                    .shortest(graph, sources, targets)
                    .map(|meeting| dijkstra.path(graph, meeting))
                    .transpose()
            }
        }
    }

    fn no_route(from: &RouterPoint, to: &RouterPoint) -> Error {
        Error::NoRouteFound {
            from: from.location.to_string(),
            to: to.location.to_string(),
        }
    }

    /// Best route between two snapped points
    pub fn calculate(&self, vehicle: &str, from: &RouterPoint, to: &RouterPoint) -> Result<Route> {
        self.check_vehicle(vehicle)?;
        let exits = self.exits(from)?;
        let approaches = self.approaches(to)?;
        let direct = self.direct(from, to)?;

        let found = self.search_path(&Self::seeds(&exits), &Self::seeds(&approaches))?;
        let graph = self.dynamic();

        let via_graph = match found {
            Some(path) if direct.map_or(true, |(w, _)| path.weight < w) => path,
            _ => {
                let (weight, distance_m) = direct.ok_or_else(|| Self::no_route(from, to))?;
                debug!(weight, "route stays on one segment");
                return Ok(Route {
                    vertices: Vec::new(),
                    coordinates: vec![from.location, to.location],
                    weight,
                    distance_m,
                });
            }
        };

        let (Some(&first), Some(&last)) = (via_graph.vertices.first(), via_graph.vertices.last()) else {
            return Err(Error::InconsistentGraphState("search returned an empty path".to_string()));
        };
        let head = exits
            .iter()
            .filter(|e| e.0 == first)
            .map(|e| e.2)
            .fold(f64::INFINITY, f64::min);
        let tail = approaches
            .iter()
            .filter(|e| e.0 == last)
            .map(|e| e.2)
            .fold(f64::INFINITY, f64::min);
        let mut distance_m = head + tail;
        for &id in &via_graph.arcs {
            distance_m += graph.arc(id)?.data.distance;
        }

        let mut coordinates = Vec::with_capacity(via_graph.vertices.len() + 2);
        coordinates.push(from.location);
        for &v in &via_graph.vertices {
            coordinates.push(graph.vertex(v)?);
        }
        coordinates.push(to.location);

        Ok(Route {
            vertices: via_graph.vertices,
            coordinates,
            weight: via_graph.weight,
            distance_m,
        })
    }

    /// Resolve both coordinates and route between them
    pub fn route(&self, vehicle: &str, from: Coordinate, to: Coordinate) -> Result<Route> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        self.calculate(vehicle, &from, &to)
    }

    /// Weight of the best route, `None` when there is none
    pub fn calculate_weight(&self, vehicle: &str, from: &RouterPoint, to: &RouterPoint) -> Result<Option<f64>> {
        match self.calculate(vehicle, from, to) {
            Ok(route) => Ok(Some(route.weight)),
            Err(Error::NoRouteFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Weights between every source and every target
    pub fn calculate_many_to_many(
        &self,
        vehicle: &str,
        sources: &[RouterPoint],
        targets: &[RouterPoint],
    ) -> Result<Matrix> {
        self.check_vehicle(vehicle)?;
        let graph = self.dynamic();
        let source_seeds: Vec<Vec<Seed>> = sources
            .iter()
            .map(|p| self.exits(p).map(|e| Self::seeds(&e)))
            .collect::<Result<_>>()?;
        let target_seeds: Vec<Vec<Seed>> = targets
            .iter()
            .map(|p| self.approaches(p).map(|e| Self::seeds(&e)))
            .collect::<Result<_>>()?;

        let mut weights = match self.config.strategy {
            SearchStrategy::ContractionHierarchy => many_to_many(
                graph,
                &self.upward,
                &source_seeds,
                &target_seeds,
                self.config.parallel_matrix,
            ),
            SearchStrategy::PlainDijkstra => self.dijkstra_matrix(&source_seeds, &target_seeds),
        };

        for (i, from) in sources.iter().enumerate() {
            for (j, to) in targets.iter().enumerate() {
                if let Some((direct, _)) = self.direct(from, to)? {
                    let cell = &mut weights[i * targets.len() + j];
                    if cell.map_or(true, |w| direct <= w) {
                        *cell = Some(direct);
                    }
                }
            }
        }

        Ok(Matrix {
            rows: sources.len(),
            cols: targets.len(),
            weights,
        })
    }

    fn dijkstra_matrix(&self, sources: &[Vec<Seed>], targets: &[Vec<Seed>]) -> Vec<Option<f64>> {
        let graph = self.dynamic();
        let n = graph.vertex_count();
        let row = |dijkstra: &mut Dijkstra, seeds: &Vec<Seed>| -> Vec<Option<f64>> {
            let dist = dijkstra.one_to_all(graph, seeds);
            targets
                .iter()
                .map(|entries| {
                    let best = entries
                        .iter()
                        .map(|&(v, w)| dist[v as usize] + w)
                        .fold(f64::INFINITY, f64::min);
                    best.is_finite().then_some(best)
                })
                .collect()
        };

        let rows: Vec<Vec<Option<f64>>> = if self.config.parallel_matrix {
            sources
                .par_iter()
                .map_init(|| Dijkstra::new(n), |dijkstra, seeds| row(dijkstra, seeds))
                .collect()
        } else {
            let mut dijkstra = Dijkstra::new(n);
            sources.iter().map(|seeds| row(&mut dijkstra, seeds)).collect()
        };
        rows.into_iter().flatten().collect()
    }

    /// Whether `point` is part of a network of at least `max_weight` in
    /// both directions
    ///
    /// Both a forward search leaving the point and a backward search
    /// arriving at it have to reach `max_weight` before running out of
    /// vertices. Small islands and dead-end one-way traps fail.
    pub fn check_connectivity(&self, vehicle: &str, point: &RouterPoint, max_weight: f64) -> Result<bool> {
        self.check_vehicle(vehicle)?;
        if !(max_weight.is_finite() && max_weight >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "max weight must be a non-negative number, got {max_weight}"
            )));
        }
        let graph = self.dynamic();
        let mut dijkstra = Dijkstra::new(graph.vertex_count());

        let forward = Self::seeds(&self.exits(point)?);
        if !dijkstra.reaches(graph, &forward, Direction::Forward, max_weight) {
            return Ok(false);
        }
        let backward = Self::seeds(&self.approaches(point)?);
        Ok(dijkstra.reaches(graph, &backward, Direction::Backward, max_weight))
    }
}
