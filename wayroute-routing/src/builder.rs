//! Build a weighted directed graph from a tagged node/way stream

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wayroute_common::{Coordinate, Result};

use crate::geodesy::distance_m;
use crate::graph::{keep_lighter, DynamicGraph, EdgeData, VertexId};
use crate::input::{OsmObject, OsmWay};
use crate::profile::{profile_by_name, Metric, VehicleProfile};
use crate::tags::{TagsId, TagsIndex};

/// Graph plus everything needed to interpret its weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingGraph {
    pub graph: DynamicGraph,
    pub tags: TagsIndex,
    /// Name of the vehicle profile the weights were computed for
    pub profile: String,
    pub metric: Metric,
}

impl RoutingGraph {
    pub fn vehicle_profile(&self) -> Result<Box<dyn VehicleProfile>> {
        profile_by_name(&self.profile)
    }

    pub fn is_contracted(&self) -> bool {
        self.graph.vertex_count() > 0 && self.graph.is_fully_contracted()
    }
}

/// Counters reported after a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub nodes_seen: usize,
    pub ways_kept: usize,
    pub ways_skipped: usize,
    /// Segments dropped because an endpoint had no coordinate
    pub missing_segments: usize,
}

pub struct GraphBuilder {
    profile: Box<dyn VehicleProfile>,
    metric: Metric,
    coordinates: FxHashMap<i64, Coordinate>,
    ways: Vec<(Vec<i64>, TagsId)>,
    tags: TagsIndex,
    stats: BuildStats,
}

impl GraphBuilder {
    pub fn new(profile: Box<dyn VehicleProfile>, metric: Metric) -> Self {
        Self {
            profile,
            metric,
            coordinates: FxHashMap::default(),
            ways: Vec::new(),
            tags: TagsIndex::new(),
            stats: BuildStats::default(),
        }
    }

    /// Accept one object; nodes and ways may arrive in any order
    pub fn push(&mut self, object: OsmObject) {
        match object {
            OsmObject::Node(node) => {
                let coordinate = node.coordinate();
                if coordinate.is_valid() {
                    self.coordinates.insert(node.id, coordinate);
                    self.stats.nodes_seen += 1;
                } else {
                    warn!(node = node.id, lat = node.lat, lon = node.lon, "node with invalid coordinate ignored");
                }
            }
            OsmObject::Way(way) => self.push_way(way),
        }
    }

    fn push_way(&mut self, way: OsmWay) {
        let tags = way.tag_set();
        if way.nodes.len() < 2 || !self.profile.can_traverse(&tags) {
            self.stats.ways_skipped += 1;
            return;
        }
        let id = self.tags.add(tags);
        self.ways.push((way.nodes, id));
        self.stats.ways_kept += 1;
    }

    pub fn extend<I: IntoIterator<Item = OsmObject>>(&mut self, objects: I) {
        for object in objects {
            self.push(object);
        }
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Materialize the graph
    ///
    /// Vertex ids follow the order in which kept ways first reference their
    /// nodes, so the same input always yields the same numbering.
    pub fn build(mut self) -> Result<RoutingGraph> {
        let weight_fn = self.metric.weight_function();
        let mut graph = DynamicGraph::new();
        let mut vertex_of: FxHashMap<i64, VertexId> = FxHashMap::default();

        for (nodes, tags_id) in &self.ways {
            let tags = self.tags.get(*tags_id)?;
            let oneway = self.profile.oneway(tags);

            for pair in nodes.windows(2) {
                let (Some(&a), Some(&b)) =
                    (self.coordinates.get(&pair[0]), self.coordinates.get(&pair[1]))
                else {
                    self.stats.missing_segments += 1;
                    continue;
                };
                let from = *vertex_of
                    .entry(pair[0])
                    .or_insert_with(|| graph.add_vertex(a));
                let to = *vertex_of
                    .entry(pair[1])
                    .or_insert_with(|| graph.add_vertex(b));

                let distance = distance_m(a, b);
                let Some(weight) = weight_fn.weight(self.profile.as_ref(), tags, distance) else {
                    continue;
                };
                let data = EdgeData::original(weight, distance, *tags_id);

                if oneway.allows_forward() {
                    graph.add_arc_with(from, to, data, keep_lighter)?;
                }
                if oneway.allows_backward() {
                    graph.add_arc_with(to, from, data, keep_lighter)?;
                }
            }
        }

        if self.stats.missing_segments > 0 {
            warn!(
                segments = self.stats.missing_segments,
                "segments skipped because a node had no coordinate"
            );
        }
        debug!(tag_sets = self.tags.len(), "tags interned");
        info!(
            profile = self.profile.name(),
            metric = %self.metric,
            vertices = graph.vertex_count(),
            arcs = graph.arc_count(),
            ways = self.stats.ways_kept,
            skipped_ways = self.stats.ways_skipped,
            "graph built"
        );

        Ok(RoutingGraph {
            graph,
            tags: self.tags,
            profile: self.profile.name().to_string(),
            metric: self.metric,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::OsmNode;
    use crate::profile::CarProfile;
    use std::collections::BTreeMap;

    fn node(id: i64, lat: f64, lon: f64) -> OsmObject {
        OsmObject::Node(OsmNode {
            id,
            lat,
            lon,
            tags: BTreeMap::new(),
        })
    }

    fn way(id: i64, nodes: &[i64], tags: &[(&str, &str)]) -> OsmObject {
        OsmObject::Way(OsmWay {
            id,
            nodes: nodes.to_vec(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    fn builder() -> GraphBuilder {
        GraphBuilder::new(Box::new(CarProfile), Metric::Fastest)
    }

    #[test]
    fn test_two_way_road_gives_two_arcs() {
        let mut b = builder();
        b.extend([
            way(1, &[10, 20, 30], &[("highway", "residential")]),
            node(10, 50.0, 4.0),
            node(20, 50.001, 4.0),
            node(30, 50.002, 4.0),
        ]);
        let routing = b.build().unwrap();

        assert_eq!(routing.graph.vertex_count(), 3);
        assert_eq!(routing.graph.arc_count(), 4);
        assert_eq!(routing.profile, "car");
        // first-reference order
        assert!((routing.graph.vertex(0).unwrap().lat - 50.0).abs() < 1e-6);

        let (_, arc) = routing.graph.find_arc(0, 1).unwrap().unwrap();
        // ~111 m at 30 km/h
        assert!((arc.data.distance - 111.2).abs() < 1.0);
        assert!((arc.data.weight - arc.data.distance / (30.0 / 3.6)).abs() < 1e-9);
    }

    #[test]
    fn test_oneway_gives_single_direction() {
        let mut b = builder();
        b.extend([
            node(1, 0.0, 0.0),
            node(2, 0.0, 0.001),
            way(5, &[1, 2], &[("highway", "primary"), ("oneway", "-1")]),
        ]);
        let routing = b.build().unwrap();
        assert_eq!(routing.graph.arc_count(), 1);
        assert!(routing.graph.find_arc(1, 0).unwrap().is_some());
        assert!(routing.graph.find_arc(0, 1).unwrap().is_none());
    }

    #[test]
    fn test_untraversable_ways_and_missing_nodes() {
        let mut b = builder();
        b.extend([
            node(1, 0.0, 0.0),
            node(2, 0.0, 0.001),
            way(5, &[1, 2], &[("highway", "footway")]),
            way(6, &[1, 2, 3], &[("highway", "service")]),
        ]);
        assert_eq!(b.stats().ways_skipped, 1);
        let routing = b.build().unwrap();
        assert_eq!(routing.graph.vertex_count(), 2);
        assert_eq!(routing.graph.arc_count(), 2);
    }

    #[test]
    fn test_parallel_ways_keep_lighter() {
        let mut b = builder();
        b.extend([
            node(1, 0.0, 0.0),
            node(2, 0.0, 0.001),
            way(5, &[1, 2], &[("highway", "residential")]),
            way(6, &[1, 2], &[("highway", "primary")]),
        ]);
        let routing = b.build().unwrap();
        assert_eq!(routing.graph.arc_count(), 2);
        let (_, arc) = routing.graph.find_arc(0, 1).unwrap().unwrap();
        let primary = routing.tags.get(arc.data.tags.unwrap()).unwrap();
        assert_eq!(primary.get("highway"), Some("primary"));
    }
}
