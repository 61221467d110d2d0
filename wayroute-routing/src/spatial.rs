//! Spatial index for resolving coordinates onto the road network

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use rustc_hash::FxHashSet;
use serde::Serialize;
use wayroute_common::{Coordinate, Error, Result};

use crate::geodesy::{degrees_covering, distance_m, project_onto_segment};
use crate::graph::{ArcId, DynamicGraph, GraphSource, VertexId};

/// One road segment between two vertices, regardless of direction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedSegment {
    pub a: [f64; 2], // [lon, lat]
    pub b: [f64; 2],
    pub source: VertexId,
    pub target: VertexId,
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.a, self.b)
    }
}

impl PointDistance for IndexedSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.b[0] - self.a[0];
        let dy = self.b[1] - self.a[1];
        let len_2 = dx * dx + dy * dy;
        let t = if len_2 > 0.0 {
            (((point[0] - self.a[0]) * dx + (point[1] - self.a[1]) * dy) / len_2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let px = self.a[0] + t * dx - point[0];
        let py = self.a[1] + t * dy - point[1];
        px * px + py * py
    }
}

/// A location snapped onto a segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouterPoint {
    pub source: VertexId,
    pub target: VertexId,
    /// Fraction of the way from `source` to `target`, in `[0, 1]`
    pub offset: f64,
    /// The snapped location on the segment
    pub location: Coordinate,
    /// Distance from the queried coordinate to `location`
    pub distance_m: f64,
    /// Lightest original arc `source → target`
    #[serde(skip)]
    pub forward: Option<ArcId>,
    /// Lightest original arc `target → source`
    #[serde(skip)]
    pub backward: Option<ArcId>,
}

/// Lightest non-shortcut arc `from → to`
fn original_arc(graph: &DynamicGraph, from: VertexId, to: VertexId) -> Option<ArcId> {
    graph
        .out_arcs(from)
        .iter()
        .copied()
        .filter(|&id| {
            let arc = graph.arc_at(id);
            arc.target == to && !arc.data.is_shortcut()
        })
        .min_by(|&x, &y| {
            graph
                .arc_at(x)
                .data
                .weight
                .total_cmp(&graph.arc_at(y).data.weight)
        })
}

pub struct SpatialIndex {
    tree: RTree<IndexedSegment>,
}

impl SpatialIndex {
    /// Index every vertex pair joined by at least one original arc
    pub fn build(graph: &DynamicGraph) -> Self {
        let mut seen: FxHashSet<(VertexId, VertexId)> = FxHashSet::default();
        let mut segments = Vec::new();

        for v in 0..graph.vertex_count() as VertexId {
            for &id in graph.out_arcs(v) {
                let arc = graph.arc_at(id);
                if arc.data.is_shortcut() {
                    continue;
                }
                let pair = (arc.source.min(arc.target), arc.source.max(arc.target));
                if !seen.insert(pair) {
                    continue;
                }
                let (source, target) = pair;
                segments.push(IndexedSegment {
                    a: graph.coordinate(source).to_xy(),
                    b: graph.coordinate(target).to_xy(),
                    source,
                    target,
                });
            }
        }

        Self {
            tree: RTree::bulk_load(segments),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Snap `coordinate` onto the nearest segment within `radius_m`
    pub fn resolve(
        &self,
        graph: &DynamicGraph,
        coordinate: Coordinate,
        radius_m: f64,
    ) -> Result<RouterPoint> {
        if !coordinate.is_valid() {
            return Err(Error::InvalidInput(format!(
                "coordinate out of range: {coordinate}"
            )));
        }

        let search_deg = degrees_covering(radius_m, coordinate.lat as f64);
        let mut best: Option<(f64, f64, Coordinate, &IndexedSegment)> = None;
        for segment in self
            .tree
            .locate_within_distance(coordinate.to_xy(), search_deg * search_deg)
        {
            let (offset, location) = project_onto_segment(
                coordinate,
                Coordinate::from_xy(segment.a),
                Coordinate::from_xy(segment.b),
            );
            let distance = distance_m(coordinate, location);
            let closer = best.map_or(true, |(d, _, _, s)| {
                distance < d || (distance == d && (segment.source, segment.target) < (s.source, s.target))
            });
            if closer {
                best = Some((distance, offset, location, segment));
            }
        }

        match best {
            Some((distance, offset, location, segment)) if distance <= radius_m => Ok(RouterPoint {
                source: segment.source,
                target: segment.target,
                offset,
                location,
                distance_m: distance,
                forward: original_arc(graph, segment.source, segment.target),
                backward: original_arc(graph, segment.target, segment.source),
            }),
            _ => Err(Error::UnresolvableLocation {
                location: coordinate,
                radius_m,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeData;
    use crate::tags::TagsId;

    fn graph() -> DynamicGraph {
        // 0 -- 1 two-way along the equator, 1 -> 2 one-way north
        let mut graph = DynamicGraph::new();
        graph.add_vertex(Coordinate::new(0.0, 0.0));
        graph.add_vertex(Coordinate::new(0.0, 0.001));
        graph.add_vertex(Coordinate::new(0.001, 0.001));
        let data = EdgeData::original(1.0, 111.0, TagsId(0));
        graph.add_arc(0, 1, data).unwrap();
        graph.add_arc(1, 0, data).unwrap();
        graph.add_arc(1, 2, data).unwrap();
        graph
    }

    #[test]
    fn test_one_entry_per_pair() {
        let g = graph();
        assert_eq!(SpatialIndex::build(&g).len(), 2);
    }

    #[test]
    fn test_resolve_onto_segment() {
        let g = graph();
        let index = SpatialIndex::build(&g);
        let point = index
            .resolve(&g, Coordinate::new(0.0001, 0.00025), 50.0)
            .unwrap();

        assert_eq!((point.source, point.target), (0, 1));
        assert!((point.offset - 0.25).abs() < 1e-3);
        assert!((point.distance_m - 11.1).abs() < 0.5);
        assert!(point.forward.is_some());
        assert!(point.backward.is_some());
    }

    #[test]
    fn test_resolve_oneway_segment() {
        let g = graph();
        let index = SpatialIndex::build(&g);
        let point = index
            .resolve(&g, Coordinate::new(0.0005, 0.0011), 50.0)
            .unwrap();
        assert_eq!((point.source, point.target), (1, 2));
        assert!(point.forward.is_some());
        assert!(point.backward.is_none());
    }

    #[test]
    fn test_resolve_beyond_radius() {
        let g = graph();
        let index = SpatialIndex::build(&g);
        let far = Coordinate::new(0.01, 0.01);
        assert!(matches!(
            index.resolve(&g, far, 50.0),
            Err(Error::UnresolvableLocation { .. })
        ));
        assert!(index.resolve(&g, far, 5_000.0).is_ok());
    }

    #[test]
    fn test_resolve_just_inside_radius() {
        let g = graph();
        let index = SpatialIndex::build(&g);
        // ~49.97 m north of the middle of 0 -- 1
        let near = Coordinate::new(0.0004494, 0.0005);
        let point = index.resolve(&g, near, 50.0).unwrap();
        assert_eq!((point.source.min(point.target), point.source.max(point.target)), (0, 1));
        assert!(point.distance_m > 49.0 && point.distance_m <= 50.0, "got {}", point.distance_m);
    }
}
