//! Road network routing with contraction hierarchies
//!
//! Pipeline:
//! 1. [`GraphBuilder`] turns a tagged node/way stream into a [`RoutingGraph`]
//!    for one [`VehicleProfile`] and [`Metric`].
//! 2. [`Contractor`] preprocesses it into a contraction hierarchy.
//! 3. [`Router`] answers point-to-point, many-to-many and connectivity
//!    queries, snapping coordinates onto the network first.
//!
//! Graphs can be stored and reloaded between steps with
//! [`RoutingGraph::save`] and [`RoutingGraph::load`].

pub mod builder;
pub mod contraction;
pub mod geodesy;
pub mod graph;
pub mod input;
pub mod ordering;
pub mod path;
pub mod profile;
pub mod router;
pub mod search;
pub mod snapshot;
pub mod spatial;
pub mod tags;
pub mod validate;
pub mod witness;

pub use builder::{BuildStats, GraphBuilder, RoutingGraph};
pub use contraction::{contract_graph, ContractionConfig, ContractionProgress, Contractor, StopSignal};
pub use graph::{Arc, ArcId, DuplicateArc, DynamicGraph, EdgeData, GraphSource, Level, Shortcut, VertexId};
pub use input::{OsmNode, OsmObject, OsmWay};
pub use ordering::{EdgeDifference, VertexOrdering};
pub use path::{PathArena, SegmentHandle};
pub use profile::{profile_by_name, Metric, Oneway, VehicleProfile, WeightFunction};
pub use router::{Matrix, Route, Router, RouterConfig};
pub use search::SearchStrategy;
pub use spatial::RouterPoint;
pub use tags::{TagSet, TagsId, TagsIndex};
pub use validate::{validate_against_dijkstra, verify_shortcuts, ValidationReport};
pub use witness::WitnessCalculator;

pub use wayroute_common::{Coordinate, Error, Result};
