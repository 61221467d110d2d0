//! End-to-end: tagged objects → graph → contraction → snapshot → queries

use std::collections::BTreeMap;
use wayroute_routing::{
    contract_graph, profile_by_name, ContractionConfig, Coordinate, Error, GraphBuilder, Metric,
    OsmNode, OsmObject, OsmWay, Router, RouterConfig, RoutingGraph, SearchStrategy,
};

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

/// A 5x5 street grid (~111 m blocks) with a one-way avenue on row 2
/// (eastbound) and a footway that cars must ignore.
fn town() -> Vec<OsmObject> {
    let mut objects = Vec::new();
    let id = |r: i64, c: i64| 100 + r * 10 + c;
    for r in 0..5 {
        for c in 0..5 {
            objects.push(node(id(r, c), 50.0 + r as f64 * 0.001, 4.0 + c as f64 * 0.0015));
        }
    }
    let mut way_id = 1;
    for r in 0..5 {
        let nodes: Vec<i64> = (0..5).map(|c| id(r, c)).collect();
        let tags: &[(&str, &str)] = if r == 2 {
            &[("highway", "primary"), ("oneway", "yes")]
        } else {
            &[("highway", "residential")]
        };
        objects.push(way(way_id, &nodes, tags));
        way_id += 1;
    }
    for c in 0..5 {
        let nodes: Vec<i64> = (0..5).map(|r| id(r, c)).collect();
        objects.push(way(way_id, &nodes, &[("highway", "tertiary")]));
        way_id += 1;
    }
    // diagonal shortcut only pedestrians may use
    objects.push(way(way_id, &[id(0, 0), id(4, 4)], &[("highway", "footway")]));
    objects
}

fn build(profile: &str) -> RoutingGraph {
    let mut builder = GraphBuilder::new(profile_by_name(profile).unwrap(), Metric::Fastest);
    builder.extend(town());
    builder.build().unwrap()
}

fn contracted_car() -> RoutingGraph {
    let mut graph = build("car");
    contract_graph(&mut graph.graph, ContractionConfig::default()).unwrap();
    graph
}

fn plain_router(graph: RoutingGraph) -> Router {
    let config = RouterConfig {
        strategy: SearchStrategy::PlainDijkstra,
        ..Default::default()
    };
    Router::new(graph, config).unwrap()
}

/// Points slightly off the streets, spread over the grid
fn sample_points() -> Vec<Coordinate> {
    vec![
        Coordinate::from_degrees(50.00005, 4.0007),
        Coordinate::from_degrees(50.0021, 4.0030),
        Coordinate::from_degrees(50.0040, 4.0051),
        Coordinate::from_degrees(50.0013, 4.00602),
        Coordinate::from_degrees(50.0030, 4.0001),
        Coordinate::from_degrees(50.0020, 4.0046),
    ]
}

#[test]
fn build_skips_footway_for_cars() {
    let car = build("car");
    let foot = build("pedestrian");
    assert_eq!(car.graph.vertex_count(), 25);
    assert!(foot.graph.arc_count() > car.graph.arc_count());
    assert_eq!(car.tags.len(), 3);
}

#[test]
fn ch_router_matches_plain_router() {
    let ch = Router::new(contracted_car(), RouterConfig::default()).unwrap();
    let plain = plain_router(build("car"));

    for &a in &sample_points() {
        for &b in &sample_points() {
            let from = ch.resolve(a).unwrap();
            let to = ch.resolve(b).unwrap();
            let fast = ch.calculate("car", &from, &to).unwrap();
            let slow = plain
                .calculate("car", &plain.resolve(a).unwrap(), &plain.resolve(b).unwrap())
                .unwrap();
            assert!(
                (fast.weight - slow.weight).abs() < 1e-6,
                "{a} -> {b}: {} vs {}",
                fast.weight,
                slow.weight
            );
        }
    }
}

#[test]
fn many_to_many_matches_pairwise() {
    let router = Router::new(contracted_car(), RouterConfig::default()).unwrap();
    let points: Vec<_> = sample_points()
        .into_iter()
        .map(|c| router.resolve(c).unwrap())
        .collect();

    let matrix = router.calculate_many_to_many("car", &points, &points).unwrap();
    for (i, from) in points.iter().enumerate() {
        for (j, to) in points.iter().enumerate() {
            let pairwise = router.calculate_weight("car", from, to).unwrap();
            match (matrix.get(i, j), pairwise) {
                (Some(m), Some(p)) => assert!((m - p).abs() < 1e-6, "{i}->{j}: {m} vs {p}"),
                (m, p) => assert_eq!(m, p, "{i}->{j}"),
            }
        }
    }
}

#[test]
fn oneway_avenue_is_only_used_eastbound() {
    let router = Router::new(contracted_car(), RouterConfig::default()).unwrap();
    let graph = &router.graph().graph;
    let west = router.resolve(Coordinate::from_degrees(50.002, 4.0002)).unwrap();
    let east = router.resolve(Coordinate::from_degrees(50.002, 4.0058)).unwrap();

    let eastbound = router.calculate("car", &west, &east).unwrap();
    let westbound = router.calculate("car", &east, &west).unwrap();
    assert!(westbound.weight > eastbound.weight);

    // no consecutive pair on the westbound route runs west along row 2
    for pair in westbound.vertices.windows(2) {
        let a = graph.vertex(pair[0]).unwrap();
        let b = graph.vertex(pair[1]).unwrap();
        let on_avenue = (a.lat - 50.002).abs() < 1e-5 && (b.lat - 50.002).abs() < 1e-5;
        assert!(!(on_avenue && b.lon < a.lon), "went west on the avenue");
    }
}

#[test]
fn resolve_beyond_radius_fails() {
    let router = Router::new(contracted_car(), RouterConfig::default()).unwrap();
    let far = Coordinate::from_degrees(50.1, 4.1);
    let err = router.resolve(far).unwrap_err();
    assert!(matches!(err, Error::UnresolvableLocation { .. }));
    assert!(err.is_recoverable());

    // a failed query leaves the router usable
    assert!(router.resolve(sample_points()[0]).is_ok());
}

#[test]
fn connectivity_of_town() {
    let router = Router::new(contracted_car(), RouterConfig::default()).unwrap();
    let point = router.resolve(sample_points()[1]).unwrap();
    assert!(router.check_connectivity("car", &point, 30.0).unwrap());
    assert!(!router.check_connectivity("car", &point, 100_000.0).unwrap());
}

#[test]
fn snapshot_round_trip_answers_identically() {
    let graph = contracted_car();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("town.wrg");
    graph.save(&path).unwrap();
    let loaded = RoutingGraph::load(&path).unwrap();
    assert!(loaded.is_contracted());

    let before = Router::new(graph, RouterConfig::default()).unwrap();
    let after = Router::new(loaded, RouterConfig::default()).unwrap();
    let points = sample_points();
    for pair in points.windows(2) {
        let a = before.route("car", pair[0], pair[1]).unwrap();
        let b = after.route("car", pair[0], pair[1]).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn loading_garbage_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.wrg");
    std::fs::write(&path, b"definitely not a graph").unwrap();
    assert!(matches!(RoutingGraph::load(&path), Err(Error::Serialization(_))));
    assert!(matches!(
        RoutingGraph::load(dir.path().join("missing.wrg")),
        Err(Error::Io(_))
    ));
}
