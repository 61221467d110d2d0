//! Command implementations
//!
//! Results go to `out` as JSON; logs and progress go to stderr.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};
use wayroute_routing::input::read_objects_from_path;
use wayroute_routing::{
    profile_by_name, validate_against_dijkstra, verify_shortcuts, Contractor, Coordinate, Metric,
    Route, Router, RouterConfig, RouterPoint, RoutingGraph, SearchStrategy,
};

use crate::cli::{parse_points, Cli, Commands};
use crate::config::WayrouteConfig;
use crate::progress::{contraction_bar, spinner};

pub fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let config = WayrouteConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Build {
            input,
            output,
            profile,
            metric,
        } => build(&input, &output, &profile, metric),
        Commands::Contract {
            input,
            output,
            max_steps,
            max_settled,
            sequential,
        } => {
            let mut contraction = config.contraction;
            if max_settled.is_some() {
                contraction.max_settled = max_settled;
            }
            if sequential {
                contraction.parallel_witness = false;
            }
            contract(&input, &output, contraction, max_steps)
        }
        Commands::Route {
            graph,
            from,
            to,
            profile,
            radius,
        } => {
            let router = open_router(&graph, config.router, radius)?;
            let vehicle = vehicle(&router, profile);
            let route = route(&router, &vehicle, from, to)?;
            write_json(out, &route)
        }
        Commands::Matrix {
            graph,
            points,
            profile,
            radius,
        } => {
            let coordinates = parse_points(&points)?;
            let router = open_router(&graph, config.router, radius)?;
            let vehicle = vehicle(&router, profile);
            let matrix = matrix(&router, &vehicle, &coordinates)?;
            write_json(out, &matrix)
        }
        Commands::Check {
            graph,
            at,
            max_weight,
            profile,
        } => {
            let router = open_router(&graph, config.router, None)?;
            let vehicle = vehicle(&router, profile);
            let point = router.resolve(at)?;
            let connected = router.check_connectivity(&vehicle, &point, max_weight)?;
            write_json(
                out,
                &CheckOutput {
                    point,
                    max_weight,
                    connected,
                },
            )
        }
        Commands::Validate {
            graph,
            queries,
            seed,
        } => {
            let graph = load(&graph)?;
            let shortcuts = verify_shortcuts(&graph.graph).context("shortcut check failed")?;
            info!(shortcuts, "shortcuts unpack consistently");
            let report = validate_against_dijkstra(&graph.graph, queries, seed)?;
            write_json(out, &report)?;
            if !report.is_valid() {
                anyhow::bail!(
                    "{} of {} queries disagree with Dijkstra",
                    report.incorrect,
                    report.queries
                );
            }
            Ok(())
        }
    }
}

fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn load(path: &Path) -> Result<RoutingGraph> {
    let bar = spinner(&format!("loading {}", path.display()))?;
    let graph = RoutingGraph::load(path)
        .with_context(|| format!("failed to load graph {}", path.display()))?;
    bar.finish_and_clear();
    Ok(graph)
}

fn save(graph: &RoutingGraph, path: &Path) -> Result<()> {
    graph
        .save(path)
        .with_context(|| format!("failed to save graph {}", path.display()))
}

fn build(input: &Path, output: &Path, profile: &str, metric: Metric) -> Result<()> {
    let start = Instant::now();
    let mut builder = wayroute_routing::GraphBuilder::new(profile_by_name(profile)?, metric);

    let bar = spinner(&format!("reading {}", input.display()))?;
    let objects = read_objects_from_path(input)
        .with_context(|| format!("failed to open {}", input.display()))?;
    for object in objects {
        builder.push(object.with_context(|| format!("in {}", input.display()))?);
        bar.tick();
    }
    bar.finish_and_clear();

    let stats = builder.stats();
    let graph = builder.build()?;
    if graph.graph.vertex_count() == 0 {
        warn!(
            ways_skipped = stats.ways_skipped,
            "no traversable ways for this profile, graph is empty"
        );
    }
    save(&graph, output)?;
    info!(
        output = %output.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "build finished"
    );
    Ok(())
}

fn contract(
    input: &Path,
    output: &Path,
    config: wayroute_routing::ContractionConfig,
    max_steps: Option<usize>,
) -> Result<()> {
    let mut graph = load(input)?;
    let total = graph.graph.vertex_count();

    let mut contractor = Contractor::new(&mut graph.graph, config)?;
    let already = contractor.progress().contracted;
    let stop = contractor.stop_signal();
    let bar = contraction_bar(total as u64)?;
    bar.set_position(already as u64);

    let progress = contractor.contract(|p| {
        bar.set_position(p.contracted as u64);
        bar.set_message(format!("{} shortcuts", p.shortcuts));
        if max_steps.is_some_and(|max| p.contracted - already >= max) {
            stop.stop();
        }
    })?;
    bar.finish_and_clear();

    if !progress.is_complete() {
        warn!(
            contracted = progress.contracted,
            total = progress.total,
            "saving a partially contracted graph; run contract again to finish"
        );
    }
    save(&graph, output)
}

/// Open a graph for querying, falling back to Dijkstra when it is not
/// fully contracted
fn open_router(path: &Path, mut config: RouterConfig, radius: Option<f64>) -> Result<Router> {
    let graph = load(path)?;
    if let Some(radius) = radius {
        config.resolve_radius_m = radius;
    }
    if config.strategy == SearchStrategy::ContractionHierarchy && !graph.is_contracted() {
        warn!("graph is not contracted, using plain Dijkstra");
        config.strategy = SearchStrategy::PlainDijkstra;
    }
    Ok(Router::new(graph, config)?)
}

fn vehicle(router: &Router, profile: Option<String>) -> String {
    profile.unwrap_or_else(|| router.graph().profile.clone())
}

#[derive(Debug, Serialize)]
struct RouteOutput {
    from: RouterPoint,
    to: RouterPoint,
    #[serde(flatten)]
    route: Route,
}

fn route(router: &Router, vehicle: &str, from: Coordinate, to: Coordinate) -> Result<RouteOutput> {
    let start = Instant::now();
    let from = router.resolve(from).context("start location")?;
    let to = router.resolve(to).context("end location")?;
    let route = router.calculate(vehicle, &from, &to)?;
    info!(
        weight = route.weight,
        distance_m = route.distance_m,
        vertices = route.vertices.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "route found"
    );
    Ok(RouteOutput { from, to, route })
}

#[derive(Debug, Serialize)]
struct MatrixOutput {
    points: Vec<RouterPoint>,
    /// `weights[i][j]` from point `i` to point `j`, `null` when unreachable
    weights: Vec<Vec<Option<f64>>>,
}

fn matrix(router: &Router, vehicle: &str, coordinates: &[Coordinate]) -> Result<MatrixOutput> {
    let points = coordinates
        .iter()
        .map(|&c| router.resolve(c).with_context(|| format!("point {c}")))
        .collect::<Result<Vec<_>>>()?;
    let start = Instant::now();
    let matrix = router.calculate_many_to_many(vehicle, &points, &points)?;
    info!(
        size = points.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "matrix computed"
    );
    let weights = (0..matrix.rows)
        .filter_map(|i| matrix.row(i).map(<[_]>::to_vec))
        .collect();
    Ok(MatrixOutput { points, weights })
}

#[derive(Debug, Serialize)]
struct CheckOutput {
    point: RouterPoint,
    max_weight: f64,
    connected: bool,
}
