//! Command-line arguments

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wayroute_routing::{Coordinate, Metric};

#[derive(Parser, Debug)]
#[command(name = "wayroute")]
#[command(version)]
#[command(about = "Road network routing with contraction hierarchies")]
#[command(long_about = "Builds routing graphs from tagged node/way streams and answers queries:
  wayroute build town.jsonl town.wrg --profile car
  wayroute contract town.wrg town.ch.wrg
  wayroute route town.ch.wrg --from 50.85,4.35 --to 50.84,4.36
  wayroute matrix town.ch.wrg --points '50.85,4.35;50.84,4.36;50.86,4.34'")]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// TOML file with [contraction] and [router] sections
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a routing graph from a JSON lines node/way stream
    Build {
        /// Input file, one node or way object per line
        input: PathBuf,
        /// Output graph snapshot
        output: PathBuf,
        /// Vehicle profile: car, bicycle or pedestrian
        #[arg(long, default_value = "car")]
        profile: String,
        /// Weight metric: fastest or shortest
        #[arg(long, default_value = "fastest")]
        metric: Metric,
    },

    /// Contract a graph into a contraction hierarchy
    Contract {
        /// Input graph snapshot
        input: PathBuf,
        /// Output graph snapshot
        output: PathBuf,
        /// Stop after this many contracted vertices and save the partial result
        #[arg(long)]
        max_steps: Option<usize>,
        /// Settle budget per witness search (overrides config)
        #[arg(long)]
        max_settled: Option<usize>,
        /// Run witness searches on one thread
        #[arg(long)]
        sequential: bool,
    },

    /// Find the best route between two coordinates
    Route {
        /// Graph snapshot
        graph: PathBuf,
        /// Start coordinate (lat,lon)
        #[arg(long, allow_hyphen_values = true)]
        from: Coordinate,
        /// End coordinate (lat,lon)
        #[arg(long, allow_hyphen_values = true)]
        to: Coordinate,
        /// Vehicle profile; defaults to the one the graph was built for
        #[arg(long)]
        profile: Option<String>,
        /// Snapping radius in meters (overrides config)
        #[arg(long)]
        radius: Option<f64>,
    },

    /// Weights between every pair of points, as JSON
    Matrix {
        /// Graph snapshot
        graph: PathBuf,
        /// Semicolon separated coordinates: lat,lon;lat,lon;...
        #[arg(long, allow_hyphen_values = true)]
        points: String,
        /// Vehicle profile; defaults to the one the graph was built for
        #[arg(long)]
        profile: Option<String>,
        /// Snapping radius in meters (overrides config)
        #[arg(long)]
        radius: Option<f64>,
    },

    /// Check that a location lies on a well-connected part of the network
    Check {
        /// Graph snapshot
        graph: PathBuf,
        /// Location to check (lat,lon)
        #[arg(long, allow_hyphen_values = true)]
        at: Coordinate,
        /// Weight both searches must reach
        #[arg(long)]
        max_weight: f64,
        /// Vehicle profile; defaults to the one the graph was built for
        #[arg(long)]
        profile: Option<String>,
    },

    /// Compare contraction hierarchy queries against plain Dijkstra
    Validate {
        /// Contracted graph snapshot
        graph: PathBuf,
        /// Number of random queries
        #[arg(long, default_value = "1000")]
        queries: usize,
        /// Seed for picking query pairs
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

/// Parse `lat,lon;lat,lon;...`
pub fn parse_points(points: &str) -> anyhow::Result<Vec<Coordinate>> {
    let coordinates = points
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<Coordinate>()
                .map_err(|e| anyhow::anyhow!("invalid point '{p}': {e}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    if coordinates.is_empty() {
        anyhow::bail!("at least one point is required");
    }
    Ok(coordinates)
}
