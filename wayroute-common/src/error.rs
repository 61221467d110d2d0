//! Error types and utilities for the wayroute routing engine
//!
//! Library code returns these typed errors; the command-line tool wraps them
//! with `anyhow` context at the application boundary.

use strsim::{jaro_winkler, normalized_levenshtein};
use thiserror::Error;

use crate::coordinate::Coordinate;

/// Main error type for wayroute operations
#[derive(Debug, Error)]
pub enum Error {
    /// Vertex id outside `[0, vertex_count)`
    #[error("invalid vertex id {id} (graph has {count} vertices)")]
    InvalidVertexId { id: u32, count: usize },

    /// Arc id outside the arc arena
    #[error("invalid arc id {id} (graph has {count} arcs)")]
    InvalidArcId { id: u32, count: usize },

    /// Tag set handle not present in the tags index
    #[error("invalid tags id {id} (index holds {count} tag sets)")]
    InvalidTagsId { id: u32, count: usize },

    /// No routable arc within the search radius
    #[error("location {location} is unresolvable: no routable edge within {radius_m:.0}m")]
    UnresolvableLocation { location: Coordinate, radius_m: f64 },

    /// Forward and backward searches never met
    #[error("no route found from {from} to {to}")]
    NoRouteFound { from: String, to: String },

    /// Broken internal invariant (programming error)
    #[error("inconsistent graph state: {0}")]
    InconsistentGraphState(String),

    /// Vehicle profile not known or not matching the loaded graph
    #[error("{}", unknown_profile_message(.name, .suggestion.as_deref()))]
    UnknownProfile {
        name: String,
        suggestion: Option<String>,
    },

    /// Invalid configuration or parameters
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encoding or decoding failure
    #[error("serialization error: {0}")]
    Serialization(String),
}

fn unknown_profile_message(name: &str, suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!("unknown vehicle profile '{name}', did you mean '{s}'?"),
        None => format!("unknown vehicle profile '{name}'"),
    }
}

impl Error {
    /// Whether a caller can skip the offending input and keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnresolvableLocation { .. } | Error::NoRouteFound { .. }
        )
    }
}

/// Convenience result type for wayroute operations
pub type Result<T> = std::result::Result<T, Error>;

/// Find the closest candidate name using fuzzy matching
///
/// Scores are 70% Jaro-Winkler plus 30% normalized Levenshtein, with a bonus
/// for a shared prefix of at least four characters. Returns `None` when the
/// input is already a valid name or nothing scores above 0.65.
pub fn suggest_name(input: &str, candidates: &[&str]) -> Option<String> {
    if candidates
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(input))
    {
        return None;
    }

    let input_lower = input.to_lowercase();
    let min_threshold = 0.65;
    let mut best_match = None;
    let mut best_score = 0.0f64;

    for candidate in candidates {
        let candidate_lower = candidate.to_lowercase();

        let jw_score = jaro_winkler(&input_lower, &candidate_lower);
        let lev_score = normalized_levenshtein(&input_lower, &candidate_lower);
        let mut score = (jw_score * 0.7) + (lev_score * 0.3);

        let prefix_len = input_lower.chars().count().min(7);
        if prefix_len >= 4 {
            let input_prefix: String = input_lower.chars().take(prefix_len).collect();
            let candidate_prefix: String = candidate_lower.chars().take(prefix_len).collect();
            let prefix_similarity = normalized_levenshtein(&input_prefix, &candidate_prefix);
            if prefix_similarity > 0.7 {
                score += 0.2 * prefix_similarity;
            }
        }

        if score >= min_threshold && score > best_score {
            best_score = score;
            best_match = Some(candidate.to_string());
        }
    }

    best_match
}
