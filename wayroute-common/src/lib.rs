//! Common types for the wayroute routing engine

pub mod coordinate;
pub mod error;

pub use coordinate::Coordinate;
pub use error::{suggest_name, Error, Result};
