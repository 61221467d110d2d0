//! Geographic coordinate shared by the graph, the spatial index and the CLI

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// WGS84 coordinate stored in single precision (~1 cm at the equator)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f32,
    pub lon: f32,
}

impl Coordinate {
    pub fn new(lat: f32, lon: f32) -> Self {
        Self { lat, lon }
    }

    /// Build from double precision input, as delivered by OSM parsers
    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self {
            lat: lat as f32,
            lon: lon as f32,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// `[lon, lat]` in double precision, the axis order used by the R-tree
    pub fn to_xy(self) -> [f64; 2] {
        [self.lon as f64, self.lat as f64]
    }

    pub fn from_xy(xy: [f64; 2]) -> Self {
        Self::from_degrees(xy[1], xy[0])
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

/// Parses `lat,lon`
impl FromStr for Coordinate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(Error::InvalidInput(format!(
                "coordinate must be in format 'lat,lon', got '{s}'"
            )));
        }
        let lat = parts[0]
            .trim()
            .parse::<f64>()
            .map_err(|e| Error::InvalidInput(format!("invalid latitude '{}': {e}", parts[0])))?;
        let lon = parts[1]
            .trim()
            .parse::<f64>()
            .map_err(|e| Error::InvalidInput(format!("invalid longitude '{}': {e}", parts[1])))?;

        let coordinate = Coordinate::from_degrees(lat, lon);
        if !coordinate.is_valid() {
            return Err(Error::InvalidInput(format!(
                "coordinate out of range: {lat},{lon}"
            )));
        }
        Ok(coordinate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        let c: Coordinate = "43.7384, 7.4246".parse().unwrap();
        assert!((c.lat - 43.7384).abs() < 1e-5);
        assert!((c.lon - 7.4246).abs() < 1e-5);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("43.7".parse::<Coordinate>().is_err());
        assert!("abc,7.4".parse::<Coordinate>().is_err());
        assert!("91.0,7.4".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_xy_axis_order() {
        let c = Coordinate::new(50.0, 4.0);
        assert_eq!(c.to_xy(), [4.0, 50.0]);
        assert_eq!(Coordinate::from_xy([4.0, 50.0]), c);
    }
}
