//! Geodesic helpers

use geo::HaversineDistance;
use geo::Point;
use wayroute_common::Coordinate;

/// Mean Earth radius used by the haversine distance
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Meters per degree of latitude (and of longitude at the equator)
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Slack on index lookups so the exact distance check decides
const SEARCH_MARGIN: f64 = 1.05;

#[allow(deprecated)]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    p1.haversine_distance(&p2)
}

pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    haversine_distance(a.lat as f64, a.lon as f64, b.lat as f64, b.lon as f64)
}

/// Radius in degrees that covers `radius_m` in every direction around `lat`
pub fn degrees_covering(radius_m: f64, lat: f64) -> f64 {
    let lon_scale = lat.to_radians().cos().abs().max(0.01);
    radius_m * SEARCH_MARGIN / (METERS_PER_DEGREE * lon_scale)
}

/// Project `point` onto segment `a → b` in a local equirectangular frame
///
/// Returns the clamped fraction along the segment and the projected location.
pub fn project_onto_segment(point: Coordinate, a: Coordinate, b: Coordinate) -> (f64, Coordinate) {
    let lon_scale = (point.lat as f64).to_radians().cos();
    let ax = a.lon as f64 * lon_scale;
    let ay = a.lat as f64;
    let dx = b.lon as f64 * lon_scale - ax;
    let dy = b.lat as f64 - ay;
    let px = point.lon as f64 * lon_scale - ax;
    let py = point.lat as f64 - ay;

    let len_2 = dx * dx + dy * dy;
    let t = if len_2 > 0.0 {
        ((px * dx + py * dy) / len_2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let location = Coordinate::from_degrees(
        a.lat as f64 + t * (b.lat as f64 - a.lat as f64),
        a.lon as f64 + t * (b.lon as f64 - a.lon as f64),
    );
    (t, location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn test_projection_midpoint_and_clamp() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 0.002);

        let (t, at) = project_onto_segment(Coordinate::new(0.0001, 0.001), a, b);
        assert!((t - 0.5).abs() < 1e-4);
        assert!(at.lat.abs() < 1e-7);

        let (t, at) = project_onto_segment(Coordinate::new(0.0, -0.01), a, b);
        assert_eq!(t, 0.0);
        assert_eq!(at, a);
    }

    #[test]
    fn test_degrees_covering_grows_with_latitude() {
        assert!(degrees_covering(50.0, 60.0) > degrees_covering(50.0, 0.0));
    }

    #[test]
    fn test_degrees_covering_agrees_with_haversine() {
        for lat in [0.0, 45.0, 70.0] {
            let deg = degrees_covering(50.0, lat);
            assert!(haversine_distance(lat, 0.0, lat + deg, 0.0) >= 50.0, "lat {lat}");
            assert!(haversine_distance(lat, 0.0, lat, deg) >= 50.0, "lat {lat}");
        }
    }
}
