//! Vehicle profiles and weight functions
//!
//! A profile turns a way's tags into access, direction and speed. A weight
//! function turns that plus the segment length into an arc weight.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use wayroute_common::{suggest_name, Error, Result};

use crate::tags::TagSet;

/// Ferry crossings use a flat speed regardless of vehicle
const FERRY_SPEED_KMH: f64 = 20.0;

/// Directions in which a way may be traversed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oneway {
    Bidirectional,
    /// Only in node order
    Forward,
    /// Only against node order
    Backward,
}

impl Oneway {
    pub fn allows_forward(self) -> bool {
        matches!(self, Oneway::Bidirectional | Oneway::Forward)
    }

    pub fn allows_backward(self) -> bool {
        matches!(self, Oneway::Bidirectional | Oneway::Backward)
    }
}

/// Tag semantics for one mode of transport
pub trait VehicleProfile: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the way is usable at all
    fn can_traverse(&self, tags: &TagSet) -> bool;

    fn oneway(&self, tags: &TagSet) -> Oneway;

    /// Travel speed on a traversable way
    fn speed_kmh(&self, tags: &TagSet) -> f64;
}

/// Explicit access denial (`destination` is allowed)
fn is_denied(value: Option<&str>) -> bool {
    matches!(value, Some("no") | Some("private"))
}

fn is_ferry(tags: &TagSet) -> bool {
    tags.get("route") == Some("ferry")
}

/// `oneway=*` as written on the way
fn parse_oneway(value: Option<&str>) -> Option<Oneway> {
    match value? {
        "yes" | "1" | "true" => Some(Oneway::Forward),
        "-1" | "reverse" => Some(Oneway::Backward),
        "no" | "0" | "false" => Some(Oneway::Bidirectional),
        _ => None,
    }
}

/// `maxspeed` in km/h; understands plain numbers and `mph` suffixes
fn parse_maxspeed(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    let (number, factor) = match value.strip_suffix("mph") {
        Some(rest) => (rest.trim(), 1.609_344),
        None => (value.strip_suffix("km/h").unwrap_or(value).trim(), 1.0),
    };
    let speed = number.parse::<f64>().ok()? * factor;
    (speed.is_finite() && speed > 0.0).then_some(speed)
}

pub struct CarProfile;

impl CarProfile {
    fn base_speed(highway: &str) -> Option<f64> {
        let speed = match highway {
            "motorway" => 110.0,
            "motorway_link" => 60.0,
            "trunk" => 90.0,
            "trunk_link" => 50.0,
            "primary" => 70.0,
            "primary_link" => 40.0,
            "secondary" => 60.0,
            "secondary_link" => 40.0,
            "tertiary" => 50.0,
            "tertiary_link" => 30.0,
            "unclassified" => 50.0,
            "residential" => 30.0,
            "service" => 20.0,
            "living_street" => 10.0,
            _ => return None,
        };
        Some(speed)
    }
}

impl VehicleProfile for CarProfile {
    fn name(&self) -> &'static str {
        "car"
    }

    fn can_traverse(&self, tags: &TagSet) -> bool {
        let routable = match tags.get("highway") {
            Some(highway) => Self::base_speed(highway).is_some(),
            None => is_ferry(tags),
        };
        routable
            && !is_denied(tags.get("motor_vehicle"))
            && !is_denied(tags.get("vehicle"))
            && !is_denied(tags.get("access"))
    }

    fn oneway(&self, tags: &TagSet) -> Oneway {
        if let Some(oneway) = parse_oneway(tags.get("oneway")) {
            return oneway;
        }
        match tags.get("highway") {
            Some("motorway") | Some("motorway_link") => Oneway::Forward,
            _ if tags.get("junction") == Some("roundabout") => Oneway::Forward,
            _ => Oneway::Bidirectional,
        }
    }

    fn speed_kmh(&self, tags: &TagSet) -> f64 {
        if is_ferry(tags) {
            return FERRY_SPEED_KMH;
        }
        let base = tags
            .get("highway")
            .and_then(Self::base_speed)
            .unwrap_or(FERRY_SPEED_KMH);
        parse_maxspeed(tags.get("maxspeed")).map_or(base, |max| max.min(130.0))
    }
}

pub struct BicycleProfile;

impl BicycleProfile {
    const CRUISING_SPEED: f64 = 18.0;

    fn base_speed(highway: &str) -> Option<f64> {
        let speed = match highway {
            "cycleway" => 20.0,
            "path" | "footway" => 15.0,
            "residential" | "unclassified" | "tertiary" | "secondary" | "primary" => 18.0,
            "tertiary_link" | "secondary_link" | "primary_link" => 18.0,
            "service" | "living_street" => 15.0,
            "track" => 12.0,
            _ => return None,
        };
        Some(speed)
    }
}

impl VehicleProfile for BicycleProfile {
    fn name(&self) -> &'static str {
        "bicycle"
    }

    fn can_traverse(&self, tags: &TagSet) -> bool {
        let routable = match tags.get("highway") {
            Some(highway) => Self::base_speed(highway).is_some(),
            None => is_ferry(tags),
        };
        let bicycle = tags.get("bicycle");
        if matches!(bicycle, Some("yes") | Some("designated")) {
            return routable || tags.has("highway");
        }
        routable
            && !matches!(bicycle, Some("no") | Some("dismount"))
            && !is_denied(tags.get("vehicle"))
            && !is_denied(tags.get("access"))
    }

    fn oneway(&self, tags: &TagSet) -> Oneway {
        // car one-ways bind cyclists unless oneway:bicycle says otherwise
        if let Some(oneway) = parse_oneway(tags.get("oneway:bicycle")) {
            return oneway;
        }
        parse_oneway(tags.get("oneway")).unwrap_or(Oneway::Bidirectional)
    }

    fn speed_kmh(&self, tags: &TagSet) -> f64 {
        if is_ferry(tags) {
            return FERRY_SPEED_KMH;
        }
        let base = tags
            .get("highway")
            .and_then(Self::base_speed)
            .unwrap_or(Self::CRUISING_SPEED);
        parse_maxspeed(tags.get("maxspeed")).map_or(base, |max| base.min(max))
    }
}

pub struct PedestrianProfile;

impl PedestrianProfile {
    fn base_speed(highway: &str) -> Option<f64> {
        let speed = match highway {
            "footway" | "pedestrian" | "steps" => 5.0,
            "path" | "cycleway" => 4.5,
            "residential" | "living_street" | "unclassified" => 5.0,
            "tertiary" | "secondary" | "primary" => 4.5,
            "service" => 4.5,
            "track" => 4.0,
            _ => return None,
        };
        Some(speed)
    }
}

impl VehicleProfile for PedestrianProfile {
    fn name(&self) -> &'static str {
        "pedestrian"
    }

    fn can_traverse(&self, tags: &TagSet) -> bool {
        let routable = match tags.get("highway") {
            Some(highway) => Self::base_speed(highway).is_some(),
            None => is_ferry(tags),
        };
        routable && !is_denied(tags.get("foot")) && !is_denied(tags.get("access"))
    }

    fn oneway(&self, tags: &TagSet) -> Oneway {
        // pedestrians ignore oneway for vehicles
        parse_oneway(tags.get("oneway:foot")).unwrap_or(Oneway::Bidirectional)
    }

    fn speed_kmh(&self, tags: &TagSet) -> f64 {
        if is_ferry(tags) {
            return FERRY_SPEED_KMH;
        }
        tags.get("highway")
            .and_then(Self::base_speed)
            .unwrap_or(5.0)
    }
}

/// Names accepted by [`profile_by_name`]
pub const PROFILE_NAMES: &[&str] = &["car", "bicycle", "pedestrian"];

pub fn profile_by_name(name: &str) -> Result<Box<dyn VehicleProfile>> {
    match name.to_ascii_lowercase().as_str() {
        "car" => Ok(Box::new(CarProfile)),
        "bicycle" | "bike" => Ok(Box::new(BicycleProfile)),
        "pedestrian" | "foot" => Ok(Box::new(PedestrianProfile)),
        _ => Err(Error::UnknownProfile {
            name: name.to_string(),
            suggestion: suggest_name(name, PROFILE_NAMES),
        }),
    }
}

/// Arc weight from a profile, a way's tags and a segment length
pub trait WeightFunction: Send + Sync {
    /// `None` when the profile cannot use the way
    fn weight(&self, profile: &dyn VehicleProfile, tags: &TagSet, distance_m: f64) -> Option<f64>;
}

/// Travel time in seconds
pub struct Fastest;

impl WeightFunction for Fastest {
    fn weight(&self, profile: &dyn VehicleProfile, tags: &TagSet, distance_m: f64) -> Option<f64> {
        if !profile.can_traverse(tags) {
            return None;
        }
        let speed = profile.speed_kmh(tags);
        (speed > 0.0).then(|| distance_m / (speed / 3.6))
    }
}

/// Distance in meters
pub struct Shortest;

impl WeightFunction for Shortest {
    fn weight(&self, profile: &dyn VehicleProfile, tags: &TagSet, distance_m: f64) -> Option<f64> {
        profile.can_traverse(tags).then_some(distance_m)
    }
}

/// Which weight function produced a graph's weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Fastest,
    Shortest,
}

impl Metric {
    pub fn weight_function(self) -> &'static dyn WeightFunction {
        match self {
            Metric::Fastest => &Fastest,
            Metric::Shortest => &Shortest,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Fastest => write!(f, "fastest"),
            Metric::Shortest => write!(f, "shortest"),
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fastest" | "time" => Ok(Metric::Fastest),
            "shortest" | "distance" => Ok(Metric::Shortest),
            _ => Err(Error::InvalidInput(format!(
                "unknown metric '{s}' (expected 'fastest' or 'shortest')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn way(pairs: &[(&str, &str)]) -> TagSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_car_access() {
        let car = CarProfile;
        assert!(car.can_traverse(&way(&[("highway", "primary")])));
        assert!(!car.can_traverse(&way(&[("highway", "footway")])));
        assert!(!car.can_traverse(&way(&[("highway", "primary"), ("access", "private")])));
        assert!(car.can_traverse(&way(&[("highway", "service"), ("access", "destination")])));
        assert!(!car.can_traverse(&way(&[("name", "Main Street")])));
        assert!(car.can_traverse(&way(&[("route", "ferry")])));
    }

    #[test]
    fn test_car_oneway() {
        let car = CarProfile;
        assert_eq!(car.oneway(&way(&[("highway", "primary")])), Oneway::Bidirectional);
        assert_eq!(
            car.oneway(&way(&[("highway", "primary"), ("oneway", "yes")])),
            Oneway::Forward
        );
        assert_eq!(
            car.oneway(&way(&[("highway", "primary"), ("oneway", "-1")])),
            Oneway::Backward
        );
        assert_eq!(car.oneway(&way(&[("highway", "motorway")])), Oneway::Forward);
        assert_eq!(
            car.oneway(&way(&[("highway", "motorway"), ("oneway", "no")])),
            Oneway::Bidirectional
        );
    }

    #[test]
    fn test_speeds() {
        assert_eq!(CarProfile.speed_kmh(&way(&[("highway", "residential")])), 30.0);
        assert_eq!(
            CarProfile.speed_kmh(&way(&[("highway", "primary"), ("maxspeed", "50")])),
            50.0
        );
        let mph = CarProfile.speed_kmh(&way(&[("highway", "primary"), ("maxspeed", "30 mph")]));
        assert!((mph - 48.28).abs() < 0.01);
        assert_eq!(
            CarProfile.speed_kmh(&way(&[("highway", "primary"), ("maxspeed", "signals")])),
            70.0
        );
        assert_eq!(CarProfile.speed_kmh(&way(&[("route", "ferry")])), FERRY_SPEED_KMH);
    }

    #[test]
    fn test_bicycle_and_pedestrian() {
        let oneway_street = way(&[("highway", "residential"), ("oneway", "yes")]);
        assert_eq!(BicycleProfile.oneway(&oneway_street), Oneway::Forward);
        assert_eq!(PedestrianProfile.oneway(&oneway_street), Oneway::Bidirectional);

        let contraflow = way(&[
            ("highway", "residential"),
            ("oneway", "yes"),
            ("oneway:bicycle", "no"),
        ]);
        assert_eq!(BicycleProfile.oneway(&contraflow), Oneway::Bidirectional);

        assert!(!BicycleProfile.can_traverse(&way(&[("highway", "motorway")])));
        assert!(!PedestrianProfile.can_traverse(&way(&[("highway", "trunk")])));
        assert!(PedestrianProfile.can_traverse(&way(&[("highway", "steps")])));
    }

    #[test]
    fn test_profile_by_name() {
        assert_eq!(profile_by_name("car").unwrap().name(), "car");
        assert_eq!(profile_by_name("Bike").unwrap().name(), "bicycle");
        match profile_by_name("bicyle") {
            Err(Error::UnknownProfile { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("bicycle"))
            }
            _ => panic!("expected UnknownProfile"),
        }
    }

    #[test]
    fn test_weight_functions() {
        let residential = way(&[("highway", "residential")]);
        // 30 km/h over 250 m is 30 s
        let seconds = Fastest.weight(&CarProfile, &residential, 250.0).unwrap();
        assert!((seconds - 30.0).abs() < 1e-9);
        assert_eq!(Shortest.weight(&CarProfile, &residential, 250.0), Some(250.0));
        assert_eq!(Fastest.weight(&CarProfile, &way(&[("highway", "cycleway")]), 10.0), None);
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!("fastest".parse::<Metric>().unwrap(), Metric::Fastest);
        assert_eq!("Distance".parse::<Metric>().unwrap(), Metric::Shortest);
        assert!("scenic".parse::<Metric>().is_err());
    }
}
