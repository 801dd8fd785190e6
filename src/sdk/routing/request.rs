use super::error::RequestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A geographic coordinate in degrees. No range validation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl Waypoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Parses `"lat,lon"`.
impl FromStr for Waypoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format!("expected \"lat,lon\", got \"{}\"", s))?;
        let latitude = lat
            .trim()
            .parse()
            .map_err(|e| format!("invalid latitude \"{}\": {}", lat, e))?;
        let longitude = lon
            .trim()
            .parse()
            .map_err(|e| format!("invalid longitude \"{}\": {}", lon, e))?;
        Ok(Self::new(latitude, longitude))
    }
}

/// Ordered waypoints a route must visit. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    waypoints: Vec<Waypoint>,
}

impl RouteRequest {
    pub fn new(waypoints: Vec<Waypoint>) -> Result<Self, RequestError> {
        if waypoints.len() < 2 {
            return Err(RequestError::TooFewWaypoints(waypoints.len()));
        }
        Ok(Self { waypoints })
    }

    pub fn between(origin: Waypoint, destination: Waypoint) -> Self {
        Self {
            waypoints: vec![origin, destination],
        }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }
}
