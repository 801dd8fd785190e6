use super::request::Waypoint;
use serde::Serialize;

/// One computed route, in the order the engine ranked it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedRoute {
    pub path: Vec<Waypoint>,
    /// Meters.
    pub distance: f64,
    /// Seconds.
    pub duration: f64,
}

impl DecodedRoute {
    pub fn distance_km(&self) -> f64 {
        self.distance / 1000.0
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration / 3600.0
    }
}
