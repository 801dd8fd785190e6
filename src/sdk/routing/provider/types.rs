use super::buffer::ResultWriter;
use crate::sdk::routing::request::RouteRequest;
use serde::Serialize;

/// Engine-side coordinate order: longitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverviewType {
    Simplified,
    Full,
    False,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometriesType {
    Polyline,
    Polyline6,
    GeoJson,
}

/// Parameters for one engine call, derived from a request and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineParameters {
    pub coordinates: Vec<Coordinate>,
    pub overview: OverviewType,
    pub geometries: GeometriesType,
}

impl EngineParameters {
    pub fn for_request(request: &RouteRequest) -> Self {
        Self {
            coordinates: request
                .waypoints()
                .iter()
                .map(|wp| Coordinate {
                    longitude: wp.longitude,
                    latitude: wp.latitude,
                })
                .collect(),
            overview: OverviewType::Full,
            geometries: GeometriesType::GeoJson,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Ok,
    Error,
}

/// Raw engine output: a status and a buffer in the result schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResult {
    pub status: EngineStatus,
    pub buffer: Vec<u8>,
}

impl EngineResult {
    pub fn ok(buffer: Vec<u8>) -> Self {
        Self {
            status: EngineStatus::Ok,
            buffer,
        }
    }

    pub fn error(buffer: Vec<u8>) -> Self {
        Self {
            status: EngineStatus::Error,
            buffer,
        }
    }

    /// An `Error` result carrying a structured `(code, message)` pair.
    pub fn failure(code: &str, message: &str) -> Self {
        Self::error(ResultWriter::new().error(code, message).finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::routing::request::Waypoint;

    #[test]
    fn parameters_swap_to_lon_lat_and_fix_format() {
        let request = RouteRequest::between(Waypoint::new(52.5, 13.4), Waypoint::new(52.6, 13.5));
        let params = EngineParameters::for_request(&request);
        assert_eq!(
            params.coordinates,
            vec![
                Coordinate { longitude: 13.4, latitude: 52.5 },
                Coordinate { longitude: 13.5, latitude: 52.6 },
            ]
        );
        assert_eq!(params.overview, OverviewType::Full);
        assert_eq!(params.geometries, GeometriesType::GeoJson);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["overview"], "full");
        assert_eq!(json["geometries"], "geojson");
    }
}
