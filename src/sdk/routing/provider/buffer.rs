//! Binary result schema shared with the routing engine.
//!
//! All integers and floats are little-endian.
//!
//! ```text
//! result   := IDENTIFIER error_flag:u8 fields:u8 [routes] [error]
//! routes   := count:u32 route*                          (fields & FIELD_ROUTES)
//! route    := distance:f64 duration:f64 has_coords:u8 [n:u32 (lon:f64 lat:f64)*n]
//! error    := parts:u8 [code:string] [message:string]   (fields & FIELD_ERROR)
//! string   := len:u32 utf8-bytes
//! ```
//!
//! The decoder lives in [`crate::sdk::routing::decode`]; [`ResultWriter`] is
//! what engines (and tests) use to produce buffers.

use super::types::Coordinate;

pub const IDENTIFIER: [u8; 4] = *b"RRB1";

pub const FIELD_ROUTES: u8 = 0b01;
pub const FIELD_ERROR: u8 = 0b10;

pub const ERROR_CODE: u8 = 0b01;
pub const ERROR_MESSAGE: u8 = 0b10;

/// Encoded size of one coordinate pair.
pub const COORDINATE_SIZE: usize = 16;
/// Smallest possible encoded route: summary plus coordinates flag.
pub const MIN_ROUTE_SIZE: usize = 17;

#[derive(Debug, Clone, Default)]
struct RouteEntry {
    distance: f64,
    duration: f64,
    coordinates: Option<Vec<Coordinate>>,
}

#[derive(Debug, Clone, Default)]
pub struct ResultWriter {
    error_flag: bool,
    routes: Option<Vec<RouteEntry>>,
    error: Option<(Option<String>, Option<String>)>,
}

impl ResultWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, coordinates: &[Coordinate], distance: f64, duration: f64) -> Self {
        self.routes.get_or_insert_with(Vec::new).push(RouteEntry {
            distance,
            duration,
            coordinates: Some(coordinates.to_vec()),
        });
        self
    }

    /// Appends a route whose coordinate list is absent.
    pub fn route_without_coordinates(mut self, distance: f64, duration: f64) -> Self {
        self.routes.get_or_insert_with(Vec::new).push(RouteEntry {
            distance,
            duration,
            coordinates: None,
        });
        self
    }

    /// Marks the route list present even if no route is added.
    pub fn empty_routes(mut self) -> Self {
        self.routes.get_or_insert_with(Vec::new);
        self
    }

    /// Sets the error flag and a complete `(code, message)` error object.
    pub fn error(self, code: &str, message: &str) -> Self {
        self.error_parts(Some(code), Some(message))
    }

    /// Sets the error flag with an error object that may lack either part.
    pub fn error_parts(mut self, code: Option<&str>, message: Option<&str>) -> Self {
        self.error_flag = true;
        self.error = Some((code.map(str::to_owned), message.map(str::to_owned)));
        self
    }

    /// Sets the error flag without writing an error object.
    pub fn error_flag(mut self) -> Self {
        self.error_flag = true;
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&IDENTIFIER);
        out.push(u8::from(self.error_flag));

        let mut fields = 0;
        if self.routes.is_some() {
            fields |= FIELD_ROUTES;
        }
        if self.error.is_some() {
            fields |= FIELD_ERROR;
        }
        out.push(fields);

        if let Some(routes) = &self.routes {
            put_len(&mut out, routes.len());
            for route in routes {
                out.extend_from_slice(&route.distance.to_le_bytes());
                out.extend_from_slice(&route.duration.to_le_bytes());
                match &route.coordinates {
                    Some(coordinates) => {
                        out.push(1);
                        put_len(&mut out, coordinates.len());
                        for c in coordinates {
                            out.extend_from_slice(&c.longitude.to_le_bytes());
                            out.extend_from_slice(&c.latitude.to_le_bytes());
                        }
                    }
                    None => out.push(0),
                }
            }
        }

        if let Some((code, message)) = &self.error {
            let mut parts = 0;
            if code.is_some() {
                parts |= ERROR_CODE;
            }
            if message.is_some() {
                parts |= ERROR_MESSAGE;
            }
            out.push(parts);
            for text in [code, message].into_iter().flatten() {
                put_len(&mut out, text.len());
                out.extend_from_slice(text.as_bytes());
            }
        }

        out
    }
}

fn put_len(out: &mut Vec<u8>, len: usize) {
    // Saturates at u32::MAX; such a buffer decodes as truncated.
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_writer_is_header_only() {
        let bytes = ResultWriter::new().finish();
        assert_eq!(bytes, [b'R', b'R', b'B', b'1', 0, 0]);
    }

    #[test]
    fn route_layout_matches_schema() {
        let coords = [Coordinate {
            longitude: 13.4,
            latitude: 52.5,
        }];
        let bytes = ResultWriter::new().route(&coords, 10.0, 2.0).finish();
        // header(6) + count(4) + summary(16) + flag(1) + n(4) + one pair(16)
        assert_eq!(bytes.len(), 6 + 4 + MIN_ROUTE_SIZE + 4 + COORDINATE_SIZE);
        assert_eq!(bytes[5], FIELD_ROUTES);
        assert_eq!(&bytes[6..10], &1u32.to_le_bytes());
    }

    #[test]
    fn error_object_records_present_parts() {
        let bytes = ResultWriter::new().error_parts(Some("X"), None).finish();
        assert_eq!(bytes[4], 1);
        assert_eq!(bytes[5], FIELD_ERROR);
        assert_eq!(bytes[6], ERROR_CODE);
        assert_eq!(&bytes[7..11], &1u32.to_le_bytes());
        assert_eq!(bytes[11], b'X');
    }
}
