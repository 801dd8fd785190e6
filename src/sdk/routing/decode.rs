//! Turns an engine status and result buffer into routes or a reply error.
//!
//! Every schema violation becomes a [`DecodeError`]; nothing in this module
//! panics on malformed input, and no allocation is sized from an unchecked
//! length field.
//!
//! The framing is checked before the status is looked at. An `Error` status
//! whose buffer is empty or lacks the `RRB1` identifier is therefore a
//! [`DecodeError`], not `UnknownError`; only a well-formed buffer without an
//! error object maps to `UnknownError`.

use super::error::{DecodeError, RouteError};
use super::provider::buffer::{
    COORDINATE_SIZE, ERROR_CODE, ERROR_MESSAGE, FIELD_ERROR, FIELD_ROUTES, IDENTIFIER,
    MIN_ROUTE_SIZE,
};
use super::provider::types::EngineStatus;
use super::request::Waypoint;
use super::route::DecodedRoute;

/// Fallback text when a failed result carries no structured error.
pub const UNKNOWN_ERROR: &str = "UnknownError";

pub fn decode(status: EngineStatus, buffer: &[u8]) -> Result<Vec<DecodedRoute>, RouteError> {
    let raw = parse(buffer)?;
    match status {
        EngineStatus::Ok => Ok(routes_from(raw)?),
        EngineStatus::Error => Err(error_from(raw)?),
    }
}

struct RawRoute {
    distance: f64,
    duration: f64,
    coordinates: Option<Vec<Waypoint>>,
}

struct RawError {
    code: Option<String>,
    message: Option<String>,
}

struct RawResult {
    error_flag: bool,
    routes: Option<Vec<RawRoute>>,
    error: Option<RawError>,
}

fn routes_from(raw: RawResult) -> Result<Vec<DecodedRoute>, DecodeError> {
    if raw.error_flag || raw.error.is_some() {
        return Err(DecodeError::UnexpectedError);
    }
    let routes = raw.routes.ok_or(DecodeError::MissingRoutes)?;
    if routes.is_empty() {
        return Err(DecodeError::EmptyRoutes);
    }

    routes
        .into_iter()
        .enumerate()
        .map(|(index, route)| {
            let valid = |v: f64| v.is_finite() && v >= 0.0;
            if !valid(route.distance) || !valid(route.duration) {
                return Err(DecodeError::InvalidSummary {
                    route: index,
                    distance: route.distance,
                    duration: route.duration,
                });
            }
            let path = match route.coordinates {
                Some(path) if !path.is_empty() => path,
                _ => return Err(DecodeError::MissingCoordinates { route: index }),
            };
            Ok(DecodedRoute {
                path,
                distance: route.distance,
                duration: route.duration,
            })
        })
        .collect()
}

fn error_from(raw: RawResult) -> Result<RouteError, DecodeError> {
    let Some(error) = raw.error else {
        return Ok(RouteError::Computation(UNKNOWN_ERROR.to_string()));
    };
    let code = error.code.ok_or(DecodeError::MalformedError("code"))?;
    let message = error.message.ok_or(DecodeError::MalformedError("message"))?;
    Ok(RouteError::Computation(format!(
        "code: {}, message: {}",
        code, message
    )))
}

fn parse(buffer: &[u8]) -> Result<RawResult, DecodeError> {
    let mut reader = Reader::new(buffer);

    let identifier = reader.array::<4>("identifier")?;
    if identifier != IDENTIFIER {
        return Err(DecodeError::BadIdentifier(identifier));
    }
    let error_flag = reader.u8("error flag")? != 0;
    let fields = reader.u8("field mask")?;
    if fields & !(FIELD_ROUTES | FIELD_ERROR) != 0 {
        return Err(DecodeError::UnknownFields {
            field: "field mask",
            bits: fields,
        });
    }

    let routes = if fields & FIELD_ROUTES != 0 {
        Some(parse_routes(&mut reader)?)
    } else {
        None
    };
    let error = if fields & FIELD_ERROR != 0 {
        Some(parse_error(&mut reader)?)
    } else {
        None
    };

    if reader.remaining() > 0 {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }

    Ok(RawResult {
        error_flag,
        routes,
        error,
    })
}

fn parse_routes(reader: &mut Reader<'_>) -> Result<Vec<RawRoute>, DecodeError> {
    let count = reader.count("route list", MIN_ROUTE_SIZE)?;
    let mut routes = Vec::with_capacity(count);
    for _ in 0..count {
        let distance = reader.f64("route distance")?;
        let duration = reader.f64("route duration")?;
        let coordinates = if reader.u8("coordinates flag")? != 0 {
            let n = reader.count("coordinate list", COORDINATE_SIZE)?;
            let mut path = Vec::with_capacity(n);
            for _ in 0..n {
                let longitude = reader.f64("longitude")?;
                let latitude = reader.f64("latitude")?;
                path.push(Waypoint::new(latitude, longitude));
            }
            Some(path)
        } else {
            None
        };
        routes.push(RawRoute {
            distance,
            duration,
            coordinates,
        });
    }
    Ok(routes)
}

fn parse_error(reader: &mut Reader<'_>) -> Result<RawError, DecodeError> {
    let parts = reader.u8("error parts")?;
    if parts & !(ERROR_CODE | ERROR_MESSAGE) != 0 {
        return Err(DecodeError::UnknownFields {
            field: "error parts",
            bits: parts,
        });
    }
    let code = if parts & ERROR_CODE != 0 {
        Some(reader.string("error code")?)
    } else {
        None
    };
    let message = if parts & ERROR_MESSAGE != 0 {
        Some(reader.string("error message")?)
    } else {
        None
    };
    Ok(RawError { code, message })
}

/// Bounds-checked little-endian cursor.
struct Reader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    fn take(&mut self, needed: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(DecodeError::Truncated {
                field,
                needed,
                remaining,
            });
        }
        let bytes = &self.buffer[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.array::<1>(field)?[0])
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array(field)?))
    }

    fn f64(&mut self, field: &'static str) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.array(field)?))
    }

    /// Reads an element count and checks the buffer can hold that many
    /// elements of at least `min_size` bytes each.
    fn count(&mut self, field: &'static str, min_size: usize) -> Result<usize, DecodeError> {
        let count = self.u32(field)? as usize;
        let needed = count.saturating_mul(min_size);
        let remaining = self.remaining();
        if needed > remaining {
            return Err(DecodeError::Truncated {
                field,
                needed,
                remaining,
            });
        }
        Ok(count)
    }

    fn string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let len = self.u32(field)? as usize;
        let bytes = self.take(len, field)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }
}
