use serde::Serialize;
use thiserror::Error;

/// Ways an engine result buffer can violate the result schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("result buffer truncated: {field} needs {needed} bytes, {remaining} left")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("unknown result identifier {0:?}")]
    BadIdentifier([u8; 4]),

    #[error("unknown field bits {bits:#04x} in {field}")]
    UnknownFields { field: &'static str, bits: u8 },

    #[error("{0} trailing bytes after result")]
    TrailingBytes(usize),

    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("successful result carries no route list")]
    MissingRoutes,

    #[error("successful result carries an empty route list")]
    EmptyRoutes,

    #[error("route {route} has no coordinates")]
    MissingCoordinates { route: usize },

    #[error("route {route} has an invalid summary (distance {distance}, duration {duration})")]
    InvalidSummary {
        route: usize,
        distance: f64,
        duration: f64,
    },

    #[error("successful result carries an engine error")]
    UnexpectedError,

    #[error("engine error object has no {0}")]
    MalformedError(&'static str),
}

/// Per-request failure, delivered exactly once through a reply.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    // Text produced by the engine itself: "code: .., message: .." or "UnknownError".
    #[error("{0}")]
    Computation(String),

    #[error("malformed engine result: {0}")]
    Decode(#[from] DecodeError),

    #[error("worker failed: {0}")]
    Worker(String),

    #[error("aborted")]
    Aborted,
}

impl RouteError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RouteError::Aborted => ErrorCode::Aborted,
            RouteError::Computation(_) | RouteError::Decode(_) | RouteError::Worker(_) => {
                ErrorCode::Computation
            }
        }
    }
}

/// Error category exposed on a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    Computation,
    Aborted,
}

/// Error code and message held by a terminal reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyError {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&RouteError> for ReplyError {
    fn from(err: &RouteError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("a route request needs at least 2 waypoints, got {0}")]
    TooFewWaypoints(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_surface_as_computation() {
        let err = RouteError::from(DecodeError::EmptyRoutes);
        let reply_error = ReplyError::from(&err);
        assert_eq!(reply_error.code, ErrorCode::Computation);
        assert_eq!(
            reply_error.message,
            "malformed engine result: successful result carries an empty route list"
        );
    }

    #[test]
    fn computation_text_is_passed_through() {
        let err = RouteError::Computation("code: NoRoute, message: no route found".into());
        assert_eq!(err.to_string(), "code: NoRoute, message: no route found");
    }
}
