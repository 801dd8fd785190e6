use super::buffer::IDENTIFIER;
use super::types::{EngineParameters, EngineResult};
use crate::sdk::config::ConfigError;
use crate::sdk::routing::service::{Interrupt, RoutingEngine};
use crate::sdk::util::rate_limit::{self, Limiter};
use reqwest::blocking::Client;
use std::env;
use std::time::Duration;

/// Error code reported when the daemon could not be reached.
pub const TRANSPORT_ERROR: &str = "TransportError";
/// Error code reported for a failed response without a result body.
pub const HTTP_ERROR: &str = "HttpError";
/// Error code reported when a cancelled request never left the process.
pub const INTERRUPTED: &str = "Interrupted";

const DEFAULT_REQUESTS_PER_MINUTE: u32 = 600;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpEngineConfig {
    pub base_url: String,
    pub requests_per_minute: u32,
    pub timeout: Duration,
}

impl HttpEngineConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Reads `ROUTE_ENGINE_URL` (required) and `ROUTE_ENGINE_RPM`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            env::var("ROUTE_ENGINE_URL").map_err(|_| ConfigError::MissingParameter("ROUTE_ENGINE_URL"))?;
        let mut config = Self::new(base_url);
        if let Ok(value) = env::var("ROUTE_ENGINE_RPM") {
            config.requests_per_minute =
                value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "ROUTE_ENGINE_RPM".to_string(),
                    value,
                })?;
        }
        Ok(config)
    }
}

/// A routing engine served by a daemon over HTTP.
///
/// Parameters are POSTed as JSON to `{base_url}/route`; the response body is
/// a result buffer. Transport failures are reported as `Error` results with a
/// structured error, so callers see them like any other engine failure.
pub struct HttpEngine {
    client: Client,
    base_url: String,
    limiter: Limiter,
}

impl HttpEngine {
    pub fn new(config: &HttpEngineConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::EngineInit(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter: rate_limit::engine_limiter(config.requests_per_minute),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/route", self.base_url)
    }
}

impl RoutingEngine for HttpEngine {
    fn route(&self, parameters: &EngineParameters, interrupt: &Interrupt) -> EngineResult {
        rate_limit::wait(&self.limiter);
        if interrupt.is_raised() {
            return EngineResult::failure(INTERRUPTED, "request cancelled before dispatch");
        }

        let url = self.endpoint();
        log::debug!(
            "[ENGINE] Calling {} with {} coordinates",
            url,
            parameters.coordinates.len()
        );

        let response = match self.client.post(&url).json(parameters).send() {
            Ok(resp) => resp,
            Err(e) => {
                log::error!(
                    "Failed to send POST request. URL: {}\nBody: {}\nError: {}",
                    url,
                    serde_json::to_string_pretty(parameters).unwrap_or_default(),
                    e
                );
                return EngineResult::failure(TRANSPORT_ERROR, &e.to_string());
            }
        };

        let status = response.status();
        let body = match response.bytes() {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                log::error!("Failed to read engine response. URL: {}\nError: {}", url, e);
                return EngineResult::failure(TRANSPORT_ERROR, &e.to_string());
            }
        };

        if status.is_success() {
            return EngineResult::ok(body);
        }
        // A result buffer in a failed response carries the engine's own error.
        if body.starts_with(&IDENTIFIER) {
            return EngineResult::error(body);
        }
        log::error!(
            "Engine returned non-success status: {}. Unparseable Body: {}",
            status,
            String::from_utf8_lossy(&body)
        );
        EngineResult::failure(HTTP_ERROR, &format!("status {}", status))
    }
}
