use super::provider::types::{EngineParameters, EngineResult};
use crate::sdk::config::{ConfigError, EngineConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The external routing engine: one blocking operation, no interruption
/// point of its own.
///
/// The handle is shared read-only between concurrent computations.
pub trait RoutingEngine: Send + Sync + 'static {
    /// Computes routes for `parameters`.
    ///
    /// Engines that can stop early should poll `interrupt` and return an
    /// `Error` result once it is raised. Others may ignore it.
    fn route(&self, parameters: &EngineParameters, interrupt: &Interrupt) -> EngineResult;
}

/// Builds engine handles from a validated configuration.
pub trait EngineLoader: Send + Sync + 'static {
    type Engine: RoutingEngine;

    fn load(&self, config: &EngineConfig) -> Result<Self::Engine, ConfigError>;
}

impl<F, E> EngineLoader for F
where
    F: Fn(&EngineConfig) -> Result<E, ConfigError> + Send + Sync + 'static,
    E: RoutingEngine,
{
    type Engine = E;

    fn load(&self, config: &EngineConfig) -> Result<E, ConfigError> {
        self(config)
    }
}

/// Cooperative cancellation flag handed to every engine call.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
