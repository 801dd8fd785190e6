pub mod sdk;

pub use sdk::config::{Algorithm, ConfigError, EngineConfig};
pub use sdk::features::Capabilities;
pub use sdk::routing::{
    DecodedRoute, EngineLoader, EngineParameters, EngineResult, EngineStatus, ExecutionMode,
    ReplyState, RouteCoordinator, RouteError, RouteEvent, RouteEventKind, RouteReply,
    RouteRequest, RoutingEngine, Waypoint,
};
