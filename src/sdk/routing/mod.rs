pub mod coordinator;
pub mod decode;
pub mod error;
pub mod provider;
pub mod reply;
pub mod request;
pub mod route;
pub mod service;
pub mod worker;

pub use coordinator::{ExecutionMode, RouteCoordinator, RouteEvent, RouteEventKind};
pub use decode::decode;
pub use error::{DecodeError, ErrorCode, ReplyError, RequestError, RouteError};
pub use provider::{EngineParameters, EngineResult, EngineStatus, HttpEngine, ResultWriter};
pub use reply::{ReplyState, RouteReply};
pub use request::{RouteRequest, Waypoint};
pub use route::DecodedRoute;
pub use service::{EngineLoader, Interrupt, RoutingEngine};
pub use worker::{Worker, WorkerState};
