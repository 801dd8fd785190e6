pub mod buffer;
pub mod remote;
pub mod types;

pub use buffer::ResultWriter;
pub use remote::{HttpEngine, HttpEngineConfig};
pub use types::{Coordinate, EngineParameters, EngineResult, EngineStatus};
