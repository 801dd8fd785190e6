pub mod config;
pub mod features;
pub mod routing;
pub mod util;
