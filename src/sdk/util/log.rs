use env_logger::{Builder, Env};

/// Filter applied when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

pub fn init_logging() {
    init_logging_with(DEFAULT_FILTER);
}

/// Installs the `env_logger` backend, falling back to `default_filter` when
/// `RUST_LOG` is unset. A second call is ignored, so tests may call it freely.
pub fn init_logging_with(default_filter: &str) {
    let _ = Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .format_module_path(false)
        .try_init();
}
