use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Parameter-bag keys understood by [`EngineConfig::from_params`].
pub const STORAGE_CONFIG_KEY: &str = "engineConfig.storage_config";
pub const USE_SHARED_MEMORY_KEY: &str = "engineConfig.use_shared_memory";
pub const USE_MMAP_KEY: &str = "engineConfig.use_mmap";
pub const ALGORITHM_KEY: &str = "engineConfig.algorithm";

const STORAGE_CONFIG_ENV: &str = "ROUTE_STORAGE_CONFIG";
const USE_SHARED_MEMORY_ENV: &str = "ROUTE_USE_SHARED_MEMORY";
const USE_MMAP_ENV: &str = "ROUTE_USE_MMAP";
const ALGORITHM_ENV: &str = "ROUTE_ALGORITHM";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} parameter missing")]
    MissingParameter(&'static str),

    #[error("{} file not found", .0.display())]
    StorageNotFound(PathBuf),

    #[error("invalid algorithm: {0}")]
    InvalidAlgorithm(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    // The engine refused to load the configured dataset.
    #[error("engine initialization failed: {0}")]
    EngineInit(String),
}

/// Routing-graph preprocessing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Algorithm {
    /// Contraction hierarchies: slow preprocessing, fastest queries.
    #[default]
    #[serde(rename = "CH")]
    Ch,
    /// Multi-level Dijkstra: supports fast weight customization.
    #[serde(rename = "MLD")]
    Mld,
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CH" => Ok(Algorithm::Ch),
            "MLD" => Ok(Algorithm::Mld),
            other => Err(ConfigError::InvalidAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Ch => f.write_str("CH"),
            Algorithm::Mld => f.write_str("MLD"),
        }
    }
}

/// Validated engine configuration.
///
/// Build it with [`EngineConfig::from_params`] or [`EngineConfig::from_env`];
/// both run [`EngineConfig::validate`] before handing the value out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    pub storage_config: PathBuf,
    #[serde(default)]
    pub use_shared_memory: bool,
    #[serde(default = "default_use_mmap")]
    pub use_mmap: bool,
    #[serde(default)]
    pub algorithm: Algorithm,
}

fn default_use_mmap() -> bool {
    true
}

impl EngineConfig {
    pub fn new(storage_config: impl Into<PathBuf>) -> Self {
        Self {
            storage_config: storage_config.into(),
            use_shared_memory: false,
            use_mmap: default_use_mmap(),
            algorithm: Algorithm::default(),
        }
    }

    /// Parses the host's string-keyed parameter bag.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(
            |key| params.get(key).cloned(),
            [
                STORAGE_CONFIG_KEY,
                USE_SHARED_MEMORY_KEY,
                USE_MMAP_KEY,
                ALGORITHM_KEY,
            ],
        )
    }

    /// Reads `ROUTE_STORAGE_CONFIG`, `ROUTE_USE_SHARED_MEMORY`,
    /// `ROUTE_USE_MMAP` and `ROUTE_ALGORITHM`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(
            |key| env::var(key).ok(),
            [
                STORAGE_CONFIG_ENV,
                USE_SHARED_MEMORY_ENV,
                USE_MMAP_ENV,
                ALGORITHM_ENV,
            ],
        )
    }

    fn from_lookup<F>(lookup: F, keys: [&'static str; 4]) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let [storage_key, shm_key, mmap_key, algorithm_key] = keys;

        let storage = lookup(storage_key).ok_or(ConfigError::MissingParameter("storage_config"))?;
        let mut config = EngineConfig::new(storage);

        if let Some(value) = lookup(shm_key) {
            config.use_shared_memory = parse_flag(shm_key, &value)?;
        }
        if let Some(value) = lookup(mmap_key) {
            config.use_mmap = parse_flag(mmap_key, &value)?;
        }
        if let Some(value) = lookup(algorithm_key) {
            config.algorithm = value.trim().parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_config.as_os_str().is_empty() {
            return Err(ConfigError::MissingParameter("storage_config"));
        }
        // Shared memory datasets are owned by a separate loader process.
        if !self.use_shared_memory && !Path::new(&self.storage_config).exists() {
            return Err(ConfigError::StorageNotFound(self.storage_config.clone()));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn dataset(name: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("route-adapter-{}-{}.osrm", name, std::process::id()));
        fs::write(&path, b"graph").unwrap();
        path
    }

    fn bag(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_storage_is_reported() {
        let err = EngineConfig::from_params(&HashMap::new()).unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("storage_config"));
        assert!(err.to_string().contains("parameter missing"));
    }

    #[test]
    fn defaults_apply_when_only_storage_given() {
        let path = dataset("defaults");
        let config =
            EngineConfig::from_params(&bag(&[(STORAGE_CONFIG_KEY, path.to_str().unwrap())])).unwrap();
        assert!(config.use_mmap);
        assert!(!config.use_shared_memory);
        assert_eq!(config.algorithm, Algorithm::Ch);
    }

    #[test]
    fn explicit_values_are_parsed() {
        let path = dataset("explicit");
        let config = EngineConfig::from_params(&bag(&[
            (STORAGE_CONFIG_KEY, path.to_str().unwrap()),
            (USE_MMAP_KEY, "false"),
            (USE_SHARED_MEMORY_KEY, "1"),
            (ALGORITHM_KEY, "MLD"),
        ]))
        .unwrap();
        assert!(!config.use_mmap);
        assert!(config.use_shared_memory);
        assert_eq!(config.algorithm, Algorithm::Mld);
    }

    #[test]
    fn unknown_algorithm_fails() {
        let path = dataset("algorithm");
        let err = EngineConfig::from_params(&bag(&[
            (STORAGE_CONFIG_KEY, path.to_str().unwrap()),
            (ALGORITHM_KEY, "Dijkstra"),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid algorithm: Dijkstra");
    }

    #[test]
    fn bad_flag_names_the_key() {
        let path = dataset("flag");
        let err = EngineConfig::from_params(&bag(&[
            (STORAGE_CONFIG_KEY, path.to_str().unwrap()),
            (USE_MMAP_KEY, "maybe"),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid value for engineConfig.use_mmap: maybe");
    }

    #[test]
    fn nonexistent_storage_is_not_found() {
        let err = EngineConfig::new("/definitely/not/here.osrm").validate().unwrap_err();
        assert!(matches!(err, ConfigError::StorageNotFound(_)));
        assert!(err.to_string().ends_with("file not found"));
    }

    #[test]
    fn shared_memory_skips_file_check() {
        let mut config = EngineConfig::new("/shm/dataset");
        config.use_shared_memory = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"storage_config":"/data/map.osrm","algorithm":"MLD"}"#).unwrap();
        assert!(config.use_mmap);
        assert_eq!(config.algorithm, Algorithm::Mld);
    }
}
