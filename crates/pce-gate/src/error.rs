// error.rs — Error types for engine configuration.
//
// Gate outcomes are never errors; every rule violation is a `Violation` in
// the decision. Only loading configuration can fail.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown values.
    #[error("invalid config at {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: toml::de::Error,
    },
}
