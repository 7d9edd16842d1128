// error.rs — Error types for the registry and classifier.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the domain registry.
///
/// Every variant is a fatal initialization error: a registry that cannot be
/// loaded completely is never used partially.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry file could not be read.
    #[error("failed to read domain registry at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The registry source is not valid YAML or has the wrong shape.
    #[error("malformed domain registry: {0}")]
    Malformed(#[from] serde_yaml::Error),

    /// A rule pattern is not a valid glob or regex.
    #[error("invalid pattern '{pattern}' in domain '{domain}': {reason}")]
    InvalidPattern {
        domain: String,
        pattern: String,
        reason: String,
    },

    /// A rule has an empty domain name.
    #[error("rule #{index} has an empty domain name")]
    EmptyDomainName { index: usize },

    /// The registry declares no rules at all; every path would be unknown.
    #[error("domain registry contains no rules")]
    Empty,
}

/// Errors raised while classifying a change set.
///
/// Classification errors abort the gate pipeline: nothing downstream can
/// rescue an unknown or unsafe path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassifyError {
    /// The change set has no paths.
    #[error("change set is empty")]
    EmptyChangeSet,

    /// A changed path matches no registry rule.
    #[error("path '{path}' matches no declared risk domain")]
    UnknownDomain { path: String },

    /// A changed path tries to escape the repository root.
    #[error("path traversal detected in changed path '{path}'")]
    PathTraversal { path: String },
}
