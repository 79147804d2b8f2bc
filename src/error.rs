//! Error types for the stitcher library

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the stitcher core
#[derive(Error, Debug)]
pub enum StitcherError {
    /// No workspace root could be resolved from the starting path
    #[error("workspace not found from {}", .0.display())]
    WorkspaceNotFound(PathBuf),

    /// A path was expected to live under the workspace root
    #[error("path {} is outside the workspace root {}", path.display(), root.display())]
    OutsideWorkspace { path: PathBuf, root: PathBuf },

    /// A symbol URI could not be parsed
    #[error("invalid symbol URI '{uri}': {reason}")]
    InvalidSuri { uri: String, reason: String },

    /// A fingerprint key does not match the key grammar
    #[error("invalid fingerprint key '{0}'")]
    InvalidFingerprintKey(String),

    /// Source or sidecar text could not be understood
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    /// The stitcher configuration is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// A migration spec could not be loaded
    #[error("invalid migration spec {}: {reason}", path.display())]
    MigrationSpec { path: PathBuf, reason: String },

    /// The refactor planner cannot produce a safe plan
    #[error("refactor planning failed: {0}")]
    Planning(String),

    /// A transaction operation failed and was rolled back
    #[error("transaction failed while applying {op}: {source}")]
    Transaction {
        op: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

impl StitcherError {
    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StitcherError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, StitcherError>;
