// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Only configuration problems are meant to escape to the caller. Stage
//! failures live in [`crate::scheduler::StageResult`] and cache corruption is
//! handled inside the scheduler (see [`crate::cache::CacheError`]).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    GraphCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cannot watch {path:?}: {reason}")]
    WatchIo { path: PathBuf, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssetflowError {
    /// True for the error kinds that mean "the graph or config is malformed".
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AssetflowError::ConfigError(_)
                | AssetflowError::TaskNotFound(_)
                | AssetflowError::GraphCycle(_)
                | AssetflowError::TomlError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetflowError>;
