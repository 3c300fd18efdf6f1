// src/config/mod.rs

//! Configuration loading and validation for assetflow.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it and build the task graph (`validate.rs`).
//! - Read the mode-selecting environment once (`env.rs`).

pub mod env;
pub mod loader;
pub mod model;
pub mod validate;

pub use env::Environment;
pub use loader::{load_and_validate, load_from_path, project_root};
pub use model::{
    CacheSection, CommandConfig, ConfigFile, ConfigSection, OperationConfig, RawConfigFile,
    StageConfig, TaskConfig,
};
