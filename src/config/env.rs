// src/config/env.rs

//! Environment read once at startup.

use crate::types::BuildMode;

pub const ENV_VAR: &str = "ASSETFLOW_ENV";
pub const NODE_ENV_VAR: &str = "NODE_ENV";
pub const CACHE_VAR: &str = "ASSETFLOW_CACHE";
pub const CACHE_ENV_VAR: &str = "CACHE_ENV";

/// Variables printed by `envs` and commands with `check_envs = true`.
pub const REPORTED_VARS: [&str; 4] = [ENV_VAR, NODE_ENV_VAR, CACHE_VAR, CACHE_ENV_VAR];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Environment {
    pub mode: BuildMode,
    /// `ASSETFLOW_CACHE=clear`, or `CACHE_ENV=clear` when the former is unset.
    pub force_cache_clear: bool,
}

impl Environment {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `ASSETFLOW_ENV` wins over `NODE_ENV` and `ASSETFLOW_CACHE` over
    /// `CACHE_ENV`; only `production` selects production mode.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mode = match lookup(ENV_VAR).or_else(|| lookup(NODE_ENV_VAR)) {
            Some(value) if value.trim().eq_ignore_ascii_case("production") => BuildMode::Production,
            _ => BuildMode::Development,
        };
        let force_cache_clear = lookup(CACHE_VAR)
            .or_else(|| lookup(CACHE_ENV_VAR))
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("clear"));

        Self {
            mode,
            force_cache_clear,
        }
    }
}
