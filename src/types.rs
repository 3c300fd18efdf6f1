use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// What a combinator does once one of its children has failed.
///
/// - `FailSafe`: every remaining child still runs so all diagnostics are
///   visible (default).
/// - `FailFast`: children that have not started a stage yet are skipped.
///   Stages already in flight always run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    FailSafe,
    FailFast,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "fail-safe" | "safe" => Ok(FailurePolicy::FailSafe),
            "fail-fast" | "fast" => Ok(FailurePolicy::FailFast),
            other => Err(format!(
                "invalid policy: {other} (expected \"fail-safe\" or \"fail-fast\")"
            )),
        }
    }
}

/// How connected browsers should refresh after a task succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefreshKind {
    /// Swap stylesheets in place without reloading the page.
    Inject,
    /// Reload the whole page.
    #[default]
    Full,
}

impl RefreshKind {
    /// Message sent over the reload transport.
    pub fn as_message(&self) -> &'static str {
        match self {
            RefreshKind::Inject => "inject",
            RefreshKind::Full => "reload",
        }
    }
}

impl fmt::Display for RefreshKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_message())
    }
}

/// Build mode selected once at startup from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub fn is_production(&self) -> bool {
        matches!(self, BuildMode::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where cache entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStorageMode {
    /// Persist entries under the cache directory (default).
    File,
    /// Keep entries in memory only (lost on restart).
    Memory,
}

impl Default for CacheStorageMode {
    fn default() -> Self {
        CacheStorageMode::File
    }
}
