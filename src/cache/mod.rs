// src/cache/mod.rs

//! Content-addressable memo from a stage invocation's [`Fingerprint`] to the
//! artifacts it produced.
//!
//! The store is always injected into the scheduler as an
//! `Arc<dyn CacheStore>`; there is no global instance.

pub mod file;
pub mod fingerprint;
pub mod memory;

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

pub use file::FileCacheStore;
pub use fingerprint::Fingerprint;
pub use memory::MemoryCacheStore;

use crate::fs::FileSystem;
use crate::scheduler::Diagnostic;
use crate::transform::Artifact;
use crate::types::CacheStorageMode;

#[derive(Error, Debug)]
pub enum CacheError {
    /// The stored entry exists but cannot be trusted. Callers treat this as
    /// a miss.
    #[error("cache entry {key} is corrupted: {reason}")]
    Corrupted { key: String, reason: String },

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: Fingerprint,
    pub artifacts: Vec<Artifact>,
    /// Non-fatal diagnostics of the run that produced the entry, replayed on
    /// every hit.
    pub diagnostics: Vec<Diagnostic>,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

impl CacheEntry {
    pub fn new(key: Fingerprint, artifacts: Vec<Artifact>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            key,
            artifacts,
            diagnostics: Vec::new(),
            created_at,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// Storage backend for stage results.
///
/// Implementations lock internally; concurrent `put`s for the same key are
/// allowed and the last one wins.
pub trait CacheStore: Send + Sync + Debug {
    fn get(&self, key: &Fingerprint) -> CacheResult<Option<CacheEntry>>;
    fn put(&self, entry: CacheEntry) -> CacheResult<()>;
    fn clear(&self) -> CacheResult<()>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the store selected by `[cache] storage`.
pub fn open_store(
    mode: CacheStorageMode,
    fs: Arc<dyn FileSystem>,
    dir: impl Into<PathBuf>,
) -> Arc<dyn CacheStore> {
    match mode {
        CacheStorageMode::Memory => Arc::new(MemoryCacheStore::new()),
        CacheStorageMode::File => Arc::new(FileCacheStore::new(fs, dir)),
    }
}
