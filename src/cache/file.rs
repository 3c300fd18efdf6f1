// src/cache/file.rs

//! Persistent store under `.assetflow/cache`:
//!
//! ```text
//! .assetflow/cache/
//!   entries/<fingerprint>.toml   manifest: artifact paths -> blob hashes,
//!                                plus the warnings of the producing run
//!   blobs/<blake3>               artifact bytes, content addressed
//! ```
//!
//! Blobs are written before the manifest that references them, so a reader
//! either sees a complete entry or none.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CacheEntry, CacheError, CacheResult, CacheStore, Fingerprint};
use crate::fs::FileSystem;
use crate::scheduler::Diagnostic;
use crate::transform::Artifact;

const ENTRIES_DIR: &str = "entries";
const BLOBS_DIR: &str = "blobs";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    key: String,
    created_at: u64,
    #[serde(default)]
    artifacts: Vec<ManifestArtifact>,
    #[serde(default)]
    diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestArtifact {
    path: String,
    blob: String,
}

pub struct FileCacheStore {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl fmt::Debug for FileCacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCacheStore").field("dir", &self.dir).finish()
    }
}

impl FileCacheStore {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn manifest_path(&self, key: &Fingerprint) -> PathBuf {
        self.dir.join(ENTRIES_DIR).join(format!("{}.toml", key.to_hex()))
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        self.dir.join(BLOBS_DIR).join(hash)
    }

    fn read_blob(&self, key: &Fingerprint, blob: &str) -> CacheResult<Vec<u8>> {
        let corrupted = |reason: String| CacheError::Corrupted {
            key: key.to_hex(),
            reason,
        };

        let expected = Fingerprint::from_hex(blob)
            .ok_or_else(|| corrupted(format!("invalid blob hash {blob:?}")))?;
        let path = self.blob_path(blob);
        if !self.fs.is_file(&path) {
            return Err(corrupted(format!("missing blob {blob}")));
        }
        let bytes = self.fs.read(&path)?;
        if Fingerprint::of_bytes(&bytes) != expected {
            return Err(corrupted(format!("blob {blob} does not match its hash")));
        }
        Ok(bytes)
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &Fingerprint) -> CacheResult<Option<CacheEntry>> {
        let path = self.manifest_path(key);
        if !self.fs.is_file(&path) {
            return Ok(None);
        }

        let text = self.fs.read(&path)?;
        let manifest: Manifest = std::str::from_utf8(&text)
            .map_err(|e| e.to_string())
            .and_then(|s| toml::from_str(s).map_err(|e| e.to_string()))
            .map_err(|reason| CacheError::Corrupted {
                key: key.to_hex(),
                reason: format!("unreadable manifest: {reason}"),
            })?;

        if manifest.key != key.to_hex() {
            return Err(CacheError::Corrupted {
                key: key.to_hex(),
                reason: format!("manifest is for key {}", manifest.key),
            });
        }

        let mut artifacts = Vec::with_capacity(manifest.artifacts.len());
        for item in &manifest.artifacts {
            let contents = self.read_blob(key, &item.blob)?;
            artifacts.push(Artifact::new(&item.path, contents));
        }

        debug!(key = %key, artifacts = artifacts.len(), "cache hit");
        Ok(Some(CacheEntry {
            key: *key,
            artifacts,
            diagnostics: manifest.diagnostics,
            created_at: manifest.created_at,
        }))
    }

    fn put(&self, entry: CacheEntry) -> CacheResult<()> {
        let mut manifest = Manifest {
            key: entry.key.to_hex(),
            created_at: entry.created_at,
            artifacts: Vec::with_capacity(entry.artifacts.len()),
            diagnostics: entry.diagnostics.clone(),
        };

        for artifact in &entry.artifacts {
            let blob = Fingerprint::of_bytes(&artifact.contents).to_hex();
            let path = self.blob_path(&blob);
            if !self.fs.is_file(&path) {
                self.fs.write(&path, &artifact.contents)?;
            }
            manifest.artifacts.push(ManifestArtifact {
                path: artifact.path_str(),
                blob,
            });
        }

        let text = toml::to_string(&manifest).context("serializing cache manifest")?;
        self.fs
            .write(&self.manifest_path(&entry.key), text.as_bytes())?;
        debug!(key = %entry.key, "cache entry stored");
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        self.fs.remove_dir_all(&self.dir)?;
        debug!(dir = ?self.dir, "cache cleared");
        Ok(())
    }

    fn len(&self) -> usize {
        self.fs
            .read_dir(&self.dir.join(ENTRIES_DIR))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|p| p.extension().is_some_and(|e| e == "toml"))
                    .count()
            })
            .unwrap_or(0)
    }
}
