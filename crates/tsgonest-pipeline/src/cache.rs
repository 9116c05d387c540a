//! The post-processing cache.
//!
//! One small JSON file decides whether the whole pipeline can be skipped:
//! schema version, the config hash, and the outputs that must still exist.
//! Unknown fields on read mean a newer tool wrote the file — the entry is
//! treated as invalid and discarded. Writes go through a temp file and a
//! rename so a crashed run never leaves a torn cache.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cache file name inside the output directory.
pub const CACHE_FILE_NAME: &str = ".tsgonest-cache";

/// Bumped whenever the cache layout or any emitted format changes.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CacheEntry {
    pub version: u32,
    /// Hex SHA-256 of the config file bytes; empty when no config file.
    pub config_hash: String,
    /// Every file the previous run wrote. All must still exist.
    pub outputs: Vec<PathBuf>,
}

impl CacheEntry {
    #[must_use]
    pub fn new(config_hash: String, outputs: Vec<PathBuf>) -> Self {
        Self {
            version: CACHE_SCHEMA_VERSION,
            config_hash,
            outputs,
        }
    }

    /// Read an entry. Any parse failure — including unknown fields —
    /// discards the cache.
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        match serde_json::from_slice::<Self>(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    /// Whether the pipeline can be skipped: schema version and config
    /// hash match, and every recorded output still exists.
    #[must_use]
    pub fn is_valid(&self, config_hash: &str) -> bool {
        self.version == CACHE_SCHEMA_VERSION
            && self.config_hash == config_hash
            && self.outputs.iter().all(|path| path.exists())
    }

    /// Atomic write: temp file in the same directory, then rename.
    pub fn write_atomic(&self, path: &Path) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("tmp");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)
    }
}

/// Where the cache lives: `<outDir>/.tsgonest-cache`, or next to the
/// tsconfig when no `outDir` is configured.
#[must_use]
pub fn cache_path(out_dir: Option<&Path>, tsconfig_path: &Path) -> PathBuf {
    match out_dir {
        Some(out_dir) => out_dir.join(CACHE_FILE_NAME),
        None => {
            let base = tsconfig_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("tsconfig");
            let dir = tsconfig_path.parent().unwrap_or(Path::new("."));
            dir.join(format!("{base}.tsgonest-cache"))
        }
    }
}
