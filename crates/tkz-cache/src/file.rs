//! File-based cache implementation.
//!
//! [`FileCache`] stores one file per fingerprint under a root directory:
//!
//! ```text
//! {root}/
//! +-- VERSION              # contains the cache version string
//! +-- a3/
//! |   +-- a3f09c...e1.svg  # entry for fingerprint a3f09c...e1
//! +-- 7b/
//!     +-- ...
//! ```
//!
//! Entries are sharded into subdirectories by the first two characters of
//! the fingerprint so a long-lived cache does not accumulate thousands of
//! files in one directory.
//!
//! On construction, [`FileCache`] validates a `VERSION` file in the cache
//! root. If the version mismatches or is missing, the entire directory is
//! wiped and recreated. This ensures markup produced by an older pipeline
//! (different post-processing, different engine build) is never rehydrated.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{CacheError, RenderCache};

/// File-based [`RenderCache`] rooted at a directory on disk.
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Create a file-based cache at `root`, validating the cache version.
    ///
    /// If the `VERSION` file inside `root` does not match `version`, the
    /// entire cache directory is removed and recreated with the new version.
    /// Errors during validation are logged but never fatal.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        validate_version(&root, version);
        Self { root }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        // Fingerprints are hex, so the first two characters are a safe shard
        // name. Short keys fall back to a flat layout.
        if key.len() > 2 && key.chars().all(|c| c.is_ascii_alphanumeric()) {
            self.root.join(&key[..2]).join(format!("{key}.svg"))
        } else {
            self.root.join(format!("{key}.svg"))
        }
    }
}

impl RenderCache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        match fs::read_to_string(&path) {
            Ok(markup) => Some(markup),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::debug!("cache read failed for {}: {e}", path.display());
                None
            }
        }
    }

    fn put(&self, key: &str, markup: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, markup)?;
        Ok(())
    }
}

/// Validate the cache version, wiping the directory on mismatch.
fn validate_version(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("cache version matches: {version}");
            return;
        }
        Ok(stored) => {
            tracing::info!(
                "cache version mismatch (stored={stored}, current={version}), wiping cache"
            );
        }
        Err(_) => {
            tracing::info!("no cache VERSION file found, initializing cache");
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove cache directory: {e}");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!("failed to create cache directory: {e}");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!("failed to write cache VERSION file: {e}");
    }
}
