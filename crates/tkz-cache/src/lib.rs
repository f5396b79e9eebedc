//! Persistent render cache for tkz.
//!
//! Rendered diagrams are keyed by a content fingerprint and stored as
//! complete markup strings. The [`RenderCache`] trait decouples the pipeline
//! from the storage mechanism:
//!
//! - [`NullCache`]: no-op implementation (always misses)
//! - [`MemoryCache`]: in-process `HashMap` store, useful in tests and for
//!   embedders without durable storage
//! - [`FileCache`]: file-per-entry store with version validation, survives
//!   process restarts
//!
//! Lookups treat absence as a normal outcome, never an error. Write failures
//! are reported to the caller, which is expected to log and continue: by the
//! time a write happens the diagram has already been rendered and shown, so
//! a full cache must never turn into a rendering failure.
//!
//! # Example
//!
//! ```
//! use tkz_cache::{MemoryCache, RenderCache};
//!
//! let cache = MemoryCache::new();
//! cache.put("a3f09c", "<svg>diagram</svg>").unwrap();
//! assert_eq!(cache.get("a3f09c"), Some("<svg>diagram</svg>".to_owned()));
//! assert_eq!(cache.get("missing"), None);
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

mod file;
pub use file::FileCache;

/// Error raised by a failed cache write.
///
/// Reads never fail; a missing or unreadable entry is simply a miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store rejected the write.
    #[error("cache write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-value store mapping content fingerprints to rendered markup.
///
/// Keys are opaque fingerprint strings (hex digests in practice). Values are
/// complete serialized markup. Entries are written once after a successful
/// render and never expire; invalidation is external (or version-level, see
/// [`FileCache`]). Concurrent use is safe and last-writer-wins: identical
/// keys imply byte-identical inputs and therefore identical outputs.
pub trait RenderCache: Send + Sync {
    /// Look up previously rendered markup.
    ///
    /// Returns `None` on a miss. Never fails: backend errors are treated as
    /// misses.
    fn get(&self, key: &str) -> Option<String>;

    /// Store rendered markup under `key`, overwriting any existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backing store rejects the write
    /// (quota, permissions, disabled storage). Callers treat this as
    /// non-fatal.
    fn put(&self, key: &str, markup: &str) -> Result<(), CacheError>;
}

/// No-op [`RenderCache`] that never stores or retrieves anything.
///
/// Every `get` misses; every `put` succeeds and discards the value. Used
/// when caching is disabled entirely.
pub struct NullCache;

impl RenderCache for NullCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn put(&self, _key: &str, _markup: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

/// In-memory [`RenderCache`] backed by a mutex-guarded map.
///
/// Does not survive process restarts; mainly useful in tests and embedders
/// that only want same-session deduplication.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RenderCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, markup: &str) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), markup.to_owned());
        Ok(())
    }
}
