//! Bounded, persistable URL verdict caches.
//!
//! A [`UrlCache`] memoizes the verdict for a URL so repeat requests skip
//! the rule scan. Entries survive restarts: the cache is saved to a JSON
//! file on engine teardown and restored best-effort at startup. A cached
//! verdict may be stale after a rule-set refresh; that staleness is
//! tolerated by design as an accuracy/performance trade-off.

use quick_cache::sync::Cache;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Bounded URL → verdict cache, safe for concurrent `get`/`put`.
pub struct UrlCache {
    /// Used as the persistence file stem.
    name: String,
    cache: Cache<String, bool>,
    capacity: usize,
}

impl UrlCache {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// Eviction beyond the capacity is approximate-LRU and never blocks
    /// callers.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            cache: Cache::new(capacity),
            capacity,
        }
    }

    /// Look up the cached verdict for a URL.
    pub fn get(&self, url: &str) -> Option<bool> {
        self.cache.get(url)
    }

    /// Record the verdict for a URL.
    pub fn put(&self, url: &str, verdict: bool) {
        self.cache.insert(url.to_string(), verdict);
    }

    /// Current number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// The cache name (persistence file stem).
    pub fn name(&self) -> &str {
        &self.name
    }

    fn file_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}_cache.json", self.name))
    }

    /// Restore entries from `dir`, best-effort.
    ///
    /// A missing file is normal (first run); a corrupt file is logged and
    /// yields an empty cache. Returns the number of entries restored.
    pub fn load(&self, dir: &Path) -> usize {
        let path = self.file_path(dir);
        if !path.exists() {
            log::debug!("no persisted {} cache at {:?}", self.name, path);
            return 0;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("discarding unreadable {} cache {:?}: {}", self.name, path, e);
                return 0;
            }
        };
        let entries: HashMap<String, bool> = match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("discarding corrupt {} cache {:?}: {}", self.name, path, e);
                return 0;
            }
        };

        let count = entries.len();
        for (url, verdict) in entries {
            self.cache.insert(url, verdict);
        }
        count
    }

    /// Persist current entries to `dir` as a JSON map.
    ///
    /// Writes go through a temp file and an atomic rename so a crash never
    /// leaves a half-written cache behind.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let entries: HashMap<String, bool> = self.cache.iter().collect();
        let content = serde_json::to_string(&entries)?;

        let path = self.file_path(dir);
        let temp_path = path.with_extension("json.tmp");
        let mut temp_file = fs::File::create(&temp_path)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.sync_all()?;
        drop(temp_file);
        fs::rename(&temp_path, &path)?;

        log::debug!("saved {} {} cache entries to {:?}", entries.len(), self.name, path);
        Ok(())
    }
}
