// src/core/cache.rs

//! In-process cache primitives.
//!
//! Every cache in the crate is a plain key → value map with a deterministic key.
//! There is no eviction and no TTL: entries live for the lifetime of the process,
//! which matches a short-lived CLI invocation. Long-running embedders should call
//! `clear` (or the store-specific invalidation hooks) when the registry changes.

use log::trace;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::sync::OnceCell;

use crate::core::download_store::RecipeDownload;
use crate::core::query_store::QueryResultData;
use crate::core::recipe::{ElfTask, Recipe};
use crate::core::recipe_file::RecipeFile;

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

/// A thread-safe, unbounded key → value map.
#[derive(Debug)]
pub struct MemoryCache<V> {
    name: &'static str,
    entries: Mutex<HashMap<String, V>>,
}

impl<V: Clone> MemoryCache<V> {
    /// Creates an empty cache. `name` only shows up in trace logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, V>> {
        // A poisoned map still holds valid entries; keep serving them.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a clone of the cached value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let hit = self.lock().get(key).cloned();
        trace!(
            "[{}] {} for '{}'",
            self.name,
            if hit.is_some() { "hit" } else { "miss" },
            key
        );
        hit
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.lock().insert(key.into(), value);
    }

    /// Returns the entry for `key`, inserting `init()` first if there is none.
    pub fn get_or_insert_with(&self, key: &str, init: impl FnOnce() -> V) -> V {
        self.lock().entry(key.to_string()).or_insert_with(init).clone()
    }

    /// Drops the entry for `key`. Returns `true` if there was one.
    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Returns `true` if an entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Keeps only the entries whose key satisfies `keep`.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) {
        self.lock().retain(|key, _| keep(key));
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Raw registry values, keyed by registry path.
pub type EntityCache = MemoryCache<serde_json::Value>;
/// Loaded, runnable recipes, keyed by [`recipe_cache_key`].
pub type RecipeCache = MemoryCache<Arc<Recipe>>;
/// Loaded manifests, keyed by [`recipe_file_cache_key`].
pub type RecipeFileCache = MemoryCache<Arc<RecipeFile>>;
/// Resolved queries, keyed by the raw query string.
pub type RecipeQueryCache = MemoryCache<QueryResultData>;
/// One download slot per URL. The slot is shared by concurrent first callers.
pub type RecipeDownloadCache = MemoryCache<Arc<OnceCell<Arc<RecipeDownload>>>>;
/// Local tasks, keyed by name.
pub type ElfCache = MemoryCache<Arc<ElfTask>>;

/// Key for a concrete recipe version: `type-scope-name-version`.
pub fn recipe_cache_key(recipe_type: &str, scope: &str, name: &str, version: &str) -> String {
    format!("{}-{}-{}-{}", recipe_type, scope, name, version)
}

/// Key for a manifest: the normalized path with forward slashes.
///
/// The path is canonicalized when it exists so `./a/../a/recipe.json` and
/// `a/recipe.json` share one entry.
pub fn recipe_file_cache_key(path: &Path) -> String {
    let normalized = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    normalized.to_string_lossy().replace('\\', "/")
}

/// Full blake3 hex digest of `bytes`. Used as the content hash of packages.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Short, path-safe fingerprint of a string, used to address downloads by URL.
pub fn url_fingerprint(url: &str) -> String {
    let hash = blake3::hash(url.as_bytes());
    hex::encode(hash.as_bytes().get(..HASH_TRUNCATE_LENGTH).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_memory_cache_set_get_remove() {
        let cache: MemoryCache<u32> = MemoryCache::new("test");
        assert!(cache.is_empty());

        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.len(), 2);

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.get("a"), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_or_insert_with_keeps_first_value() {
        let cache: MemoryCache<u32> = MemoryCache::new("test");
        assert_eq!(cache.get_or_insert_with("a", || 1), 1);
        assert_eq!(cache.get_or_insert_with("a", || 2), 1);
    }

    #[test]
    fn test_recipe_cache_key_is_deterministic() {
        assert_eq!(
            recipe_cache_key("gulp", "public", "mylib", "1.2.0"),
            "gulp-public-mylib-1.2.0"
        );
    }

    #[test]
    fn test_recipe_file_cache_key_normalizes_existing_paths() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a").join("recipe.json"), "{}").unwrap();

        let direct = dir.path().join("a").join("recipe.json");
        let roundabout = dir.path().join("a").join("..").join("a").join("recipe.json");

        assert_eq!(
            recipe_file_cache_key(&direct),
            recipe_file_cache_key(&roundabout)
        );
    }

    #[test]
    fn test_content_hash_of_hello_world() {
        // Pre-calculated blake3 hash of the bytes "hello world".
        assert_eq!(
            content_hash(b"hello world"),
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn test_url_fingerprint_is_truncated() {
        let fp = url_fingerprint("https://example.com/a.tgz");
        assert_eq!(fp.len(), 32);
        assert_eq!(fp, url_fingerprint("https://example.com/a.tgz"));
        assert_ne!(fp, url_fingerprint("https://example.com/b.tgz"));
    }
}
