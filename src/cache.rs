//! Directory listing cache
//!
//! Keyed by (provider id, canonical match path). Invalidation removes exactly
//! one key: a stale subtree under an invalidated directory stays cached until
//! it is invalidated itself or re-fetched with the cache bypassed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::entity::{Entity, Listing};

/// Trim trailing separators so `C:\Users\` and `C:\Users` share a key.
/// Roots (`/`, `C:\`, `pvfs://box/`) keep enough to stay distinct.
pub fn canonical_path(path: &str) -> String {
    let trimmed = path.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        return path.chars().take(1).collect();
    }
    if trimmed.ends_with(':') && trimmed.len() < path.len() {
        // `C:` or `pvfs:` alone would lose the root marker
        return path[..trimmed.len() + 1].to_string();
    }
    trimmed.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    provider: String,
    path: String,
}

impl CacheKey {
    fn new(provider: &str, path: &str) -> Self {
        Self { provider: provider.to_string(), path: canonical_path(path) }
    }
}

/// Shared listing cache: many readers, one writer
#[derive(Debug, Default)]
pub struct FileCache {
    entries: RwLock<HashMap<CacheKey, Listing>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, provider: &str, path: &str) -> Option<Listing> {
        let hit = self.entries.read().get(&CacheKey::new(provider, path)).cloned();
        trace!(provider, path, hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Store `children` and return the shared snapshot now cached
    pub fn put(&self, provider: &str, path: &str, children: Vec<Arc<Entity>>) -> Listing {
        let listing: Listing = Arc::new(children);
        self.entries.write().insert(CacheKey::new(provider, path), Arc::clone(&listing));
        listing
    }

    /// Drop exactly the entry for (`provider`, `path`)
    pub fn invalidate(&self, provider: &str, path: &str) {
        let removed = self.entries.write().remove(&CacheKey::new(provider, path)).is_some();
        trace!(provider, path, removed, "cache invalidate");
    }

    /// Drop every entry of one provider
    pub fn clear_provider(&self, provider: &str) {
        self.entries.write().retain(|key, _| key.provider != provider);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_path() {
        assert_eq!(canonical_path("/"), "/");
        assert_eq!(canonical_path("/public/"), "/public");
        assert_eq!(canonical_path("C:\\"), "C:\\");
        assert_eq!(canonical_path("C:\\Users\\"), "C:\\Users");
        assert_eq!(canonical_path("pvfs://box/"), "pvfs://box");
        assert_eq!(canonical_path("pvfs://box"), "pvfs://box");
    }

    #[test]
    fn test_get_returns_same_snapshot() {
        let cache = FileCache::new();
        let stored = cache.put("local", "/tmp", vec![Arc::new(Entity::file("local", "/tmp/a", "a"))]);
        let first = cache.get("local", "/tmp/").unwrap();
        let second = cache.get("local", "/tmp").unwrap();
        assert!(Arc::ptr_eq(&stored, &first));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.get("repository", "/tmp").is_none());
    }

    #[test]
    fn test_invalidate_does_not_cascade() {
        let cache = FileCache::new();
        cache.put("local", "/a", Vec::new());
        cache.put("local", "/a/b", Vec::new());
        cache.invalidate("local", "/a");
        assert!(cache.get("local", "/a").is_none());
        assert!(cache.get("local", "/a/b").is_some());
    }

    #[test]
    fn test_clear_provider() {
        let cache = FileCache::new();
        cache.put("local", "/a", Vec::new());
        cache.put("vfs", "pvfs://box/", Vec::new());
        cache.clear_provider("local");
        assert_eq!(cache.len(), 1);
    }
}
