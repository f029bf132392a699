//! Shared cache of scanned templates, keyed by template id.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use stencil_types::Template;

/// A cached template plus the digest of the source it was scanned from.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub template: Arc<Template>,
    pub digest: String,
}

/// Thread-safe id → template map. Cloning shares the underlying storage.
///
/// Entries are replaced whole, so a reader holding an `Arc<Template>` keeps
/// the version it looked up even while a refresh swaps in a new one.
#[derive(Debug, Clone, Default)]
pub struct TemplateCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Template>> {
        self.read(|entries| entries.get(id).map(|e| Arc::clone(&e.template)))
    }

    /// Digest of the source the entry for `id` was scanned from.
    pub fn digest(&self, id: &str) -> Option<String> {
        self.read(|entries| entries.get(id).map(|e| e.digest.clone()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read(|entries| entries.contains_key(id))
    }

    pub fn insert(&self, id: impl Into<String>, template: Arc<Template>, digest: String) {
        self.write(|entries| {
            entries.insert(id.into(), CacheEntry { template, digest });
        });
    }

    /// Remove one entry; returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.write(|entries| entries.remove(id).is_some())
    }

    pub fn clear(&self) {
        self.write(HashMap::clear);
    }

    pub fn len(&self) -> usize {
        self.read(HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids = self.read(|entries| entries.keys().cloned().collect::<Vec<_>>());
        ids.sort();
        ids
    }

    // A panic while holding the lock cannot leave a half-written entry, so a
    // poisoned map is still consistent.
    fn read<R>(&self, f: impl FnOnce(&HashMap<String, CacheEntry>) -> R) -> R {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<R>(&self, f: impl FnOnce(&mut HashMap<String, CacheEntry>) -> R) -> R {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

/// SHA-256 of template source, hex encoded.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
