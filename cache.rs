use std::collections::HashMap;
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_128;

/// Process-local registry of revocable display handles. Registering a blob
/// yields a `mem://` token under which the bytes stay resolvable until the
/// token is revoked. Revocation is exactly-once: a second revoke of the same
/// token returns false and touches nothing.
#[derive(Default)]
pub struct HandleRegistry {
    handles: HashMap<String, Arc<Vec<u8>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a blob and returns its token. The token embeds the caller's
    /// key and a content hash, so identical content under different keys
    /// still gets independently revocable handles.
    pub fn create(&mut self, blob: &[u8], key: &str) -> String {
        let token = format!("mem://{}/{:032x}", key, xxh3_128(blob));
        self.handles
            .entry(token.clone())
            .or_insert_with(|| Arc::new(blob.to_vec()));
        token
    }

    pub fn resolve(&self, token: &str) -> Option<Arc<Vec<u8>>> {
        self.handles.get(token).cloned()
    }

    pub fn revoke(&mut self, token: &str) -> bool {
        let removed = self.handles.remove(token).is_some();
        if !removed {
            log::warn!("revoke of unknown handle {token}");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Bounded LRU mapping from a cache key to a live display handle. Whenever
/// an insertion pushes the cache past capacity, the least-recently-used
/// entry is evicted and its handle revoked. Construct one per application
/// lifecycle and `clear` it on teardown; there is no global instance.
pub struct HandleCache {
    registry: HandleRegistry,
    entries: HashMap<String, String>,
    // Recency order, oldest first. Re-spliced on every acquire hit; O(n),
    // fine at the configured capacities.
    order: Vec<String>,
    capacity: usize,
}

impl HandleCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: HandleRegistry::new(),
            entries: HashMap::new(),
            order: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns a handle token for `key`, creating one from `blob` if absent.
    /// A hit returns the existing token and marks the key most recently used.
    pub fn acquire(&mut self, key: &str, blob: &[u8]) -> String {
        if let Some(token) = self.entries.get(key) {
            let token = token.clone();
            self.touch(key);
            return token;
        }

        let token = self.registry.create(blob, key);
        self.entries.insert(key.to_string(), token.clone());
        self.order.push(key.to_string());

        if self.entries.len() > self.capacity {
            self.evict_oldest();
        }

        token
    }

    /// Existence check without any recency side effect.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    pub fn resolve(&self, token: &str) -> Option<Arc<Vec<u8>>> {
        self.registry.resolve(token)
    }

    /// Revokes and removes the entry for `key` regardless of recency.
    pub fn release(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(token) => {
                self.order.retain(|k| k != key);
                self.registry.revoke(&token)
            }
            None => false,
        }
    }

    /// Revokes every live handle and empties the cache.
    pub fn clear(&mut self) {
        for token in self.entries.values() {
            self.registry.revoke(token);
        }
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &str) {
        if let Some(index) = self.order.iter().position(|k| k == key) {
            let key = self.order.remove(index);
            self.order.push(key);
        }
    }

    fn evict_oldest(&mut self) {
        if self.order.is_empty() {
            return;
        }
        let oldest = self.order.remove(0);
        if let Some(token) = self.entries.remove(&oldest) {
            self.registry.revoke(&token);
            log::debug!("evicted handle for {oldest}");
        }
    }
}
