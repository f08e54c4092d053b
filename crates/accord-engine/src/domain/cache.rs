//! Bounded-age cache of item bodies.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use accord_types::{Approvable, HashId};
use parking_lot::Mutex;

struct CachedItem {
    item: Arc<dyn Approvable>,
    inserted_at: Instant,
}

/// Maps `HashId` to an item body with a max-age TTL.
///
/// Entries older than `max_age` are treated as absent and evicted lazily on
/// access; `purge_expired` sweeps the rest. There is no capacity bound;
/// age is the only eviction policy. The cache never overrides the ledger:
/// on final-state lookups its presence only feeds the `have_copy` flag.
pub struct ItemCache {
    max_age: Duration,
    entries: Mutex<HashMap<HashId, CachedItem>>,
}

impl ItemCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a body, stamping the current wall-clock time.
    pub fn put(&self, item: Arc<dyn Approvable>) {
        let mut entries = self.entries.lock();
        entries.insert(
            item.id(),
            CachedItem {
                item,
                inserted_at: Instant::now(),
            },
        );
    }

    /// The body for `id`, unless absent or older than the TTL.
    pub fn get(&self, id: &HashId) -> Option<Arc<dyn Approvable>> {
        let mut entries = self.entries.lock();
        match entries.get(id) {
            Some(cached) if cached.inserted_at.elapsed() <= self.max_age => {
                Some(cached.item.clone())
            }
            Some(_) => {
                entries.remove(id);
                None
            }
            None => None,
        }
    }

    /// Whether a live copy of `id` is cached.
    pub fn contains(&self, id: &HashId) -> bool {
        self.get(id).is_some()
    }

    /// Drop every entry past the TTL.
    pub fn purge_expired(&self) {
        let mut entries = self.entries.lock();
        entries.retain(|_, cached| cached.inserted_at.elapsed() <= self.max_age);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_types::ItemError;

    struct BlankItem {
        id: HashId,
    }

    impl Approvable for BlankItem {
        fn id(&self) -> HashId {
            self.id.clone()
        }
        fn created_at(&self) -> u64 {
            0
        }
        fn expires_at(&self) -> u64 {
            0
        }
        fn check(&self) -> bool {
            true
        }
        fn referenced_items(&self) -> Vec<HashId> {
            Vec::new()
        }
        fn revoking_items(&self) -> Vec<Arc<dyn Approvable>> {
            Vec::new()
        }
        fn new_items(&self) -> Vec<Arc<dyn Approvable>> {
            Vec::new()
        }
        fn errors(&self) -> Vec<ItemError> {
            Vec::new()
        }
        fn add_error(&self, _error: ItemError) {}
    }

    fn item(tag: &[u8]) -> Arc<dyn Approvable> {
        Arc::new(BlankItem {
            id: HashId::of(tag),
        })
    }

    #[test]
    fn fresh_entries_are_returned() {
        let cache = ItemCache::new(Duration::from_secs(60));
        let body = item(b"fresh");
        cache.put(body.clone());
        assert_eq!(cache.get(&body.id()).unwrap().id(), body.id());
        assert!(cache.contains(&body.id()));
    }

    #[test]
    fn expired_entries_are_absent_and_evicted() {
        let cache = ItemCache::new(Duration::ZERO);
        let body = item(b"stale");
        cache.put(body.clone());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&body.id()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_sweeps_only_expired_entries() {
        let cache = ItemCache::new(Duration::from_millis(20));
        cache.put(item(b"old"));
        std::thread::sleep(Duration::from_millis(30));
        cache.put(item(b"young"));
        cache.purge_expired();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn put_refreshes_insertion_time() {
        let cache = ItemCache::new(Duration::from_millis(40));
        let body = item(b"refreshed");
        cache.put(body.clone());
        std::thread::sleep(Duration::from_millis(25));
        cache.put(body.clone());
        std::thread::sleep(Duration::from_millis(25));
        // 50ms after first insert, 25ms after the refresh: still live.
        assert!(cache.get(&body.id()).is_some());
    }
}
