//! Per-identifier mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use accord_types::HashId;
use tokio::sync::Mutex;

/// A table of per-`HashId` mutexes.
///
/// `synchronize` runs a critical section under the lock for one id:
/// concurrent calls with the same id serialize, distinct ids proceed in
/// parallel, and the lock is released on every exit path. Slots are held
/// weakly; a slot with no remaining contender is purged the next time a
/// fresh slot is allocated, so the table tracks live contention only.
pub struct ItemLock {
    slots: parking_lot::Mutex<HashMap<HashId, Weak<Mutex<()>>>>,
}

impl ItemLock {
    pub fn new() -> Self {
        Self {
            slots: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Run `section` while holding the lock for `id`.
    pub async fn synchronize<R, F, Fut>(&self, id: &HashId, section: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        let slot = self.slot(id);
        let _guard = slot.lock().await;
        section().await
    }

    fn slot(&self, id: &HashId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock();
        if let Some(existing) = slots.get(id).and_then(Weak::upgrade) {
            return existing;
        }
        slots.retain(|_, weak| weak.strong_count() > 0);
        let slot = Arc::new(Mutex::new(()));
        slots.insert(id.clone(), Arc::downgrade(&slot));
        slot
    }

    #[cfg(test)]
    fn table_len(&self) -> usize {
        self.slots.lock().len()
    }
}

impl Default for ItemLock {
    fn default() -> Self {
        Self::new()
    }
}
