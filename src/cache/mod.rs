// Private module declaration
mod lru;

use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::Order;
use lru::Lru;

// ============================================================================
// Bounded Recency Cache
// ============================================================================
//
// Fixed-capacity order_uid -> Order map with least-recently-used eviction.
// One mutex serializes every operation; each critical section is O(1).
// Entries are snapshots of orders the store has accepted and are never the
// source of truth for existence.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("order {0} is not cached")]
    NotFound(Uuid),
}

pub struct RecencyCache {
    entries: Mutex<Lru<Uuid, Arc<Order>>>,
}

impl RecencyCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(Lru::new(capacity)),
        }
    }

    /// Inserts or refreshes the entry for `order.order_uid` and makes it most
    /// recently used. Returns the key evicted to make room, if any.
    pub fn set(&self, order: Order) -> Option<Uuid> {
        let uid = order.order_uid;
        let evicted = self.entries.lock().put(uid, Arc::new(order));

        match &evicted {
            Some((evicted_uid, _)) => {
                tracing::debug!(order_uid = %uid, evicted = %evicted_uid, "Cached order, evicted least recently used");
            }
            None => {
                tracing::debug!(order_uid = %uid, "Cached order");
            }
        }

        evicted.map(|(key, _)| key)
    }

    /// Returns the cached order and promotes it to most recently used.
    pub fn get(&self, uid: &Uuid) -> Result<Arc<Order>, CacheError> {
        let found = self.entries.lock().get(uid).cloned();
        match found {
            Some(order) => {
                tracing::debug!(order_uid = %uid, "Cache hit");
                Ok(order)
            }
            None => {
                tracing::debug!(order_uid = %uid, "Cache miss");
                Err(CacheError::NotFound(*uid))
            }
        }
    }

    /// Drops the entry for `uid`. Returns whether one was present.
    #[cfg(test)]
    pub fn invalidate(&self, uid: &Uuid) -> bool {
        let removed = self.entries.lock().remove(uid).is_some();
        if removed {
            tracing::debug!(order_uid = %uid, "Invalidated cached order");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.entries.lock().capacity()
    }

    /// Cached keys, most recently used first. Does not affect recency.
    #[cfg(test)]
    pub fn keys(&self) -> Vec<Uuid> {
        self.entries.lock().keys()
    }
}
