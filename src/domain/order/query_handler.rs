use std::sync::Arc;
use uuid::Uuid;

use crate::cache::RecencyCache;
use crate::metrics::Metrics;
use crate::store::OrderStore;

use super::aggregate::Order;
use super::errors::QueryError;

// ============================================================================
// Order Query Handler
// ============================================================================
//
// Orchestrates: Cache → Store → Cache
//
// ============================================================================

pub struct OrderQueryHandler {
    cache: Arc<RecencyCache>,
    store: Arc<dyn OrderStore>,
    metrics: Arc<Metrics>,
}

impl OrderQueryHandler {
    pub fn new(cache: Arc<RecencyCache>, store: Arc<dyn OrderStore>, metrics: Arc<Metrics>) -> Self {
        Self { cache, store, metrics }
    }

    /// Returns the order from the cache, falling back to the store and
    /// caching what it finds.
    pub async fn get_order(&self, uid: Uuid) -> Result<Arc<Order>, QueryError> {
        if let Ok(order) = self.cache.get(&uid) {
            self.metrics.record_cache_lookup(true);
            return Ok(order);
        }
        self.metrics.record_cache_lookup(false);

        let order = self.store.get(uid).await?;
        self.remember(order.clone());
        Ok(Arc::new(order))
    }

    /// Loads the `n` most recent orders into the cache so the newest ends up
    /// most recently used. Returns how many were loaded.
    pub async fn warm_up(&self, n: usize) -> Result<usize, QueryError> {
        let orders = self.store.most_recent(n).await?;
        let loaded = orders.len();
        for order in orders {
            self.remember(order);
        }
        tracing::info!(requested = n, loaded = loaded, "Cache warmed up");
        Ok(loaded)
    }

    fn remember(&self, order: Order) {
        let evicted = self.cache.set(order);
        self.metrics.record_cache_write(self.cache.len(), evicted.is_some());
    }
}
