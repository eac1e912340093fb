//! In-process `OrderStore` for tests, with scriptable failures and call counters.

use async_trait::async_trait;
use chrono::DateTime;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use crate::domain::order::Order;

use super::{OrderStore, StoreError};

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<Uuid, Order>>,
    failing_saves: AtomicUsize,
    refused_saves: AtomicUsize,
    failing_gets: AtomicUsize,
    failing_exists: AtomicUsize,
    pub save_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub exists_calls: AtomicUsize,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` saves fail as if the store had used up its retries.
    pub fn fail_next_saves(&self, n: usize) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    /// The next `n` saves fail with a non-transient database error.
    pub fn refuse_next_saves(&self, n: usize) {
        self.refused_saves.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_gets(&self, n: usize) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_exists(&self, n: usize) {
        self.failing_exists.store(n, Ordering::SeqCst);
    }

    /// Inserts without going through `save`; counters are untouched.
    pub fn seed(&self, order: Order) {
        self.orders.lock().insert(order.order_uid, order);
    }

    pub fn contains(&self, uid: &Uuid) -> bool {
        self.orders.lock().contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.orders.lock().len()
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn take_failure(counter: &AtomicUsize, operation: &'static str) -> Option<StoreError> {
        Self::take(counter).then(|| StoreError::Fatal {
            operation,
            attempts: 1,
            source: Box::new(StoreError::Database(sqlx::Error::PoolTimedOut)),
        })
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn exists(&self, uid: Uuid) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = Self::take_failure(&self.failing_exists, "exists") {
            return Err(err);
        }
        Ok(self.contains(&uid))
    }

    async fn save(&self, mut order: Order) -> Result<Order, StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = Self::take_failure(&self.failing_saves, "save") {
            return Err(err);
        }
        if Self::take(&self.refused_saves) {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }

        let mut orders = self.orders.lock();
        if orders.contains_key(&order.order_uid) {
            return Err(StoreError::AlreadyExists(order.order_uid));
        }
        order.assign_identifiers();
        orders.insert(order.order_uid, order.clone());
        Ok(order)
    }

    async fn get(&self, uid: Uuid) -> Result<Order, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = Self::take_failure(&self.failing_gets, "get") {
            return Err(err);
        }

        self.orders
            .lock()
            .get(&uid)
            .cloned()
            .ok_or(StoreError::NotFound(uid))
    }

    async fn most_recent(&self, n: usize) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self.orders.lock().values().cloned().collect();
        orders.sort_by_key(|order| {
            (DateTime::parse_from_rfc3339(&order.date_created).ok(), order.order_uid)
        });
        let skip = orders.len().saturating_sub(n);
        Ok(orders.split_off(skip))
    }
}
