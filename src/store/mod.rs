// ============================================================================
// Order Store - durable, idempotent persistence of orders
// ============================================================================
//
// Saving is keyed by order_uid: the first save wins and every later save of
// the same uid reports AlreadyExists. A save either persists the whole order
// (header, delivery, payment, lines) or nothing.
//
// ============================================================================

mod errors;
mod postgres;
mod queries;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::Order;

pub use errors::StoreError;
pub use postgres::{connect_pool, PgOrderStore};

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Whether an order with this uid has been persisted.
    async fn exists(&self, uid: Uuid) -> Result<bool, StoreError>;

    /// Persists the order atomically. Returns the stored order with its
    /// persistence ids filled in, or `AlreadyExists` for a known uid.
    async fn save(&self, order: Order) -> Result<Order, StoreError>;

    /// Loads the full order or `NotFound`.
    async fn get(&self, uid: Uuid) -> Result<Order, StoreError>;

    /// Up to `n` most recently created orders, oldest first.
    async fn most_recent(&self, n: usize) -> Result<Vec<Order>, StoreError>;
}
