use uuid::Uuid;

use crate::store::StoreError;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("order_uid is empty")]
    OrderUidEmpty,

    #[error("track_number is empty")]
    TrackNumberEmpty,

    #[error("delivery info is incomplete")]
    DeliveryIncomplete,

    #[error("payment amount is invalid: {0}")]
    PaymentAmountInvalid(i64),

    #[error("items list is empty")]
    ItemsEmpty,

    #[error("item {index} has invalid nm_id: {nm_id}")]
    ItemCatalogIdInvalid { index: usize, nm_id: i64 },

    #[error("item {index} has invalid total_price: {total_price}")]
    ItemTotalPriceInvalid { index: usize, total_price: i64 },

    #[error("date_created is not an RFC 3339 timestamp: {0:?}")]
    DateCreatedInvalid(String),
}

impl ValidationError {
    /// Stable reason code, used for logs and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::OrderUidEmpty => "order_uid_empty",
            ValidationError::TrackNumberEmpty => "track_number_empty",
            ValidationError::DeliveryIncomplete => "delivery_incomplete",
            ValidationError::PaymentAmountInvalid(_) => "payment_amount_invalid",
            ValidationError::ItemsEmpty => "items_empty",
            ValidationError::ItemCatalogIdInvalid { .. } => "item_nm_id_invalid",
            ValidationError::ItemTotalPriceInvalid { .. } => "item_total_price_invalid",
            ValidationError::DateCreatedInvalid(_) => "date_created_invalid",
        }
    }
}

/// Read path failures.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("order {0} does not exist")]
    OrderNotFound(Uuid),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(uid) => QueryError::OrderNotFound(uid),
            other => QueryError::Store(other),
        }
    }
}
