use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{Delivery, OrderLine, Payment};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// The order owns its delivery, payment and lines; they are stored and
// removed together. The JSON shape is the same for inbound messages and for
// read responses.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub order_uid: Uuid,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<OrderLine>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    /// ISO-8601 / RFC 3339 creation time, as sent by the producer.
    pub date_created: String,
    pub oof_shard: String,
}

impl Order {
    /// Gives the delivery, the payment and every line a fresh persistence id.
    pub fn assign_identifiers(&mut self) {
        self.delivery.delivery_uid = Uuid::new_v4();
        self.payment.payment_uid = Uuid::new_v4();
        for line in &mut self.items {
            line.order_line_uid = Uuid::new_v4();
        }
    }
}
