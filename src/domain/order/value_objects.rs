use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================
//
// Persistence identifiers (`delivery_uid`, `payment_uid`, `order_line_uid`)
// are never supplied by producers. They default to the nil UUID on decode and
// are assigned by the store when the order is saved.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Delivery {
    pub delivery_uid: Uuid,
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Payment {
    pub payment_uid: Uuid,
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Unix seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// Catalog item, addressed by `nm_id` and shared between orders.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Item {
    pub nm_id: i64,
    pub chrt_id: i64,
    pub track_number: String,
    pub rid: String,
    pub name: String,
    pub size: String,
    pub brand: String,
    pub status: i32,
}

/// One line of an order. On the wire the catalog item fields sit next to
/// the line fields in a single flat object.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct OrderLine {
    #[serde(default)]
    pub order_line_uid: Uuid,
    #[serde(flatten)]
    pub item: Item,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub sale: i32,
    #[serde(default)]
    pub total_price: i64,
    #[serde(default)]
    pub quantity: i32,
}

// ============================================================================
// Unit Tests
// ============================================================================
