use chrono::DateTime;

use super::aggregate::Order;
use super::errors::ValidationError;

/// Checks the rules an inbound order must satisfy before it is persisted.
/// Rules are evaluated in a fixed order and the first violation is reported.
pub fn validate_order(order: &Order) -> Result<(), ValidationError> {
    if order.order_uid.is_nil() {
        return Err(ValidationError::OrderUidEmpty);
    }
    if order.track_number.trim().is_empty() {
        return Err(ValidationError::TrackNumberEmpty);
    }
    if order.delivery.name.trim().is_empty() || order.delivery.city.trim().is_empty() {
        return Err(ValidationError::DeliveryIncomplete);
    }
    if order.payment.amount <= 0 {
        return Err(ValidationError::PaymentAmountInvalid(order.payment.amount));
    }

    if order.items.is_empty() {
        return Err(ValidationError::ItemsEmpty);
    }
    for (index, line) in order.items.iter().enumerate() {
        if line.item.nm_id <= 0 {
            return Err(ValidationError::ItemCatalogIdInvalid { index, nm_id: line.item.nm_id });
        }
        if line.total_price <= 0 {
            return Err(ValidationError::ItemTotalPriceInvalid {
                index,
                total_price: line.total_price,
            });
        }
    }

    if DateTime::parse_from_rfc3339(&order.date_created).is_err() {
        return Err(ValidationError::DateCreatedInvalid(order.date_created.clone()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Delivery, Item, OrderLine, Payment};
    use uuid::Uuid;

    fn valid_order() -> Order {
        Order {
            order_uid: Uuid::new_v4(),
            track_number: "TRACK123".into(),
            delivery: Delivery { name: "Test User".into(), city: "Test City".into(), ..Delivery::default() },
            payment: Payment { amount: 100, ..Payment::default() },
            items: vec![OrderLine {
                item: Item { nm_id: 1, ..Item::default() },
                total_price: 100,
                ..OrderLine::default()
            }],
            date_created: "2021-11-26T06:22:19Z".into(),
            ..Order::default()
        }
    }

    #[test]
    fn test_valid_order_passes() {
        assert_eq!(validate_order(&valid_order()), Ok(()));
    }

    #[test]
    fn test_empty_order_reports_uid_first() {
        assert_eq!(validate_order(&Order::default()), Err(ValidationError::OrderUidEmpty));
    }

    #[test]
    fn test_track_number_empty() {
        let order = Order { track_number: "  ".into(), ..valid_order() };
        assert_eq!(validate_order(&order), Err(ValidationError::TrackNumberEmpty));
    }

    #[test]
    fn test_delivery_incomplete() {
        let mut order = valid_order();
        order.delivery.city.clear();
        assert_eq!(validate_order(&order), Err(ValidationError::DeliveryIncomplete));
    }

    #[test]
    fn test_zero_amount_is_rejected() {
        let mut order = valid_order();
        order.payment.amount = 0;

        let err = validate_order(&order).unwrap_err();

        assert_eq!(err, ValidationError::PaymentAmountInvalid(0));
        assert_eq!(err.code(), "payment_amount_invalid");
    }

    #[test]
    fn test_items_empty() {
        let order = Order { items: vec![], ..valid_order() };
        assert_eq!(validate_order(&order), Err(ValidationError::ItemsEmpty));
    }

    #[test]
    fn test_item_catalog_id_checked_before_price() {
        let mut order = valid_order();
        order.items.push(OrderLine::default());

        assert_eq!(
            validate_order(&order),
            Err(ValidationError::ItemCatalogIdInvalid { index: 1, nm_id: 0 })
        );
    }

    #[test]
    fn test_item_total_price_invalid() {
        let mut order = valid_order();
        order.items[0].total_price = -5;

        let err = validate_order(&order).unwrap_err();
        assert_eq!(err.code(), "item_total_price_invalid");
    }

    #[test]
    fn test_date_created_invalid() {
        let order = Order { date_created: "invalid-date".into(), ..valid_order() };
        assert_eq!(
            validate_order(&order),
            Err(ValidationError::DateCreatedInvalid("invalid-date".into()))
        );
    }

    #[test]
    fn test_date_created_with_offset_is_accepted() {
        let order = Order { date_created: "2024-03-01T12:00:00+03:00".into(), ..valid_order() };
        assert!(validate_order(&order).is_ok());
    }
}
