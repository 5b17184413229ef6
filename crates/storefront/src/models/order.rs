//! Orders and their item snapshots.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use warung_core::{AddressId, OrderId, OrderStatus, ProductId, Rupiah, UserId};

use super::Review;

/// An order as stored.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// Reference shared with the payment gateway.
    pub order_number: String,
    pub user_id: UserId,
    pub address_id: Option<AddressId>,
    pub delivery_address: String,
    pub courier: String,
    pub courier_service: String,
    pub items_amount: Rupiah,
    pub shipping_amount: Rupiah,
    pub gross_amount: Rupiah,
    pub status: OrderStatus,
    pub has_paid: bool,
    pub payment_type: Option<String>,
    pub currency: Option<String>,
    pub transaction_time: DateTime<Utc>,
    pub settlement_time: Option<DateTime<Utc>>,
    /// Set when stock could not cover a paid item.
    pub stock_shortfall: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product snapshot copied into an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemSnapshot {
    /// `None` once the product has been deleted.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Rupiah,
    pub quantity: i32,
}

/// An item in the customer's order history.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerOrderItem {
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Rupiah,
    pub quantity: i32,
    pub image_url: Option<String>,
    /// The caller's own review of this product, if any.
    pub my_review: Option<Review>,
}

/// A paid order in the customer's history.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerOrder {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub courier: String,
    pub courier_service: String,
    pub items_amount: Rupiah,
    pub shipping_amount: Rupiah,
    pub gross_amount: Rupiah,
    pub delivery_address: String,
    pub settlement_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<CustomerOrderItem>,
}

/// Order row in the admin table.
#[derive(Debug, Clone, Serialize)]
pub struct AdminOrder {
    pub id: OrderId,
    pub order_number: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub item_names: Vec<String>,
    pub gross_amount: Rupiah,
    pub status: OrderStatus,
    pub has_paid: bool,
    pub stock_shortfall: bool,
    pub courier: String,
    pub created_at: DateTime<Utc>,
}

/// Paid order totals for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SalesSummary {
    pub total_orders: i64,
    pub total_amount: Rupiah,
}

/// A pending order about to be written at checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub delivery_address: String,
    pub courier: String,
    pub courier_service: String,
    pub items: Vec<OrderItemSnapshot>,
    pub shipping_amount: Rupiah,
}

impl NewOrder {
    /// Sum of `unit_price * quantity`. `None` on overflow.
    #[must_use]
    pub fn items_amount(&self) -> Option<Rupiah> {
        self.items.iter().try_fold(Rupiah::ZERO, |total, item| {
            item.unit_price
                .checked_mul(item.quantity)
                .and_then(|line| total.checked_add(line))
        })
    }

    /// Items plus shipping. `None` on overflow.
    #[must_use]
    pub fn gross_amount(&self) -> Option<Rupiah> {
        self.items_amount()?.checked_add(self.shipping_amount)
    }
}

/// Order reference sent to the payment gateway: `ORD-<UTC timestamp>-<6 digits>`.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::rng().random_range(100_000..1_000_000);
    format!("ORD-{}-{suffix}", now.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn item(price: i64, quantity: i32) -> OrderItemSnapshot {
        OrderItemSnapshot {
            product_id: Some(ProductId::generate()),
            product_name: "Kopi".to_owned(),
            unit_price: Rupiah::new(price),
            quantity,
        }
    }

    fn order(items: Vec<OrderItemSnapshot>, shipping: i64) -> NewOrder {
        NewOrder {
            order_number: "ORD-1".to_owned(),
            user_id: UserId::generate(),
            address_id: AddressId::generate(),
            delivery_address: "Jl. Senopati No. 10".to_owned(),
            courier: "jne".to_owned(),
            courier_service: "REG".to_owned(),
            items,
            shipping_amount: Rupiah::new(shipping),
        }
    }

    #[test]
    fn test_amounts() {
        let order = order(vec![item(25_000, 2), item(10_000, 1)], 18_000);
        assert_eq!(order.items_amount(), Some(Rupiah::new(60_000)));
        assert_eq!(order.gross_amount(), Some(Rupiah::new(78_000)));
    }

    #[test]
    fn test_amount_overflow() {
        let order = order(vec![item(i64::MAX, 2)], 0);
        assert_eq!(order.items_amount(), None);
        assert_eq!(order.gross_amount(), None);
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        let number = generate_order_number(now);
        let (prefix, digits) = number.rsplit_once('-').unwrap();
        assert_eq!(prefix, "ORD-20250309140507");
        assert_eq!(digits.len(), 6);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }
}
