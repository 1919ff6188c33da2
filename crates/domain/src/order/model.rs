//! The order record as stored in the external document store.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

use super::{
    Money, OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingInfo,
};

/// Currency used when the creator does not specify one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// An order record.
///
/// The fulfillment workflow reads the whole record but writes only the
/// status fields (`status`, `payment_status`, `processed_at`,
/// `updated_at`, `attention_reason`), so concurrent edits to the rest of
/// the document survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub currency: String,
    pub items: Vec<OrderItem>,
    pub total: Money,
    #[serde(default)]
    pub shipping: ShippingInfo,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Set when a workflow failed and an operator should look at the order.
    pub attention_reason: Option<String>,
}

impl Order {
    /// Creates a pending order with the total computed from its items.
    pub fn new(
        id: impl Into<OrderId>,
        customer_email: impl Into<String>,
        items: Vec<OrderItem>,
    ) -> Self {
        let now = Utc::now();
        let mut order = Self {
            id: id.into(),
            customer_email: customer_email.into(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::default(),
            currency: DEFAULT_CURRENCY.to_string(),
            items,
            total: Money::zero(),
            shipping: ShippingInfo::default(),
            notes: String::new(),
            created_at: now,
            updated_at: now,
            processed_at: None,
            attention_reason: None,
        };
        order.calculate_total();
        order
    }

    /// Sets the payment method.
    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    /// Sets the shipping details.
    pub fn with_shipping(mut self, shipping: ShippingInfo) -> Self {
        self.shipping = shipping;
        self
    }

    /// Recomputes `total` from the items.
    ///
    /// An overflowing total is stored as zero; [`Order::validate`] reports
    /// the overflow.
    pub fn calculate_total(&mut self) {
        self.total = self.items_total().unwrap_or_default();
    }

    /// Sum of all line totals.
    pub fn items_total(&self) -> Result<Money, OrderError> {
        self.items.iter().try_fold(Money::zero(), |total, item| {
            item.line_total()
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| OrderError::AmountOverflow {
                    product_id: item.product_id.to_string(),
                })
        })
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |count, item| count.saturating_add(item.quantity))
    }

    pub fn is_payment_complete(&self) -> bool {
        self.payment_status == PaymentStatus::Completed
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.status.can_cancel()
    }

    pub fn can_be_shipped(&self) -> bool {
        self.status == OrderStatus::Paid && self.is_payment_complete()
    }

    /// Checks the business rules that must hold before fulfillment starts.
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }

        for item in &self.items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                });
            }
            if !item.unit_price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id.to_string(),
                    price: item.unit_price.cents(),
                });
            }
        }

        let computed = self.items_total()?;
        if computed != self.total || !self.total.is_positive() {
            return Err(OrderError::TotalMismatch {
                stored: self.total,
                computed,
            });
        }

        let email = self.customer_email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(OrderError::InvalidEmail(self.customer_email.clone()));
        }

        if !self.status.is_processable() {
            return Err(OrderError::NotProcessable(self.status));
        }

        if self.payment_status.is_settled() {
            return Err(OrderError::PaymentAlreadySettled(self.payment_status));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_order() -> Order {
        Order::new(
            "O1",
            "ana@example.com",
            vec![
                OrderItem::new("P-1", "Widget", 2, Money::from_cents(1000)),
                OrderItem::new("P-2", "Gadget", 1, Money::from_cents(2500)),
            ],
        )
    }

    #[test]
    fn test_new_order_defaults() {
        let order = valid_order();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.currency, DEFAULT_CURRENCY);
        assert_eq!(order.total.cents(), 4500);
        assert_eq!(order.item_count(), 3);
        assert!(order.processed_at.is_none());
    }

    #[test]
    fn test_valid_order_passes() {
        assert_eq!(valid_order().validate(), Ok(()));
    }

    #[test]
    fn test_processing_order_is_still_valid() {
        let mut order = valid_order();
        order.status = OrderStatus::Processing;
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_empty_order_rejected() {
        let order = Order::new("O1", "ana@example.com", vec![]);
        assert_eq!(order.validate(), Err(OrderError::NoItems));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut order = valid_order();
        order.items[0].quantity = 0;
        order.calculate_total();
        assert!(matches!(
            order.validate(),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let mut order = valid_order();
        order.items[1].unit_price = Money::zero();
        order.calculate_total();
        assert!(matches!(
            order.validate(),
            Err(OrderError::InvalidPrice { price: 0, .. })
        ));
    }

    #[test]
    fn test_tampered_total_rejected() {
        let mut order = valid_order();
        order.total = Money::from_cents(1);
        assert!(matches!(
            order.validate(),
            Err(OrderError::TotalMismatch { .. })
        ));
    }

    #[test]
    fn test_overflowing_line_rejected() {
        let order = Order::new(
            "O1",
            "ana@example.com",
            vec![OrderItem::new("P-1", "Widget", 2, Money::from_cents(i64::MAX / 2 + 1))],
        );
        assert_eq!(order.total, Money::zero());
        assert_eq!(
            order.validate(),
            Err(OrderError::AmountOverflow {
                product_id: "P-1".into()
            })
        );
    }

    #[test]
    fn test_overflowing_total_rejected() {
        let order = Order::new(
            "O1",
            "ana@example.com",
            vec![
                OrderItem::new("P-1", "Widget", 1, Money::from_cents(i64::MAX)),
                OrderItem::new("P-2", "Gadget", 1, Money::from_cents(1)),
            ],
        );
        assert_eq!(
            order.validate(),
            Err(OrderError::AmountOverflow {
                product_id: "P-2".into()
            })
        );
    }

    #[test]
    fn test_item_count_saturates() {
        let order = Order::new(
            "O1",
            "ana@example.com",
            vec![
                OrderItem::new("P-1", "Widget", u32::MAX, Money::from_cents(1)),
                OrderItem::new("P-2", "Gadget", 5, Money::from_cents(1)),
            ],
        );
        assert_eq!(order.item_count(), u32::MAX);
    }

    #[test]
    fn test_bad_email_rejected() {
        let mut order = valid_order();
        order.customer_email = "not-an-email".into();
        assert!(matches!(order.validate(), Err(OrderError::InvalidEmail(_))));
    }

    #[test]
    fn test_cancelled_order_rejected() {
        let mut order = valid_order();
        order.status = OrderStatus::Cancelled;
        assert_eq!(
            order.validate(),
            Err(OrderError::NotProcessable(OrderStatus::Cancelled))
        );
    }

    #[test]
    fn test_already_paid_order_rejected() {
        let mut order = valid_order();
        order.payment_status = PaymentStatus::Completed;
        assert_eq!(
            order.validate(),
            Err(OrderError::PaymentAlreadySettled(PaymentStatus::Completed))
        );
    }

    #[test]
    fn test_can_be_shipped_requires_paid_and_completed() {
        let mut order = valid_order();
        assert!(!order.can_be_shipped());
        order.status = OrderStatus::Paid;
        order.payment_status = PaymentStatus::Completed;
        assert!(order.can_be_shipped());
    }

    #[test]
    fn test_order_json_roundtrip_keeps_shipping() {
        let order = valid_order().with_shipping(ShippingInfo {
            full_name: "Ana".into(),
            city: "Lima".into(),
            method: "express".into(),
            ..Default::default()
        });
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back, order);
    }
}
