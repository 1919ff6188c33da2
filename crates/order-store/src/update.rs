use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use domain::{Order, OrderStatus, PaymentStatus};
use serde::{Deserialize, Serialize};

/// Order fields the workflow is allowed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    Status,
    PaymentStatus,
    ProcessedAt,
    AttentionReason,
}

impl OrderField {
    /// Returns the field name as stored in the record store.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderField::Status => "status",
            OrderField::PaymentStatus => "payment_status",
            OrderField::ProcessedAt => "processed_at",
            OrderField::AttentionReason => "attention_reason",
        }
    }
}

/// A typed value for one [`OrderField`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Status(OrderStatus),
    PaymentStatus(PaymentStatus),
    ProcessedAt(DateTime<Utc>),
    AttentionReason(Option<String>),
}

impl FieldValue {
    /// Returns the field this value is written to.
    pub fn field(&self) -> OrderField {
        match self {
            FieldValue::Status(_) => OrderField::Status,
            FieldValue::PaymentStatus(_) => OrderField::PaymentStatus,
            FieldValue::ProcessedAt(_) => OrderField::ProcessedAt,
            FieldValue::AttentionReason(_) => OrderField::AttentionReason,
        }
    }
}

/// A field-value map describing a targeted order update.
///
/// Setting the same field twice keeps the last value.
///
/// ```
/// use domain::{OrderStatus, PaymentStatus};
/// use order_store::OrderUpdate;
///
/// let update = OrderUpdate::new()
///     .status(OrderStatus::Processing)
///     .payment_status(PaymentStatus::Completed);
/// assert_eq!(update.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    fields: BTreeMap<OrderField, FieldValue>,
}

impl OrderUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field value.
    pub fn set(mut self, value: FieldValue) -> Self {
        self.fields.insert(value.field(), value);
        self
    }

    pub fn status(self, status: OrderStatus) -> Self {
        self.set(FieldValue::Status(status))
    }

    pub fn payment_status(self, status: PaymentStatus) -> Self {
        self.set(FieldValue::PaymentStatus(status))
    }

    pub fn processed_at(self, at: DateTime<Utc>) -> Self {
        self.set(FieldValue::ProcessedAt(at))
    }

    pub fn attention_reason(self, reason: Option<String>) -> Self {
        self.set(FieldValue::AttentionReason(reason))
    }

    /// Merges `other` into this update; fields in `other` win.
    pub fn merge(mut self, other: OrderUpdate) -> Self {
        self.fields.extend(other.fields);
        self
    }

    /// Returns the value set for `field`, if any.
    pub fn get(&self, field: OrderField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    /// Iterates over the values in field order.
    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.fields.values()
    }

    /// Names of the fields this update writes, for logging.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.keys().map(OrderField::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Writes the fields onto `order` and bumps `updated_at`.
    pub fn apply_to(&self, order: &mut Order, now: DateTime<Utc>) {
        for value in self.fields.values() {
            match value {
                FieldValue::Status(s) => order.status = *s,
                FieldValue::PaymentStatus(s) => order.payment_status = *s,
                FieldValue::ProcessedAt(at) => order.processed_at = Some(*at),
                FieldValue::AttentionReason(r) => order.attention_reason = r.clone(),
            }
        }
        order.updated_at = now;
    }
}
