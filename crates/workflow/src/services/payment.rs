//! Payment authority trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Money, Order, PaymentMethod};

use crate::error::StepError;

const SERVICE: &str = "payment";

/// A charge for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
}

impl From<&Order> for ChargeRequest {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            amount: order.total,
            currency: order.currency.clone(),
            method: order.payment_method,
        }
    }
}

/// Proof of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    pub transaction_id: String,
    pub amount: Money,
    pub processed_at: DateTime<Utc>,
}

/// Moves money for orders.
#[async_trait]
pub trait PaymentAuthority: Send + Sync {
    /// Charges an order.
    ///
    /// Implementations must dedupe by order id: charging an order that was
    /// already charged returns the original receipt.
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, StepError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    charges: HashMap<OrderId, ChargeReceipt>,
    next_id: u32,
    calls: u32,
    decline_reason: Option<String>,
    transient_failures: u32,
    lost_responses: u32,
    latency: Duration,
}

/// In-memory payment authority for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentAuthority {
    state: Arc<Mutex<InMemoryPaymentState>>,
}

impl InMemoryPaymentAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines every charge with `reason`, or stops declining with `None`.
    pub fn set_decline(&self, reason: Option<&str>) {
        self.state().decline_reason = reason.map(str::to_string);
    }

    /// Fails the next `count` calls before anything is charged.
    pub fn fail_transient(&self, count: u32) {
        self.state().transient_failures = count;
    }

    /// Charges on the next `count` calls but reports a transient failure,
    /// as if the reply was lost on the way back.
    pub fn lose_responses(&self, count: u32) {
        self.state().lost_responses = count;
    }

    /// Delays every call.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Number of orders actually charged.
    pub fn charge_count(&self) -> usize {
        self.state().charges.len()
    }

    /// Number of charge calls received.
    pub fn call_count(&self) -> u32 {
        self.state().calls
    }

    pub fn receipt_for(&self, order_id: &OrderId) -> Option<ChargeReceipt> {
        self.state().charges.get(order_id).cloned()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryPaymentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaymentAuthority for InMemoryPaymentAuthority {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, StepError> {
        let latency = self.state().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        state.calls += 1;

        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(StepError::transient(SERVICE, "gateway timeout"));
        }

        if let Some(receipt) = state.charges.get(&request.order_id) {
            return Ok(receipt.clone());
        }

        if let Some(reason) = &state.decline_reason {
            return Err(StepError::Declined(reason.clone()));
        }

        state.next_id += 1;
        let receipt = ChargeReceipt {
            transaction_id: format!("TXN-{:04}", state.next_id),
            amount: request.amount,
            processed_at: Utc::now(),
        };
        state.charges.insert(request.order_id, receipt.clone());

        if state.lost_responses > 0 {
            state.lost_responses -= 1;
            return Err(StepError::transient(SERVICE, "response lost"));
        }

        Ok(receipt)
    }
}
