use async_trait::async_trait;
use domain::PaymentStatus;
use order_store::OrderUpdate;

use super::STEP_PROCESS_PAYMENT;
use crate::error::StepError;
use crate::services::{ChargeRequest, PaymentAuthority};
use crate::step::{Step, StepContext, StepDetail};

/// Charges the order total.
///
/// Relies on the payment authority deduplicating by order id, so a retry
/// after a lost reply never charges twice.
pub struct ProcessPayment<P> {
    payment: P,
}

impl<P: PaymentAuthority> ProcessPayment<P> {
    pub fn new(payment: P) -> Self {
        Self { payment }
    }
}

#[async_trait]
impl<P: PaymentAuthority> Step for ProcessPayment<P> {
    fn name(&self) -> &'static str {
        STEP_PROCESS_PAYMENT
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepDetail, StepError> {
        let request = ChargeRequest::from(ctx.order);
        let summary = format!(
            "charged {} {} via {}",
            request.amount, request.currency, request.method
        );
        let receipt = self.payment.charge(request).await?;

        Ok(StepDetail::new(summary).with_reference(receipt.transaction_id))
    }

    fn on_success(&self, _detail: &StepDetail) -> Option<OrderUpdate> {
        Some(OrderUpdate::new().payment_status(PaymentStatus::Completed))
    }

    fn on_failure(&self, _error: &str) -> Option<OrderUpdate> {
        Some(OrderUpdate::new().payment_status(PaymentStatus::Failed))
    }
}
