use async_trait::async_trait;
use chrono::Utc;
use domain::OrderStatus;
use order_store::OrderUpdate;

use super::{STEP_COMPLETE_ORDER, STEP_PROCESS_PAYMENT};
use crate::error::StepError;
use crate::step::{Step, StepContext, StepDetail};

/// Marks the order processed once payment went through and clears any
/// attention flag left by an earlier failed run.
pub struct CompleteOrder;

#[async_trait]
impl Step for CompleteOrder {
    fn name(&self) -> &'static str {
        STEP_COMPLETE_ORDER
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepDetail, StepError> {
        let transaction_id = ctx.reference_of(STEP_PROCESS_PAYMENT).ok_or_else(|| {
            StepError::Precondition(format!("order {} has no recorded payment", ctx.order.id))
        })?;

        Ok(StepDetail::new("order processed").with_reference(transaction_id))
    }

    fn on_success(&self, _detail: &StepDetail) -> Option<OrderUpdate> {
        Some(
            OrderUpdate::new()
                .status(OrderStatus::Processing)
                .processed_at(Utc::now())
                .attention_reason(None),
        )
    }
}
