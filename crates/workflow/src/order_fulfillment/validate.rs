use async_trait::async_trait;

use super::STEP_VALIDATE_ORDER;
use crate::error::StepError;
use crate::step::{Step, StepContext, StepDetail};

/// Rejects orders that break a business rule.
pub struct ValidateOrder;

#[async_trait]
impl Step for ValidateOrder {
    fn name(&self) -> &'static str {
        STEP_VALIDATE_ORDER
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepDetail, StepError> {
        let order = ctx.order;
        order.validate()?;

        Ok(StepDetail::new(format!(
            "{} items totalling {} {}",
            order.item_count(),
            order.total,
            order.currency
        )))
    }
}
