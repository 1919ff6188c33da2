use async_trait::async_trait;

use super::{STEP_RESERVE_INVENTORY, STEP_UPDATE_INVENTORY, reservation_items};
use crate::error::StepError;
use crate::services::InventoryAuthority;
use crate::step::{Step, StepContext, StepDetail};

/// Holds stock for every line of the order.
pub struct ReserveInventory<I> {
    inventory: I,
}

impl<I: InventoryAuthority> ReserveInventory<I> {
    pub fn new(inventory: I) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl<I: InventoryAuthority> Step for ReserveInventory<I> {
    fn name(&self) -> &'static str {
        STEP_RESERVE_INVENTORY
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepDetail, StepError> {
        let items = reservation_items(ctx.order);
        let reservation_id = self.inventory.reserve(&ctx.order.id, &items).await?;

        Ok(StepDetail::new(format!("reserved {} lines", items.len()))
            .with_reference(reservation_id))
    }

    fn compensates(&self) -> bool {
        true
    }

    async fn compensate(&self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        // A committed reservation is already stock that left the shelf.
        if ctx.has_succeeded(STEP_UPDATE_INVENTORY) {
            return Ok(());
        }
        let items = reservation_items(ctx.order);
        self.inventory.release(&ctx.order.id, &items).await
    }
}

/// Commits the reservation made by [`ReserveInventory`].
pub struct UpdateInventory<I> {
    inventory: I,
}

impl<I: InventoryAuthority> UpdateInventory<I> {
    pub fn new(inventory: I) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl<I: InventoryAuthority> Step for UpdateInventory<I> {
    fn name(&self) -> &'static str {
        STEP_UPDATE_INVENTORY
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepDetail, StepError> {
        let items = reservation_items(ctx.order);
        self.inventory.commit(&ctx.order.id, &items).await?;

        let mut detail = StepDetail::new(format!("committed {} units", ctx.order.item_count()));
        if let Some(reservation_id) = ctx.reference_of(STEP_RESERVE_INVENTORY) {
            detail = detail.with_reference(reservation_id);
        }
        Ok(detail)
    }
}
