//! The order fulfillment workflow.

mod complete;
mod inventory;
mod notification;
mod payment;
mod validate;

pub use complete::CompleteOrder;
pub use inventory::{ReserveInventory, UpdateInventory};
pub use notification::SendNotifications;
pub use payment::ProcessPayment;
pub use validate::ValidateOrder;

use domain::Order;

use crate::error::Result;
use crate::registry::StepRegistry;
use crate::services::{
    InventoryAuthority, NotificationSender, PaymentAuthority, ReservationItem,
};

/// The workflow type identifier for order fulfillment.
pub const WORKFLOW_TYPE: &str = "fulfill_order";

/// Step name: Check the order's business rules.
pub const STEP_VALIDATE_ORDER: &str = "validate_order";

/// Step name: Hold stock for the order.
pub const STEP_RESERVE_INVENTORY: &str = "reserve_inventory";

/// Step name: Charge the customer.
pub const STEP_PROCESS_PAYMENT: &str = "process_payment";

/// Step name: Turn the reservation into a stock deduction.
pub const STEP_UPDATE_INVENTORY: &str = "update_inventory";

/// Step name: Tell the customer the order was confirmed.
pub const STEP_SEND_NOTIFICATIONS: &str = "send_notifications";

/// Step name: Mark the order as processed.
pub const STEP_COMPLETE_ORDER: &str = "complete_order";

/// Builds the fulfillment registry over the given collaborators.
pub fn registry<I, P, N>(inventory: I, payment: P, notifier: N) -> Result<StepRegistry>
where
    I: InventoryAuthority + Clone + 'static,
    P: PaymentAuthority + 'static,
    N: NotificationSender + 'static,
{
    StepRegistry::builder(WORKFLOW_TYPE)
        .step(ValidateOrder)
        .step(ReserveInventory::new(inventory.clone()))
        .step(ProcessPayment::new(payment))
        .step(UpdateInventory::new(inventory))
        .step(SendNotifications::new(notifier))
        .step(CompleteOrder)
        .build()
}

fn reservation_items(order: &Order) -> Vec<ReservationItem> {
    order.items.iter().map(ReservationItem::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::execution::{StepResult, StepResultKind};
    use crate::services::{
        InMemoryInventoryAuthority, InMemoryNotificationSender, InMemoryPaymentAuthority,
    };
    use crate::step::{Step, StepContext, StepDetail};
    use chrono::Utc;
    use common::{ExecutionId, OrderId};
    use domain::{Money, OrderItem, OrderStatus, PaymentStatus};
    use order_store::{FieldValue, OrderField};
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn order() -> Order {
        Order::new(
            "O1",
            "ana@example.com",
            vec![OrderItem::new("P-1", "Widget", 2, Money::from_cents(1000))],
        )
    }

    fn succeeded(step: &str, reference: Option<&str>) -> StepResult {
        StepResult {
            step: step.into(),
            outcome: StepResultKind::Succeeded,
            detail: "ok".into(),
            reference: reference.map(str::to_string),
            attempt: 1,
            recorded_at: Utc::now(),
        }
    }

    async fn run_step(
        step: &dyn Step,
        order: &Order,
        results: &[StepResult],
    ) -> std::result::Result<StepDetail, StepError> {
        let cancel = CancellationToken::new();
        let ctx = StepContext {
            execution_id: ExecutionId::new(),
            order,
            results,
            attempt: 1,
            deadline: Instant::now() + std::time::Duration::from_secs(5),
            cancel: &cancel,
        };
        step.run(&ctx).await
    }

    #[test]
    fn test_registry_order() {
        let registry = registry(
            InMemoryInventoryAuthority::new(),
            InMemoryPaymentAuthority::new(),
            InMemoryNotificationSender::new(),
        )
        .unwrap();

        assert_eq!(registry.workflow_type(), WORKFLOW_TYPE);
        assert_eq!(
            registry.names(),
            vec![
                STEP_VALIDATE_ORDER,
                STEP_RESERVE_INVENTORY,
                STEP_PROCESS_PAYMENT,
                STEP_UPDATE_INVENTORY,
                STEP_SEND_NOTIFICATIONS,
                STEP_COMPLETE_ORDER,
            ]
        );
    }

    #[tokio::test]
    async fn test_validate_rejects_bad_order() {
        let mut bad = order();
        bad.customer_email = String::new();

        let err = run_step(&ValidateOrder, &bad, &[]).await.unwrap_err();
        assert!(matches!(err, StepError::InvalidOrder(_)));
        assert!(run_step(&ValidateOrder, &order(), &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_reserve_reports_reservation_id() {
        let inventory = InMemoryInventoryAuthority::new();
        let step = ReserveInventory::new(inventory.clone());

        let detail = run_step(&step, &order(), &[]).await.unwrap();
        assert!(detail.reference.unwrap().starts_with("RSV-"));
        assert!(inventory.is_reserved(&OrderId::new("O1")));
    }

    #[tokio::test]
    async fn test_payment_success_marks_payment_completed() {
        let step = ProcessPayment::new(InMemoryPaymentAuthority::new());
        let detail = run_step(&step, &order(), &[]).await.unwrap();

        let update = step.on_success(&detail).unwrap();
        assert_eq!(
            update.get(OrderField::PaymentStatus),
            Some(&FieldValue::PaymentStatus(PaymentStatus::Completed))
        );
        let failure = step.on_failure("declined").unwrap();
        assert_eq!(
            failure.get(OrderField::PaymentStatus),
            Some(&FieldValue::PaymentStatus(PaymentStatus::Failed))
        );
    }

    #[tokio::test]
    async fn test_notification_carries_transaction_id() {
        let sender = InMemoryNotificationSender::new();
        let step = SendNotifications::new(sender.clone());
        let results = [succeeded(STEP_PROCESS_PAYMENT, Some("TXN-0001"))];

        run_step(&step, &order(), &results).await.unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "ana@example.com");
        assert_eq!(sent[0].data.get("transaction_id").map(String::as_str), Some("TXN-0001"));
        assert!(step.is_best_effort());
    }

    #[tokio::test]
    async fn test_complete_requires_payment() {
        let err = run_step(&CompleteOrder, &order(), &[]).await.unwrap_err();
        assert!(matches!(err, StepError::Precondition(_)));

        let results = [succeeded(STEP_PROCESS_PAYMENT, Some("TXN-0001"))];
        let detail = run_step(&CompleteOrder, &order(), &results).await.unwrap();
        let update = CompleteOrder.on_success(&detail).unwrap();
        assert_eq!(
            update.get(OrderField::Status),
            Some(&FieldValue::Status(OrderStatus::Processing))
        );
        assert!(update.get(OrderField::ProcessedAt).is_some());
    }
}
