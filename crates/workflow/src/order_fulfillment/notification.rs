use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{STEP_PROCESS_PAYMENT, STEP_SEND_NOTIFICATIONS};
use crate::error::StepError;
use crate::services::{Notification, NotificationKind, NotificationSender, Priority};
use crate::step::{Step, StepContext, StepDetail};

const ORDER_CONFIRMED_TEMPLATE: &str = "order_confirmed";

/// Emails the customer an order confirmation. Best effort.
pub struct SendNotifications<N> {
    sender: N,
}

impl<N: NotificationSender> SendNotifications<N> {
    pub fn new(sender: N) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl<N: NotificationSender> Step for SendNotifications<N> {
    fn name(&self) -> &'static str {
        STEP_SEND_NOTIFICATIONS
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepDetail, StepError> {
        let order = ctx.order;
        let mut data = BTreeMap::from([
            ("order_id".to_string(), order.id.to_string()),
            ("total".to_string(), order.total.to_string()),
            ("currency".to_string(), order.currency.clone()),
        ]);
        if let Some(transaction_id) = ctx.reference_of(STEP_PROCESS_PAYMENT) {
            data.insert("transaction_id".to_string(), transaction_id.to_string());
        }

        self.sender
            .send(Notification {
                kind: NotificationKind::Email,
                recipient: order.customer_email.clone(),
                template: ORDER_CONFIRMED_TEMPLATE.to_string(),
                data,
                priority: Priority::Normal,
            })
            .await?;

        Ok(StepDetail::new(format!(
            "sent {ORDER_CONFIRMED_TEMPLATE} to {}",
            order.customer_email
        )))
    }

    fn is_best_effort(&self) -> bool {
        true
    }
}
