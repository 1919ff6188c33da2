//! Drives one execution through the registered steps.

use std::future::Future;

use chrono::Utc;
use common::{ExecutionId, OrderId};
use domain::{Order, OrderStatus};
use order_store::{OrderStore, OrderUpdate};
use tokio_util::sync::CancellationToken;

use crate::config::{RetryPolicy, WorkflowConfig};
use crate::error::StepError;
use crate::events::WorkflowEvent;
use crate::execution::WorkflowExecution;
use crate::executor::{StepExecutor, StepOutcome};
use crate::registry::{StepDefinition, StepRegistry};
use crate::step::StepContext;
use crate::store::ExecutionStore;

/// Why a run stopped before the last step.
#[derive(Debug)]
struct Halt {
    reason: String,
    /// Extra order fields contributed by the failing step.
    order_update: Option<OrderUpdate>,
}

impl Halt {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            order_update: None,
        }
    }
}

impl From<StepError> for Halt {
    fn from(err: StepError) -> Self {
        Halt::new(err.to_string())
    }
}

/// Runs executions of one workflow type.
///
/// The engine is the only writer of an execution while it runs. Order
/// records are only touched through targeted field updates.
pub struct WorkflowEngine<S, E>
where
    S: OrderStore,
    E: ExecutionStore,
{
    orders: S,
    executions: E,
    registry: StepRegistry,
    executor: StepExecutor,
    retry: RetryPolicy,
}

impl<S, E> WorkflowEngine<S, E>
where
    S: OrderStore,
    E: ExecutionStore,
{
    pub fn new(orders: S, executions: E, registry: StepRegistry, config: WorkflowConfig) -> Self {
        Self {
            orders,
            executions,
            registry,
            executor: StepExecutor::new(config.step_timeout),
            retry: config.retry,
        }
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn orders(&self) -> &S {
        &self.orders
    }

    pub fn executions(&self) -> &E {
        &self.executions
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Creates and stores a pending execution.
    pub async fn admit(&self, order_id: OrderId, execution_id: ExecutionId) -> WorkflowExecution {
        let mut execution = WorkflowExecution::default();
        let event = WorkflowEvent::admitted(
            execution_id,
            order_id,
            self.registry.workflow_type(),
            self.registry.first_step(),
        );
        self.record(&mut execution, event).await;
        execution
    }

    /// Fails an execution that will never run.
    pub async fn abandon(
        &self,
        mut execution: WorkflowExecution,
        reason: &str,
    ) -> WorkflowExecution {
        self.record(&mut execution, WorkflowEvent::failed(reason))
            .await;
        metrics::counter!("workflow_failed_total").increment(1);
        tracing::warn!(
            order_id = %execution.order_id(),
            execution_id = %execution.id(),
            reason,
            "workflow abandoned before running"
        );
        execution
    }

    /// Runs an admitted execution to a terminal status.
    ///
    /// Never returns early: every exit path leaves the execution completed
    /// or failed, and a failed execution has had its compensations run.
    #[tracing::instrument(
        skip_all,
        fields(order_id = %execution.order_id(), execution_id = %execution.id())
    )]
    pub async fn run(
        &self,
        mut execution: WorkflowExecution,
        cancel: &CancellationToken,
    ) -> WorkflowExecution {
        let started = std::time::Instant::now();
        metrics::counter!("workflow_started_total").increment(1);
        tracing::info!(workflow_type = execution.workflow_type(), "workflow started");

        let outcome = match self.start(&mut execution, cancel).await {
            Ok(()) => self.run_steps(&mut execution, cancel).await,
            Err(halt) => Err(halt),
        };

        match outcome {
            Ok(()) => {
                self.record(&mut execution, WorkflowEvent::completed()).await;
                metrics::counter!("workflow_completed_total").increment(1);
                tracing::info!(retries = execution.retry_count(), "workflow completed");
            }
            Err(halt) => self.fail(&mut execution, halt, cancel).await,
        }

        metrics::histogram!("workflow_duration_seconds").record(started.elapsed().as_secs_f64());
        execution
    }

    /// Moves a pending order to processing and marks the execution running.
    async fn start(
        &self,
        execution: &mut WorkflowExecution,
        cancel: &CancellationToken,
    ) -> Result<(), Halt> {
        if cancel.is_cancelled() {
            return Err(Halt::new("cancelled before start"));
        }

        let order_id = execution.order_id().clone();
        let order = self
            .with_store_retry(&order_id, "load order", || self.orders.get_order(&order_id))
            .await?;

        let prior_status = if order.status == OrderStatus::Pending {
            self.persist(
                &order_id,
                OrderUpdate::new().status(OrderStatus::Processing),
            )
            .await?;
            Some(order.status)
        } else {
            None
        };

        self.record(execution, WorkflowEvent::started(prior_status))
            .await;
        Ok(())
    }

    async fn run_steps(
        &self,
        execution: &mut WorkflowExecution,
        cancel: &CancellationToken,
    ) -> Result<(), Halt> {
        for (index, definition) in self.registry.steps().iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Halt::new(format!(
                    "cancelled before step '{}'",
                    definition.name()
                )));
            }

            self.record(execution, WorkflowEvent::step_started(definition.name(), index))
                .await;
            tracing::info!(step = definition.name(), index, "step started");
            self.run_step(execution, definition, cancel).await?;
        }
        Ok(())
    }

    /// Attempts one step until it succeeds, fails fatally or runs out of
    /// retries. Only this step is re-run on retry.
    async fn run_step(
        &self,
        execution: &mut WorkflowExecution,
        definition: &StepDefinition,
        cancel: &CancellationToken,
    ) -> Result<(), Halt> {
        let name = definition.name();
        let order_id = execution.order_id().clone();
        let mut attempt = 1;

        loop {
            match self.attempt(execution, definition, attempt, cancel).await {
                StepOutcome::Success(detail) => {
                    if let Some(update) = definition.step().on_success(&detail) {
                        if let Err(err) = self.persist(&order_id, update).await {
                            let reason =
                                format!("{name} succeeded but the order update failed: {err}");
                            self.record(
                                execution,
                                WorkflowEvent::step_failed(name, reason.clone(), attempt),
                            )
                            .await;
                            return Err(Halt::new(reason));
                        }
                    }
                    self.record(
                        execution,
                        WorkflowEvent::step_succeeded(name, &detail, attempt),
                    )
                    .await;
                    tracing::info!(step = name, attempt, "step succeeded");
                    return Ok(());
                }
                StepOutcome::RetryableFailure(reason)
                    if self.retry.should_retry(execution.step_retry_count()) =>
                {
                    let delay = self.retry.delay_for(execution.step_retry_count());
                    let next_retry_at = Utc::now()
                        + chrono::Duration::from_std(delay)
                            .unwrap_or_else(|_| chrono::Duration::zero());

                    metrics::counter!("workflow_step_retries_total", "step" => name).increment(1);
                    tracing::warn!(
                        step = name,
                        attempt,
                        %reason,
                        delay_ms = delay.as_millis() as u64,
                        "step failed, retry scheduled"
                    );
                    self.record(
                        execution,
                        WorkflowEvent::retry_scheduled(name, reason, attempt, next_retry_at),
                    )
                    .await;

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            return Err(Halt::new(format!(
                                "cancelled while waiting to retry '{name}'"
                            )));
                        }
                    }

                    attempt += 1;
                    self.record(execution, WorkflowEvent::step_retrying(name, attempt))
                        .await;
                }
                StepOutcome::RetryableFailure(reason) => {
                    let reason = format!(
                        "{reason} (gave up after {} retries)",
                        execution.step_retry_count()
                    );
                    return self.give_up(execution, definition, reason, attempt).await;
                }
                StepOutcome::FatalFailure(reason) => {
                    return self.give_up(execution, definition, reason, attempt).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        execution: &WorkflowExecution,
        definition: &StepDefinition,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        // Fresh snapshot so the step sees edits made since the last attempt.
        let order = match self.orders.get_order(execution.order_id()).await {
            Ok(order) => order,
            Err(err) => return StepOutcome::classify(Err(err.into())),
        };

        let ctx = StepContext {
            execution_id: execution.id(),
            order: &order,
            results: execution.step_results(),
            attempt,
            deadline: self.executor.deadline(),
            cancel,
        };
        self.executor.execute(definition, &ctx).await
    }

    async fn give_up(
        &self,
        execution: &mut WorkflowExecution,
        definition: &StepDefinition,
        reason: String,
        attempt: u32,
    ) -> Result<(), Halt> {
        let name = definition.name();

        if definition.step().is_best_effort() {
            tracing::warn!(step = name, %reason, "best-effort step failed, continuing");
            self.record(execution, WorkflowEvent::step_degraded(name, reason, attempt))
                .await;
            return Ok(());
        }

        tracing::warn!(step = name, attempt, %reason, "step failed");
        let order_update = definition.step().on_failure(&reason);
        self.record(
            execution,
            WorkflowEvent::step_failed(name, reason.clone(), attempt),
        )
        .await;
        Err(Halt {
            reason,
            order_update,
        })
    }

    /// Compensates, restores the order and records the failure.
    async fn fail(&self, execution: &mut WorkflowExecution, halt: Halt, cancel: &CancellationToken) {
        self.compensate(execution, cancel).await;

        let mut update = OrderUpdate::new().attention_reason(Some(halt.reason.clone()));
        if let Some(prior) = execution.prior_order_status() {
            update = update.status(prior);
        }
        if let Some(extra) = halt.order_update {
            update = update.merge(extra);
        }

        let order_id = execution.order_id().clone();
        if let Err(err) = self.persist(&order_id, update).await {
            tracing::error!(%order_id, error = %err, "failed to flag order for attention");
        }

        self.record(execution, WorkflowEvent::failed(halt.reason.clone()))
            .await;
        metrics::counter!("workflow_failed_total").increment(1);
        tracing::warn!(
            step = execution.current_step(),
            reason = %halt.reason,
            "workflow failed"
        );
    }

    /// Undoes succeeded steps in reverse order. Failures are recorded and
    /// the remaining compensations still run.
    async fn compensate(&self, execution: &mut WorkflowExecution, cancel: &CancellationToken) {
        let pending: Vec<StepDefinition> = self
            .registry
            .steps()
            .iter()
            .rev()
            .filter(|d| d.step().compensates() && execution.has_succeeded(d.name()))
            .cloned()
            .collect();
        if pending.is_empty() {
            return;
        }

        let order_id = execution.order_id().clone();
        let order: Order = match self
            .with_store_retry(&order_id, "load order for compensation", || {
                self.orders.get_order(&order_id)
            })
            .await
        {
            Ok(order) => order,
            Err(err) => {
                for definition in &pending {
                    tracing::error!(step = definition.name(), error = %err, "compensation skipped");
                    self.record(
                        execution,
                        WorkflowEvent::compensation_failed(definition.name(), err.to_string()),
                    )
                    .await;
                }
                return;
            }
        };

        for definition in &pending {
            let result = {
                let ctx = StepContext {
                    execution_id: execution.id(),
                    order: &order,
                    results: execution.step_results(),
                    attempt: 1,
                    deadline: self.executor.deadline(),
                    cancel,
                };
                self.executor.compensate(definition, &ctx).await
            };

            match result {
                Ok(()) => {
                    tracing::info!(step = definition.name(), "step compensated");
                    self.record(
                        execution,
                        WorkflowEvent::compensation_completed(definition.name()),
                    )
                    .await;
                }
                Err(err) => {
                    tracing::error!(step = definition.name(), error = %err, "compensation failed");
                    self.record(
                        execution,
                        WorkflowEvent::compensation_failed(definition.name(), err.to_string()),
                    )
                    .await;
                }
            }
        }
    }

    /// Writes order fields, retrying transient store errors.
    async fn persist(&self, order_id: &OrderId, update: OrderUpdate) -> Result<Order, StepError> {
        tracing::debug!(%order_id, fields = ?update.field_names(), "persisting order fields");
        self.with_store_retry(order_id, "update order", || {
            self.orders.update_order_fields(order_id, update.clone())
        })
        .await
    }

    async fn with_store_retry<T, F, Fut>(
        &self,
        order_id: &OrderId,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, StepError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = order_store::Result<T>>,
    {
        let mut retries = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && self.retry.should_retry(retries) => {
                    let delay = self.retry.delay_for(retries);
                    retries += 1;
                    tracing::warn!(
                        %order_id,
                        operation,
                        retries,
                        error = %err,
                        "order store unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Applies `event` and stores the resulting snapshot.
    async fn record(&self, execution: &mut WorkflowExecution, event: WorkflowEvent) {
        execution.apply(event.clone());
        if let Err(err) = self.executions.save(execution, &event).await {
            tracing::warn!(
                execution_id = %execution.id(),
                event = event.event_type(),
                error = %err,
                "failed to persist workflow transition"
            );
        }
    }
}
