//! Workflow execution record.

use chrono::{DateTime, Utc};
use common::{ExecutionId, OrderId};
use domain::OrderStatus;
use serde::{Deserialize, Serialize};

use crate::events::WorkflowEvent;
use crate::state::WorkflowStatus;

/// How a step attempt ended, as recorded in the execution history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResultKind {
    Succeeded,
    /// Failed transiently; another attempt was scheduled.
    Retried,
    Failed,
    /// A best-effort step failed and the workflow continued.
    Degraded,
}

/// One entry of the step history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub outcome: StepResultKind,
    /// Summary on success, error text otherwise.
    pub detail: String,
    /// Identifier produced by a successful step.
    pub reference: Option<String>,
    pub attempt: u32,
    pub recorded_at: DateTime<Utc>,
}

/// One run of a workflow against one order.
///
/// The record is only ever changed through [`WorkflowExecution::apply`],
/// so replaying an execution's events rebuilds it exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    id: ExecutionId,
    order_id: OrderId,
    workflow_type: String,
    status: WorkflowStatus,
    current_step: String,
    current_step_index: usize,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    /// Retries across all steps of this execution.
    retry_count: u32,
    /// Retries of the current step.
    step_retry_count: u32,
    next_retry_at: Option<DateTime<Utc>>,
    prior_order_status: Option<OrderStatus>,
    step_results: Vec<StepResult>,
    compensated_steps: Vec<String>,
    /// Number of events applied.
    version: u64,
}

impl WorkflowExecution {
    /// Applies an event to the execution.
    pub fn apply(&mut self, event: WorkflowEvent) {
        self.version += 1;
        match event {
            WorkflowEvent::Admitted(data) => {
                self.id = data.execution_id;
                self.order_id = data.order_id;
                self.workflow_type = data.workflow_type;
                self.current_step = data.first_step;
                self.current_step_index = 0;
                self.started_at = data.admitted_at;
                self.status = WorkflowStatus::Pending;
            }
            WorkflowEvent::Started(data) => {
                self.status = WorkflowStatus::Running;
                self.started_at = data.started_at;
                self.prior_order_status = data.prior_order_status;
            }
            WorkflowEvent::StepStarted(data) => {
                self.current_step = data.step_name;
                self.current_step_index = data.step_index;
                self.step_retry_count = 0;
                self.status = WorkflowStatus::Running;
            }
            WorkflowEvent::StepSucceeded(data) => {
                self.step_results.push(StepResult {
                    step: data.step_name,
                    outcome: StepResultKind::Succeeded,
                    detail: data.summary,
                    reference: data.reference,
                    attempt: data.attempt,
                    recorded_at: data.at,
                });
            }
            WorkflowEvent::StepRetryScheduled(data) => {
                self.step_results.push(StepResult {
                    step: data.step_name,
                    outcome: StepResultKind::Retried,
                    detail: data.reason,
                    reference: None,
                    attempt: data.attempt,
                    recorded_at: data.at,
                });
                self.retry_count += 1;
                self.step_retry_count += 1;
                self.next_retry_at = Some(data.next_retry_at);
                self.status = WorkflowStatus::Retrying;
            }
            WorkflowEvent::StepRetrying(_) => {
                self.next_retry_at = None;
                self.status = WorkflowStatus::Running;
            }
            WorkflowEvent::StepFailed(data) => {
                self.push_failure(data.step_name, data.error, data.attempt, data.at, false);
            }
            WorkflowEvent::StepDegraded(data) => {
                self.push_failure(data.step_name, data.error, data.attempt, data.at, true);
            }
            WorkflowEvent::CompensationCompleted(data) => {
                self.compensated_steps.push(data.step_name);
            }
            WorkflowEvent::CompensationFailed(_) => {
                // Logged by the engine; the order carries the attention flag
            }
            WorkflowEvent::Completed(data) => {
                self.status = WorkflowStatus::Completed;
                self.completed_at = Some(data.completed_at);
                self.next_retry_at = None;
            }
            WorkflowEvent::Failed(data) => {
                self.status = WorkflowStatus::Failed;
                self.error_message = Some(data.reason);
                self.completed_at = Some(data.failed_at);
                self.next_retry_at = None;
            }
        }
    }

    fn push_failure(
        &mut self,
        step: String,
        error: String,
        attempt: u32,
        at: DateTime<Utc>,
        degraded: bool,
    ) {
        let outcome = if degraded {
            StepResultKind::Degraded
        } else {
            StepResultKind::Failed
        };
        self.step_results.push(StepResult {
            step,
            outcome,
            detail: error,
            reference: None,
            attempt,
            recorded_at: at,
        });
    }

    /// Rebuilds an execution from its event log.
    pub fn replay(events: impl IntoIterator<Item = WorkflowEvent>) -> Self {
        let mut execution = Self::default();
        for event in events {
            execution.apply(event);
        }
        execution
    }
}

// Query methods
impl WorkflowExecution {
    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn workflow_type(&self) -> &str {
        &self.workflow_type
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Name of the step being run, or the last one run.
    pub fn current_step(&self) -> &str {
        &self.current_step
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Set only when the execution failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn step_retry_count(&self) -> u32 {
        self.step_retry_count
    }

    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.next_retry_at
    }

    pub fn prior_order_status(&self) -> Option<OrderStatus> {
        self.prior_order_status
    }

    pub fn step_results(&self) -> &[StepResult] {
        &self.step_results
    }

    /// Steps whose side effects were undone, in compensation order.
    pub fn compensated_steps(&self) -> &[String] {
        &self.compensated_steps
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if `step` has a success entry.
    pub fn has_succeeded(&self, step: &str) -> bool {
        self.step_results
            .iter()
            .any(|r| r.step == step && r.outcome == StepResultKind::Succeeded)
    }

    /// Names of the steps that succeeded, in execution order.
    pub fn succeeded_steps(&self) -> Vec<&str> {
        self.step_results
            .iter()
            .filter(|r| r.outcome == StepResultKind::Succeeded)
            .map(|r| r.step.as_str())
            .collect()
    }

    /// Number of history entries with the given outcome.
    pub fn count_outcome(&self, outcome: StepResultKind) -> usize {
        self.step_results
            .iter()
            .filter(|r| r.outcome == outcome)
            .count()
    }
}
