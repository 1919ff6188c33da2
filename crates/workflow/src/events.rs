//! Workflow execution events.
//!
//! Every change to a [`WorkflowExecution`](crate::WorkflowExecution) is
//! expressed as one of these events, so an execution can be rebuilt by
//! replaying its event log.

use chrono::{DateTime, Utc};
use common::{ExecutionId, OrderId};
use domain::OrderStatus;
use serde::{Deserialize, Serialize};

use crate::step::StepDetail;

/// Events that can occur during a workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WorkflowEvent {
    /// The supervisor accepted the execution.
    Admitted(AdmittedData),

    /// The engine picked the execution up.
    Started(StartedData),

    /// A step began its first attempt.
    StepStarted(StepStartedData),

    /// A step attempt succeeded.
    StepSucceeded(StepSucceededData),

    /// A step attempt failed transiently and will be retried.
    StepRetryScheduled(RetryScheduledData),

    /// The backoff elapsed and the step is being attempted again.
    StepRetrying(StepAttemptData),

    /// A step failed and the workflow stops.
    StepFailed(StepFailureData),

    /// A best-effort step failed and the workflow moves on.
    StepDegraded(StepFailureData),

    /// A step's side effects were undone.
    CompensationCompleted(CompensationData),

    /// Undoing a step's side effects failed (logged, compensation continues).
    CompensationFailed(CompensationData),

    /// Every step finished.
    Completed(CompletedData),

    /// The workflow stopped without finishing.
    Failed(FailedData),
}

impl WorkflowEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::Admitted(_) => "Admitted",
            WorkflowEvent::Started(_) => "Started",
            WorkflowEvent::StepStarted(_) => "StepStarted",
            WorkflowEvent::StepSucceeded(_) => "StepSucceeded",
            WorkflowEvent::StepRetryScheduled(_) => "StepRetryScheduled",
            WorkflowEvent::StepRetrying(_) => "StepRetrying",
            WorkflowEvent::StepFailed(_) => "StepFailed",
            WorkflowEvent::StepDegraded(_) => "StepDegraded",
            WorkflowEvent::CompensationCompleted(_) => "CompensationCompleted",
            WorkflowEvent::CompensationFailed(_) => "CompensationFailed",
            WorkflowEvent::Completed(_) => "Completed",
            WorkflowEvent::Failed(_) => "Failed",
        }
    }

    /// Returns true for the events that end an execution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowEvent::Completed(_) | WorkflowEvent::Failed(_))
    }
}

/// Data for the Admitted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmittedData {
    pub execution_id: ExecutionId,
    pub order_id: OrderId,
    /// The workflow type (e.g. "fulfill_order").
    pub workflow_type: String,
    /// Name of the first registered step.
    pub first_step: String,
    pub admitted_at: DateTime<Utc>,
}

/// Data for the Started event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedData {
    /// Order status before the workflow moved it to processing, if it did.
    pub prior_order_status: Option<OrderStatus>,
    pub started_at: DateTime<Utc>,
}

/// Data for the StepStarted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStartedData {
    pub step_name: String,
    /// Position of the step in the registry.
    pub step_index: usize,
}

/// Data for the StepSucceeded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSucceededData {
    pub step_name: String,
    pub summary: String,
    /// Identifier produced by the step (reservation, transaction).
    pub reference: Option<String>,
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

/// Data for the StepRetryScheduled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryScheduledData {
    pub step_name: String,
    pub reason: String,
    /// The attempt that failed.
    pub attempt: u32,
    pub next_retry_at: DateTime<Utc>,
    pub at: DateTime<Utc>,
}

/// Data for the StepRetrying event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepAttemptData {
    pub step_name: String,
    pub attempt: u32,
}

/// Data for the StepFailed and StepDegraded events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailureData {
    pub step_name: String,
    pub error: String,
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

/// Data for compensation events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationData {
    pub step_name: String,
    /// Set when the compensation failed.
    pub error: Option<String>,
}

/// Data for the Completed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedData {
    pub completed_at: DateTime<Utc>,
}

/// Data for the Failed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl WorkflowEvent {
    pub fn admitted(
        execution_id: ExecutionId,
        order_id: OrderId,
        workflow_type: impl Into<String>,
        first_step: impl Into<String>,
    ) -> Self {
        WorkflowEvent::Admitted(AdmittedData {
            execution_id,
            order_id,
            workflow_type: workflow_type.into(),
            first_step: first_step.into(),
            admitted_at: Utc::now(),
        })
    }

    pub fn started(prior_order_status: Option<OrderStatus>) -> Self {
        WorkflowEvent::Started(StartedData {
            prior_order_status,
            started_at: Utc::now(),
        })
    }

    pub fn step_started(step_name: impl Into<String>, step_index: usize) -> Self {
        WorkflowEvent::StepStarted(StepStartedData {
            step_name: step_name.into(),
            step_index,
        })
    }

    pub fn step_succeeded(step_name: impl Into<String>, detail: &StepDetail, attempt: u32) -> Self {
        WorkflowEvent::StepSucceeded(StepSucceededData {
            step_name: step_name.into(),
            summary: detail.summary.clone(),
            reference: detail.reference.clone(),
            attempt,
            at: Utc::now(),
        })
    }

    pub fn retry_scheduled(
        step_name: impl Into<String>,
        reason: impl Into<String>,
        attempt: u32,
        next_retry_at: DateTime<Utc>,
    ) -> Self {
        WorkflowEvent::StepRetryScheduled(RetryScheduledData {
            step_name: step_name.into(),
            reason: reason.into(),
            attempt,
            next_retry_at,
            at: Utc::now(),
        })
    }

    pub fn step_retrying(step_name: impl Into<String>, attempt: u32) -> Self {
        WorkflowEvent::StepRetrying(StepAttemptData {
            step_name: step_name.into(),
            attempt,
        })
    }

    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>, attempt: u32) -> Self {
        WorkflowEvent::StepFailed(StepFailureData {
            step_name: step_name.into(),
            error: error.into(),
            attempt,
            at: Utc::now(),
        })
    }

    pub fn step_degraded(
        step_name: impl Into<String>,
        error: impl Into<String>,
        attempt: u32,
    ) -> Self {
        WorkflowEvent::StepDegraded(StepFailureData {
            step_name: step_name.into(),
            error: error.into(),
            attempt,
            at: Utc::now(),
        })
    }

    pub fn compensation_completed(step_name: impl Into<String>) -> Self {
        WorkflowEvent::CompensationCompleted(CompensationData {
            step_name: step_name.into(),
            error: None,
        })
    }

    pub fn compensation_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        WorkflowEvent::CompensationFailed(CompensationData {
            step_name: step_name.into(),
            error: Some(error.into()),
        })
    }

    pub fn completed() -> Self {
        WorkflowEvent::Completed(CompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        WorkflowEvent::Failed(FailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        assert_eq!(WorkflowEvent::started(None).event_type(), "Started");
        assert_eq!(
            WorkflowEvent::step_started("validate_order", 0).event_type(),
            "StepStarted"
        );
        assert_eq!(WorkflowEvent::failed("boom").event_type(), "Failed");
        assert!(WorkflowEvent::completed().is_terminal());
        assert!(!WorkflowEvent::step_retrying("x", 2).is_terminal());
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = WorkflowEvent::step_failed("process_payment", "Payment declined: nope", 1);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StepFailed");
        assert_eq!(json["data"]["step_name"], "process_payment");

        let back: WorkflowEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
