//! Accepts workflow starts and runs them on background tasks.

use std::sync::{Arc, Mutex, PoisonError};

use common::{ExecutionId, OrderId};
use order_store::OrderStore;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::engine::WorkflowEngine;
use crate::error::{Result, WorkflowError};
use crate::execution::WorkflowExecution;
use crate::guard::{DispatchGuard, DispatchPermit};
use crate::store::ExecutionStore;

/// Returned when a start request is admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAck {
    pub execution_id: ExecutionId,
    pub order_id: OrderId,
}

/// An admitted execution on its way to a worker.
struct Job {
    execution: WorkflowExecution,
    permit: DispatchPermit,
    reply: Option<oneshot::Sender<WorkflowExecution>>,
}

/// Entry point for starting and observing workflows.
///
/// At most one execution per order is in flight. Starts return as soon as
/// the execution is admitted; the work runs on a task tracked by the
/// supervisor so [`WorkflowSupervisor::shutdown`] can drain it.
pub struct WorkflowSupervisor<S, E>
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    engine: Arc<WorkflowEngine<S, E>>,
    guard: DispatchGuard,
    jobs: mpsc::UnboundedSender<Job>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl<S, E> WorkflowSupervisor<S, E>
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    /// Creates a supervisor and spawns its dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(engine: WorkflowEngine<S, E>) -> Self {
        Self::with_guard(engine, DispatchGuard::new())
    }

    /// Creates a supervisor that admits through an existing guard.
    pub fn with_guard(engine: WorkflowEngine<S, E>, guard: DispatchGuard) -> Self {
        let engine = Arc::new(engine);
        let (jobs, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        let dispatcher = tokio::spawn(dispatch(
            engine.clone(),
            receiver,
            tracker.clone(),
            cancel.clone(),
        ));

        Self {
            engine,
            guard,
            jobs,
            cancel,
            tracker,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    pub fn engine(&self) -> &WorkflowEngine<S, E> {
        &self.engine
    }

    pub fn guard(&self) -> &DispatchGuard {
        &self.guard
    }

    /// Admits a workflow for `order_id` and returns without waiting for it.
    #[tracing::instrument(skip_all, fields(order_id = %order_id))]
    pub async fn start_workflow(&self, order_id: OrderId) -> Result<StartAck> {
        self.submit(order_id, None).await
    }

    /// Admits a workflow for `order_id` and waits for it to finish.
    #[tracing::instrument(skip_all, fields(order_id = %order_id))]
    pub async fn start_workflow_and_wait(&self, order_id: OrderId) -> Result<WorkflowExecution> {
        let (reply, finished) = oneshot::channel();
        self.submit(order_id.clone(), Some(reply)).await?;
        finished.await.map_err(|_| WorkflowError::WorkerLost(order_id))
    }

    async fn submit(
        &self,
        order_id: OrderId,
        reply: Option<oneshot::Sender<WorkflowExecution>>,
    ) -> Result<StartAck> {
        if order_id.is_blank() {
            return Err(WorkflowError::InvalidOrderId);
        }
        if self.cancel.is_cancelled() {
            return Err(WorkflowError::ShuttingDown);
        }

        let execution_id = ExecutionId::new();
        let permit = match self.guard.try_admit(&order_id, execution_id) {
            Ok(permit) => permit,
            Err(running) => {
                metrics::counter!("workflow_rejected_total").increment(1);
                tracing::info!(execution_id = %running, "workflow already in progress");
                return Err(WorkflowError::AlreadyRunning {
                    order_id,
                    execution_id: running,
                });
            }
        };

        // Admission and handoff run as one tracked task, so a caller that
        // stops waiting cannot strand a stored pending execution.
        let engine = self.engine.clone();
        let jobs = self.jobs.clone();
        let admitted_order = order_id.clone();
        let handoff = self.tracker.spawn(async move {
            let execution = engine.admit(admitted_order, execution_id).await;
            let job = Job {
                execution,
                permit,
                reply,
            };
            if let Err(mpsc::error::SendError(job)) = jobs.send(job) {
                // Dispatcher is gone; record the execution as failed and let
                // the permit go with the job.
                engine
                    .abandon(job.execution, "workflow supervisor is shutting down")
                    .await;
                return Err(WorkflowError::ShuttingDown);
            }
            Ok(())
        });

        match handoff.await {
            Ok(result) => result?,
            Err(err) => {
                tracing::error!(%execution_id, error = %err, "workflow admission task failed");
                return Err(WorkflowError::WorkerLost(order_id));
            }
        }

        tracing::info!(%execution_id, "workflow admitted");
        Ok(StartAck {
            execution_id,
            order_id,
        })
    }

    /// Latest execution for an order, running or finished.
    pub async fn status(&self, order_id: &OrderId) -> Result<WorkflowExecution> {
        self.engine
            .executions()
            .latest_for_order(order_id)
            .await?
            .ok_or_else(|| WorkflowError::ExecutionNotFound(order_id.clone()))
    }

    /// Every execution recorded for an order, oldest first.
    pub async fn history(&self, order_id: &OrderId) -> Result<Vec<WorkflowExecution>> {
        self.engine.executions().history(order_id).await
    }

    pub fn is_running(&self, order_id: &OrderId) -> bool {
        self.guard.is_active(order_id)
    }

    /// Number of executions in flight.
    pub fn active_count(&self) -> usize {
        self.guard.active_count()
    }

    /// Stops accepting work, cancels in-flight executions and waits for
    /// them to reach a terminal status.
    ///
    /// Cancelled executions fail and run their compensations.
    pub async fn shutdown(&self) {
        tracing::info!(in_flight = self.active_count(), "workflow supervisor shutting down");
        self.cancel.cancel();

        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(dispatcher) = dispatcher {
            if let Err(err) = dispatcher.await {
                tracing::error!(error = %err, "workflow dispatcher stopped abnormally");
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("workflow supervisor stopped");
    }
}

impl<S, E> Drop for WorkflowSupervisor<S, E>
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Hands admitted jobs to tracked worker tasks until cancelled.
async fn dispatch<S, E>(
    engine: Arc<WorkflowEngine<S, E>>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    tracker: TaskTracker,
    cancel: CancellationToken,
) where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = jobs.recv() => match job {
                Some(job) => {
                    tracker.spawn(work(engine.clone(), job, cancel.child_token()));
                }
                None => break,
            },
        }
    }

    // Jobs admitted before the cancel still get a terminal status.
    jobs.close();
    while let Ok(job) = jobs.try_recv() {
        tracker.spawn(work(engine.clone(), job, cancel.child_token()));
    }
}

async fn work<S, E>(engine: Arc<WorkflowEngine<S, E>>, job: Job, cancel: CancellationToken)
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    let Job {
        execution,
        permit,
        reply,
    } = job;

    let finished = engine.run(execution, &cancel).await;
    permit.release();

    if let Some(reply) = reply {
        // The caller may have stopped waiting.
        let _ = reply.send(finished);
    }
}
