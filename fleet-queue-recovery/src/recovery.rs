//! Automatic resubmission of work lost to unexpected worker termination

use crate::classifier;
use crate::queue::JobQueue;
use crate::worker::{ExecutionSlot, Worker};
use async_trait::async_trait;
use fleet_queue_core::error::{RecoveryError, Result};
use fleet_queue_core::listener::TaskListener;
use fleet_queue_core::types::{ExecutionResult, InterruptReason, TriggerCause};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Quiet period applied when an aborted task is rescheduled. Gives the fleet
/// time to tear down the dead worker and replace lost capacity before the
/// task becomes eligible again.
pub const RESUBMIT_QUIET_PERIOD: Duration = Duration::from_secs(10);

/// Disconnect-time behavior in the host's notification chain
#[async_trait]
pub trait DisconnectHandler: Send + Sync {
    /// Invoked by the worker-lifecycle manager once a worker's channel is
    /// confirmed dead. `worker` can be absent when the host notifies with
    /// incomplete state.
    async fn after_disconnect(&self, worker: Option<Arc<Worker>>, listener: &TaskListener);
}

/// Wraps an underlying [`DisconnectHandler`] and resubmits work aborted by
/// an unexpected worker termination.
///
/// When the wrapped worker goes offline because its channel terminated
/// abnormally, every in-flight work item on the worker is interrupted with
/// an aborted result and its task is put back on the queue with a quiet
/// period, so another worker picks it up without operator involvement.
/// Disconnects with any other cause pass through untouched. The underlying
/// handler runs in every case.
///
/// The host serializes disconnect notifications per worker. If that
/// guarantee is violated the same work can be resubmitted twice; hosts that
/// need a stronger guarantee should deduplicate on worker identity plus
/// disconnect time.
pub struct AutoResubmitHandler {
    delegate: Arc<dyn DisconnectHandler>,
    queue: Arc<JobQueue>,
}

impl AutoResubmitHandler {
    /// Wrap `delegate`, resubmitting through `queue`
    pub fn new(delegate: Arc<dyn DisconnectHandler>, queue: Arc<JobQueue>) -> Self {
        Self { delegate, queue }
    }

    /// Evaluate the guards and run the resubmission pass if they all pass.
    ///
    /// The only error is the transient unresolved-fleet state; suppression
    /// branches are ordinary no-ops.
    async fn try_recover(&self, worker: &Worker) -> Result<()> {
        let fleet = worker
            .fleet_config()
            .await
            .ok_or_else(|| RecoveryError::FleetUnresolved(worker.name().to_string()))?;

        let snapshot = worker.snapshot().await;
        if fleet.resubmit_disabled() || !classifier::is_unexpected(&snapshot) {
            info!(
                "No resubmission for {}: disable_resubmit={}, offline={}, cause={}",
                worker.name(),
                fleet.resubmit_disabled(),
                snapshot.offline,
                snapshot
                    .offline_cause
                    .as_ref()
                    .map(|c| c.label())
                    .unwrap_or("none")
            );
            return Ok(());
        }

        self.resubmit_slots(worker).await;
        Ok(())
    }

    async fn resubmit_slots(&self, worker: &Worker) {
        info!("Unexpected {} termination, resubmit", worker.name());

        for slot in worker.execution_slots().await {
            // One slot failing must not starve the rest of the pass.
            if let Err(e) = self.recover_slot(worker, &slot).await {
                warn!("Recovery of a slot on {} failed: {}", worker.name(), e);
            }
        }

        info!("Unexpected {} termination, resubmit finished", worker.name());
    }

    async fn recover_slot(&self, worker: &Worker, slot: &ExecutionSlot) -> Result<()> {
        if slot.current_work_item().await.is_none() {
            return Ok(());
        }

        slot.interrupt(
            ExecutionResult::Aborted,
            InterruptReason::WorkerLost {
                worker: worker.name().to_string(),
            },
        )
        .await;

        // Interruption is best-effort: the slot may already have retired by
        // the time we look again, in which case the item is taken care of.
        let item = match slot.current_work_item().await {
            Some(item) => item,
            None => return Ok(()),
        };

        let task = item.parent().owner_task().ok_or_else(|| {
            RecoveryError::TaskResolution(format!("owner of work item {} is gone", item.id()))
        })?;
        let actions = item.actions();

        if let Some(project) = task.as_project() {
            project
                .schedule_build(RESUBMIT_QUIET_PERIOD, TriggerCause::User, actions.clone())
                .await?;
        } else {
            self.queue
                .schedule(
                    task.clone(),
                    RESUBMIT_QUIET_PERIOD,
                    TriggerCause::User,
                    actions.clone(),
                )
                .await?;
        }

        let action_names: Vec<&str> = actions.iter().map(|a| a.name.as_str()).collect();
        info!(
            "Unexpected {} termination, resubmit {} with actions {:?}",
            worker.name(),
            task.name(),
            action_names
        );
        Ok(())
    }
}

#[async_trait]
impl DisconnectHandler for AutoResubmitHandler {
    async fn after_disconnect(&self, worker: Option<Arc<Worker>>, listener: &TaskListener) {
        // The host can notify with incomplete state in documented edge
        // cases; nothing to recover then.
        if let Some(worker) = worker.as_ref() {
            if let Err(e) = self.try_recover(worker).await {
                // Transient initialization race, the fleet reference shows
                // up shortly after the worker does.
                warn!("Skipping resubmission: {}; should self-resolve shortly", e);
            }
        }

        self.delegate.after_disconnect(worker, listener).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FleetConfig;
    use fleet_queue_core::action::Action;
    use fleet_queue_core::task::{ProjectTask, QueueTask, SubTask, WorkItem};
    use fleet_queue_core::types::OfflineCause;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct CountingDelegate {
        calls: AtomicUsize,
    }

    impl CountingDelegate {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DisconnectHandler for CountingDelegate {
        async fn after_disconnect(&self, _worker: Option<Arc<Worker>>, _listener: &TaskListener) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct GenericTask {
        id: Uuid,
        name: String,
    }

    impl QueueTask for GenericTask {
        fn id(&self) -> Uuid {
            self.id
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct ProjectJob {
        id: Uuid,
        name: String,
        builds: Mutex<Vec<(Duration, TriggerCause, Vec<Action>)>>,
    }

    impl ProjectJob {
        fn new(name: &str) -> Self {
            Self {
                id: Uuid::new_v4(),
                name: name.to_string(),
                builds: Mutex::new(Vec::new()),
            }
        }
    }

    impl QueueTask for ProjectJob {
        fn id(&self) -> Uuid {
            self.id
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn as_project(&self) -> Option<&dyn ProjectTask> {
            Some(self)
        }
    }

    #[async_trait]
    impl ProjectTask for ProjectJob {
        async fn schedule_build(
            &self,
            quiet_period: Duration,
            cause: TriggerCause,
            actions: Vec<Action>,
        ) -> Result<()> {
            self.builds
                .lock()
                .unwrap()
                .push((quiet_period, cause, actions));
            Ok(())
        }
    }

    fn generic_task(name: &str) -> Arc<dyn QueueTask> {
        Arc::new(GenericTask {
            id: Uuid::new_v4(),
            name: name.to_string(),
        })
    }

    fn channel_termination() -> OfflineCause {
        OfflineCause::ChannelTermination {
            detail: "connection reset by peer".to_string(),
        }
    }

    async fn lost_worker(fleet: FleetConfig) -> Arc<Worker> {
        let worker = Arc::new(Worker::new("w1"));
        worker.attach_fleet(Arc::new(fleet)).await;
        worker.mark_offline(channel_termination()).await;
        worker
    }

    async fn run_item(worker: &Worker, task: &Arc<dyn QueueTask>, actions: Vec<Action>) -> Arc<WorkItem> {
        let slot = worker.add_slot().await;
        let item = Arc::new(WorkItem::with_annotations(SubTask::new(task), actions));
        slot.assign(item.clone()).await;
        item
    }

    #[tokio::test]
    async fn test_absent_worker_only_delegates() {
        let delegate = CountingDelegate::new();
        let queue = Arc::new(JobQueue::new());
        let handler = AutoResubmitHandler::new(delegate.clone(), queue.clone());

        handler.after_disconnect(None, &TaskListener::default()).await;

        assert_eq!(delegate.calls(), 1);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_unresolved_fleet_skips_and_delegates() {
        let delegate = CountingDelegate::new();
        let queue = Arc::new(JobQueue::new());
        let handler = AutoResubmitHandler::new(delegate.clone(), queue.clone());

        let worker = Arc::new(Worker::new("w3"));
        worker.mark_offline(channel_termination()).await;
        let task = generic_task("t1");
        let item = run_item(&worker, &task, Vec::new()).await;

        handler
            .after_disconnect(Some(worker), &TaskListener::default())
            .await;

        assert_eq!(delegate.calls(), 1);
        assert!(queue.is_empty().await);
        assert!(item.result().await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_fleet_suppresses_resubmission() {
        let delegate = CountingDelegate::new();
        let queue = Arc::new(JobQueue::new());
        let handler = AutoResubmitHandler::new(delegate.clone(), queue.clone());

        let mut fleet = FleetConfig::default();
        fleet.recovery.disable_resubmit = true;
        let worker = lost_worker(fleet).await;
        let task = generic_task("t1");
        let item = run_item(&worker, &task, Vec::new()).await;

        handler
            .after_disconnect(Some(worker), &TaskListener::default())
            .await;

        assert_eq!(delegate.calls(), 1);
        assert!(queue.is_empty().await);
        assert!(item.result().await.is_none());
    }

    #[tokio::test]
    async fn test_expected_cause_suppresses_resubmission() {
        let delegate = CountingDelegate::new();
        let queue = Arc::new(JobQueue::new());
        let handler = AutoResubmitHandler::new(delegate.clone(), queue.clone());

        let worker = Arc::new(Worker::new("w2"));
        worker.attach_fleet(Arc::new(FleetConfig::default())).await;
        worker.mark_offline(OfflineCause::ManualDisconnect).await;
        let task = generic_task("t1");
        let item = run_item(&worker, &task, Vec::new()).await;

        handler
            .after_disconnect(Some(worker), &TaskListener::default())
            .await;

        assert_eq!(delegate.calls(), 1);
        assert!(queue.is_empty().await);
        assert!(item.result().await.is_none());
    }

    #[tokio::test]
    async fn test_generic_task_resubmitted_through_queue() {
        let delegate = CountingDelegate::new();
        let queue = Arc::new(JobQueue::new());
        let handler = AutoResubmitHandler::new(delegate.clone(), queue.clone());

        let worker = lost_worker(FleetConfig::default()).await;
        let task = generic_task("t1");
        let actions = vec![Action::new("a1", json!({"k": "v"}))];
        let item = run_item(&worker, &task, actions.clone()).await;

        let before = chrono::Utc::now();
        handler
            .after_disconnect(Some(worker), &TaskListener::default())
            .await;

        assert_eq!(delegate.calls(), 1);
        assert_eq!(item.result().await, Some(ExecutionResult::Aborted));
        assert!(matches!(
            item.interrupt_reason().await,
            Some(InterruptReason::WorkerLost { ref worker }) if worker == "w1"
        ));

        let pending = queue.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].task.name(), "t1");
        assert_eq!(pending[0].cause, TriggerCause::User);
        assert_eq!(pending[0].actions, actions);

        let delay = pending[0].eligible_at - before;
        assert!(delay >= chrono::Duration::seconds(10));
        assert!(delay <= chrono::Duration::seconds(11));
    }

    #[tokio::test]
    async fn test_project_task_uses_native_reschedule() {
        let delegate = CountingDelegate::new();
        let queue = Arc::new(JobQueue::new());
        let handler = AutoResubmitHandler::new(delegate.clone(), queue.clone());

        let worker = lost_worker(FleetConfig::default()).await;
        let project = Arc::new(ProjectJob::new("p1"));
        let task: Arc<dyn QueueTask> = project.clone();
        let actions = vec![Action::new("a1", json!(null))];
        run_item(&worker, &task, actions.clone()).await;

        handler
            .after_disconnect(Some(worker), &TaskListener::default())
            .await;

        // Native path only, never the generic queue fallback.
        assert!(queue.is_empty().await);
        let builds = project.builds.lock().unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].0, RESUBMIT_QUIET_PERIOD);
        assert_eq!(builds[0].1, TriggerCause::User);
        assert_eq!(builds[0].2, actions);
    }

    #[tokio::test]
    async fn test_idle_slots_untouched() {
        let delegate = CountingDelegate::new();
        let queue = Arc::new(JobQueue::new());
        let handler = AutoResubmitHandler::new(delegate.clone(), queue.clone());

        let worker = lost_worker(FleetConfig::default()).await;
        let task = generic_task("t1");
        let active_a = run_item(&worker, &task, Vec::new()).await;
        let active_b = run_item(&worker, &task, Vec::new()).await;
        let idle = worker.add_slot().await;

        handler
            .after_disconnect(Some(worker), &TaskListener::default())
            .await;

        assert_eq!(active_a.result().await, Some(ExecutionResult::Aborted));
        assert_eq!(active_b.result().await, Some(ExecutionResult::Aborted));
        assert!(idle.current_work_item().await.is_none());
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn test_dead_owner_contained_to_its_slot() {
        let delegate = CountingDelegate::new();
        let queue = Arc::new(JobQueue::new());
        let handler = AutoResubmitHandler::new(delegate.clone(), queue.clone());

        let worker = lost_worker(FleetConfig::default()).await;

        let orphaned = generic_task("gone");
        run_item(&worker, &orphaned, Vec::new()).await;
        drop(orphaned);

        let task = generic_task("t2");
        run_item(&worker, &task, Vec::new()).await;

        handler
            .after_disconnect(Some(worker), &TaskListener::default())
            .await;

        // The orphaned slot fails resolution; the other slot still makes it.
        let pending = queue.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].task.name(), "t2");
        assert_eq!(delegate.calls(), 1);
    }

    #[tokio::test]
    async fn test_queue_failure_contained_to_its_slot() {
        let delegate = CountingDelegate::new();
        let queue = Arc::new(JobQueue::with_capacity(1));
        let handler = AutoResubmitHandler::new(delegate.clone(), queue.clone());

        let worker = lost_worker(FleetConfig::default()).await;
        let task_a = generic_task("t1");
        run_item(&worker, &task_a, Vec::new()).await;
        let task_b = generic_task("t2");
        let item_b = run_item(&worker, &task_b, Vec::new()).await;

        handler
            .after_disconnect(Some(worker), &TaskListener::default())
            .await;

        // Second resubmission hits the capacity bound; the pass still
        // finishes and the delegate still runs.
        assert_eq!(queue.len().await, 1);
        assert_eq!(item_b.result().await, Some(ExecutionResult::Aborted));
        assert_eq!(delegate.calls(), 1);
    }
}
