//! Host-side worker and execution-slot state
//!
//! The worker and its slots are owned by the host scheduler and mutated
//! concurrently with the recovery layer's reads. Every read here is a
//! best-effort snapshot; repeated reads may observe different values.

use crate::config::FleetConfig;
use fleet_queue_core::task::WorkItem;
use fleet_queue_core::types::{ExecutionResult, InterruptReason, OfflineCause};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Consistent point-in-time view of a worker's connection state.
///
/// Status and cause are captured under one lock so the classifier never
/// observes a torn pair mid-transition.
#[derive(Debug, Clone)]
pub struct WorkerSnapshot {
    pub offline: bool,
    pub offline_cause: Option<OfflineCause>,
}

/// One concurrent work-capacity unit on a worker
pub struct ExecutionSlot {
    worker_name: String,
    current: RwLock<Option<Arc<WorkItem>>>,
}

impl ExecutionSlot {
    pub fn new(worker_name: impl Into<String>) -> Self {
        Self {
            worker_name: worker_name.into(),
            current: RwLock::new(None),
        }
    }

    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    /// Work item currently bound to this slot, if any
    pub async fn current_work_item(&self) -> Option<Arc<WorkItem>> {
        self.current.read().await.clone()
    }

    /// Bind a work item to this slot
    pub async fn assign(&self, item: Arc<WorkItem>) {
        let mut current = self.current.write().await;
        debug!("Slot on {} assigned work item {}", self.worker_name, item.id());
        *current = Some(item);
    }

    /// Unbind the current work item once it is done
    pub async fn retire(&self) -> Option<Arc<WorkItem>> {
        self.current.write().await.take()
    }

    /// Request interruption of the current work item.
    ///
    /// Best-effort: the item is marked with `result` and `reason`. An item
    /// that already reached a terminal state is retired instead, leaving the
    /// slot idle for the next read.
    pub async fn interrupt(&self, result: ExecutionResult, reason: InterruptReason) {
        let mut current = self.current.write().await;
        if let Some(item) = current.as_ref() {
            if item.is_finished().await {
                *current = None;
            } else {
                item.abort(result, reason).await;
            }
        }
    }
}

#[derive(Debug, Clone)]
struct ConnState {
    offline: bool,
    offline_cause: Option<OfflineCause>,
}

/// A compute node in the fleet hosting execution slots
pub struct Worker {
    name: String,
    conn: RwLock<ConnState>,
    fleet: RwLock<Option<Arc<FleetConfig>>>,
    slots: RwLock<Vec<Arc<ExecutionSlot>>>,
}

impl Worker {
    /// Create a worker in the online state with no slots
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conn: RwLock::new(ConnState {
                offline: false,
                offline_cause: None,
            }),
            fleet: RwLock::new(None),
            slots: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capture connection status and offline cause atomically
    pub async fn snapshot(&self) -> WorkerSnapshot {
        let conn = self.conn.read().await;
        WorkerSnapshot {
            offline: conn.offline,
            offline_cause: conn.offline_cause.clone(),
        }
    }

    pub async fn is_offline(&self) -> bool {
        self.conn.read().await.offline
    }

    pub async fn offline_cause(&self) -> Option<OfflineCause> {
        self.conn.read().await.offline_cause.clone()
    }

    /// Transition to offline, recording the cause
    pub async fn mark_offline(&self, cause: OfflineCause) {
        let mut conn = self.conn.write().await;
        conn.offline = true;
        conn.offline_cause = Some(cause);
        info!("Worker {} went offline", self.name);
    }

    /// Transition back to online, clearing the recorded cause
    pub async fn mark_online(&self) {
        let mut conn = self.conn.write().await;
        conn.offline = false;
        conn.offline_cause = None;
    }

    /// Owning fleet configuration.
    ///
    /// Absent until the fleet manager finishes wiring the worker up; callers
    /// treat `None` as a transient state, not an error.
    pub async fn fleet_config(&self) -> Option<Arc<FleetConfig>> {
        self.fleet.read().await.clone()
    }

    pub async fn attach_fleet(&self, config: Arc<FleetConfig>) {
        *self.fleet.write().await = Some(config);
    }

    /// Add a slot and return it
    pub async fn add_slot(&self) -> Arc<ExecutionSlot> {
        let slot = Arc::new(ExecutionSlot::new(self.name.clone()));
        self.slots.write().await.push(slot.clone());
        slot
    }

    /// All execution slots currently bound to this worker
    pub async fn execution_slots(&self) -> Vec<Arc<ExecutionSlot>> {
        self.slots.read().await.clone()
    }
}
