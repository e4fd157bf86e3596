//! Task, sub-task and work-item model

use crate::action::Action;
use crate::error::Result;
use crate::types::{ExecutionResult, InterruptReason, TriggerCause};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A schedulable unit owning one or more work items.
///
/// Implementations live in the host; the recovery layer only needs the
/// identity and the optional native-reschedule capability.
pub trait QueueTask: Send + Sync {
    /// Unique task identifier
    fn id(&self) -> Uuid;

    /// Human-readable task name
    fn name(&self) -> &str;

    /// Capability probe for the native reschedule entry point.
    ///
    /// Tasks that manage their own build scheduling return `Some`; everything
    /// else is resubmitted through the generic queue path.
    fn as_project(&self) -> Option<&dyn ProjectTask> {
        None
    }
}

/// Tasks that carry their own reschedule entry point
#[async_trait]
pub trait ProjectTask: QueueTask {
    /// Schedule a new build of this task after `quiet_period`, attributed to
    /// `cause` and carrying `actions` forward.
    async fn schedule_build(
        &self,
        quiet_period: Duration,
        cause: TriggerCause,
        actions: Vec<Action>,
    ) -> Result<()>;
}

/// The fragment of a task a single work item executes.
///
/// The owner is held weakly: a task may be deleted while its work is still
/// in flight, in which case resolution fails for that item only.
#[derive(Clone)]
pub struct SubTask {
    owner: Weak<dyn QueueTask>,
}

impl SubTask {
    /// Create a sub-task owned by `owner`
    pub fn new(owner: &Arc<dyn QueueTask>) -> Self {
        Self {
            owner: Arc::downgrade(owner),
        }
    }

    /// Owning task, if it still exists
    pub fn owner_task(&self) -> Option<Arc<dyn QueueTask>> {
        self.owner.upgrade()
    }
}

#[derive(Debug, Clone, Default)]
struct ItemState {
    result: Option<ExecutionResult>,
    interrupt_reason: Option<InterruptReason>,
}

/// The minimal running unit of a scheduled task
pub struct WorkItem {
    id: Uuid,
    started_at: DateTime<Utc>,
    parent: SubTask,
    annotations: Option<Vec<Action>>,
    state: RwLock<ItemState>,
}

impl WorkItem {
    /// Create a work item that does not support annotations
    pub fn new(parent: SubTask) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            parent,
            annotations: None,
            state: RwLock::new(ItemState::default()),
        }
    }

    /// Create a work item carrying annotations
    pub fn with_annotations(parent: SubTask, actions: Vec<Action>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            parent,
            annotations: Some(actions),
            state: RwLock::new(ItemState::default()),
        }
    }

    /// Unique work-item identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When this item started executing
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Owning sub-task
    pub fn parent(&self) -> &SubTask {
        &self.parent
    }

    /// Annotations if the item supports them, empty otherwise
    pub fn actions(&self) -> Vec<Action> {
        self.annotations.clone().unwrap_or_default()
    }

    /// Record a terminal result on normal completion
    pub async fn mark_finished(&self, result: ExecutionResult) {
        let mut state = self.state.write().await;
        if state.result.is_none() {
            state.result = Some(result);
        }
    }

    /// Abort the item with a typed reason. A result recorded earlier wins.
    pub async fn abort(&self, result: ExecutionResult, reason: InterruptReason) {
        let mut state = self.state.write().await;
        if state.result.is_none() {
            state.result = Some(result);
            state.interrupt_reason = Some(reason);
        }
    }

    /// Terminal result, if the item has one
    pub async fn result(&self) -> Option<ExecutionResult> {
        self.state.read().await.result
    }

    /// Interrupt reason, if the item was aborted
    pub async fn interrupt_reason(&self) -> Option<InterruptReason> {
        self.state.read().await.interrupt_reason.clone()
    }

    /// Check if the item reached a terminal state
    pub async fn is_finished(&self) -> bool {
        self.state.read().await.result.is_some()
    }
}
