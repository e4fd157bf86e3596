//! In-memory job queue with delayed eligibility

use chrono::{DateTime, Utc};
use fleet_queue_core::action::Action;
use fleet_queue_core::error::{RecoveryError, Result};
use fleet_queue_core::task::QueueTask;
use fleet_queue_core::types::TriggerCause;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// A queue entry awaiting its eligibility instant
#[derive(Clone)]
pub struct ScheduledEntry {
    pub id: Uuid,
    pub task: Arc<dyn QueueTask>,
    pub eligible_at: DateTime<Utc>,
    pub cause: TriggerCause,
    pub actions: Vec<Action>,
}

/// Central job queue.
///
/// Entries become eligible for claiming once their quiet period elapses;
/// until then the scheduler skips them.
pub struct JobQueue {
    entries: RwLock<Vec<ScheduledEntry>>,
    capacity: Option<usize>,
}

impl JobQueue {
    /// Create an unbounded queue
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            capacity: None,
        }
    }

    /// Create a queue that rejects entries beyond `capacity`
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            capacity: Some(capacity),
        }
    }

    /// Schedule `task` to become eligible after `quiet_period`
    pub async fn schedule(
        &self,
        task: Arc<dyn QueueTask>,
        quiet_period: Duration,
        cause: TriggerCause,
        actions: Vec<Action>,
    ) -> Result<Uuid> {
        let mut entries = self.entries.write().await;
        if let Some(capacity) = self.capacity {
            if entries.len() >= capacity {
                return Err(RecoveryError::QueueFull(entries.len()));
            }
        }

        let entry = ScheduledEntry {
            id: Uuid::new_v4(),
            task: task.clone(),
            eligible_at: Utc::now() + chrono::Duration::seconds(quiet_period.as_secs() as i64),
            cause,
            actions,
        };
        let id = entry.id;
        entries.push(entry);

        info!(
            "Scheduled task {} (quiet period {}s)",
            task.name(),
            quiet_period.as_secs()
        );
        Ok(id)
    }

    /// Drain entries whose quiet period has elapsed, in schedule order
    pub async fn due(&self, now: DateTime<Utc>) -> Vec<ScheduledEntry> {
        let mut entries = self.entries.write().await;
        let (ready, waiting): (Vec<_>, Vec<_>) =
            entries.drain(..).partition(|e| e.eligible_at <= now);
        *entries = waiting;
        ready
    }

    /// Snapshot of all pending entries
    pub async fn pending(&self) -> Vec<ScheduledEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
