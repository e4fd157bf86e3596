//! Common types used throughout the recovery layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a worker went offline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfflineCause {
    /// Connection channel terminated abnormally, the worker was lost
    /// mid-flight (instance terminated, preempted, or network severed)
    ChannelTermination {
        /// Transport-level detail reported by the channel
        detail: String,
    },
    /// An operator took the worker offline
    ManualDisconnect,
    /// Worker was disconnected after sitting idle
    IdleTimeout,
    /// Planned capacity reduction
    ScaleDown,
    /// Worker taken down for maintenance
    MaintenanceWindow,
    /// Cause was not reported
    Unknown,
}

impl OfflineCause {
    /// Short label for log records
    pub fn label(&self) -> &'static str {
        match self {
            Self::ChannelTermination { .. } => "channel_termination",
            Self::ManualDisconnect => "manual_disconnect",
            Self::IdleTimeout => "idle_timeout",
            Self::ScaleDown => "scale_down",
            Self::MaintenanceWindow => "maintenance_window",
            Self::Unknown => "unknown",
        }
    }

    /// Check if this is the abnormal channel-termination variant
    pub fn is_channel_termination(&self) -> bool {
        matches!(self, Self::ChannelTermination { .. })
    }
}

/// Terminal result applied to a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionResult {
    /// Work item finished successfully
    Success,
    /// Work item finished with an error
    Failure,
    /// Work item was aborted before completion
    Aborted,
}

/// Typed reason attached to an interrupted work item.
///
/// Downstream observers use this to tell "aborted because the worker died"
/// apart from other abort reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptReason {
    /// The worker executing the item disappeared unexpectedly
    WorkerLost {
        /// Display name of the lost worker
        worker: String,
    },
    /// An operator cancelled the item
    Cancelled,
}

impl fmt::Display for InterruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkerLost { worker } => {
                write!(f, "worker {} was terminated unexpectedly", worker)
            }
            Self::Cancelled => write!(f, "cancelled by operator"),
        }
    }
}

/// Attribution recorded on a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerCause {
    /// Attributed to a user. Resubmitted work uses this so priority
    /// machinery treats it like interactively launched work.
    User,
    /// Launched by the scheduler itself
    Scheduler,
}
