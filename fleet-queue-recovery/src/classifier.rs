//! Disconnect classification

use crate::worker::WorkerSnapshot;
use fleet_queue_core::types::OfflineCause;

/// Decide whether a disconnect is an unexpected worker loss.
///
/// True iff the worker is offline and the recorded cause is an abnormal
/// channel termination. Every other cause, including an unreported one, is
/// an expected disconnect (manual removal, scale-down, idle timeout).
///
/// Pure and side-effect free: operates only on the snapshot the caller
/// captured, never re-queries live state mid-decision.
pub fn is_unexpected(snapshot: &WorkerSnapshot) -> bool {
    snapshot.offline
        && matches!(
            snapshot.offline_cause,
            Some(OfflineCause::ChannelTermination { .. })
        )
}
