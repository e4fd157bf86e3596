//! Opaque work-item annotations

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named metadata annotation attached to a work item.
///
/// Actions are opaque to the recovery layer: other subsystems attach them,
/// and the recovery pass captures them from an aborted work item and
/// forwards them verbatim, in order, to the resubmitted task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Annotation name
    pub name: String,
    /// Arbitrary payload, not interpreted by this layer
    pub payload: Value,
}

impl Action {
    /// Create a new action
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}
