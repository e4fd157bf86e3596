//! Host progress listener

use tracing::info;

/// Progress sink the worker-lifecycle manager threads through disconnect
/// notifications. Messages land in the host's operational log.
#[derive(Debug, Clone, Default)]
pub struct TaskListener {
    context: Option<String>,
}

impl TaskListener {
    /// Create a listener with a context label
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
        }
    }

    /// Emit a progress message
    pub fn note(&self, message: &str) {
        match &self.context {
            Some(context) => info!("[{}] {}", context, message),
            None => info!("{}", message),
        }
    }
}
