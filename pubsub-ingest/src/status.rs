use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Lifecycle phase of a worker. Stopped and Failed are terminal; Degraded
/// and Running may cycle across watchdog-driven retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Configuring,
    Running,
    Degraded,
    Stopping,
    Stopped,
    Failed,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Starting => "Starting",
            WorkerState::Configuring => "Configuring",
            WorkerState::Running => "Running",
            WorkerState::Degraded => "Degraded",
            WorkerState::Stopping => "Stopping",
            WorkerState::Stopped => "Stopped",
            WorkerState::Failed => "Failed",
        };
        write!(f, "{name}")
    }
}

/// Receives worker lifecycle transitions. Fire-and-forget: implementations
/// must not block and must not fail.
pub trait StatusReporter: Send + Sync {
    fn update_status(&self, state: WorkerState, detail: &str);
}

/// Substituted when the host supplies no reporter, so the worker never
/// branches on reporter presence.
pub struct NoopStatusReporter;

impl StatusReporter for NoopStatusReporter {
    fn update_status(&self, _state: WorkerState, _detail: &str) {}
}

/// Pure-state reporter holding the latest transition, for hosts that poll
/// worker health.
#[derive(Clone)]
pub struct SharedStatus {
    inner: Arc<RwLock<(WorkerState, String)>>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new((WorkerState::Starting, String::new()))),
        }
    }

    pub fn current(&self) -> (WorkerState, String) {
        self.inner.read().clone()
    }
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReporter for SharedStatus {
    fn update_status(&self, state: WorkerState, detail: &str) {
        *self.inner.write() = (state, detail.to_string());
    }
}
