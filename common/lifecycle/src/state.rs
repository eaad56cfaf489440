use std::fmt;

/// Process-wide lifecycle state, owned and mutated only by the coordinator.
///
/// ```text
/// Idle ─► Starting ─► Running ─► StopRequested ─► Stopping ─► Stopped
///            │                                       │
///            └──────────────► Failed ◄───────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    StopRequested,
    Stopping,
    Stopped,
    Failed,
}

impl LifecycleState {
    /// True once no further hook can be started or stopped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }

    /// True once shutdown has been requested or reached.
    pub fn is_shutting_down(&self) -> bool {
        matches!(
            self,
            LifecycleState::StopRequested | LifecycleState::Stopping
        ) || self.is_terminal()
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::StopRequested => "stop requested",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}
