//! Process assembly and lifecycle: a typed provider registry with a depth-first
//! dependency resolver, an ordered start/stop hook coordinator with compensating
//! rollback and deadline-bounded shutdown, and a supervisor that ties the
//! coordinator to process termination signals.
//!
//! ```text
//! Registry ──build()──► Container ──resolve/invoke──► constructors
//!                                                       │ append hooks
//!                                                       ▼
//!            Supervisor::run ──start()──► Lifecycle ──► hook 1..n start
//!                 │  (signal)
//!                 └─────stop(deadline)──► Lifecycle ──► hook n..1 stop
//! ```

mod container;
mod coordinator;
mod dependency;
mod error;
mod hook;
mod liveness;
mod metrics;
mod readiness;
mod registry;
mod signals;
mod state;
mod supervisor;

pub use container::Container;
pub use coordinator::Lifecycle;
pub use dependency::{Dependencies, Dependency, Group, Requirement, Scope};
pub use error::{AssemblyError, BoxError, HookFailure, HookPanicked, LifecycleError};
pub use hook::{Component, Hook, HookContext};
pub use liveness::{LivenessHandler, LivenessStatus};
pub use readiness::ReadinessHandler;
pub use registry::{Registry, TypeKey};
pub use signals::{OsSignals, TerminationSource};
pub use state::LifecycleState;
pub use supervisor::{ExitStatus, Supervisor, DEFAULT_SHUTDOWN_TIMEOUT};
