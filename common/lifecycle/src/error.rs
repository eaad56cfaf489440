//! Assembly and lifecycle error types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::state::LifecycleState;

/// Error type returned by constructors and hook operations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while registering providers or building the object graph.
/// All of them are fatal: the process never reaches startup.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// A second provider (or supplied value) was registered for the same type.
    #[error("duplicate provider for {type_name}")]
    DuplicateProvider { type_name: &'static str },

    /// A required dependency has no registered provider.
    #[error("missing provider for {type_name}, required by {required_by}")]
    MissingProvider {
        type_name: &'static str,
        required_by: &'static str,
    },

    /// Resolution revisited a type that is still being resolved.
    #[error("cyclic dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<&'static str> },

    /// The constructor itself returned an error.
    #[error("failed to construct {type_name}: {source}")]
    Construction {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },
}

/// A hook operation that returned an error, recorded by name.
#[derive(Debug)]
pub struct HookFailure {
    pub hook: String,
    pub error: BoxError,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.hook, self.error)
    }
}

/// A hook operation panicked. Recorded as that hook's error.
#[derive(Debug, Error)]
#[error("hook '{hook}' panicked: {message}")]
pub struct HookPanicked {
    pub hook: String,
    pub message: String,
}

/// Errors returned by [`Lifecycle`](crate::Lifecycle) operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A start operation failed. Every hook started before it has already
    /// been stopped in reverse order; `rollback` lists stop operations that
    /// failed during that compensation.
    #[error("hook '{hook}' failed to start: {source}")]
    Startup {
        hook: String,
        #[source]
        source: BoxError,
        rollback: Vec<HookFailure>,
    },

    /// One or more stop operations failed. Teardown still ran to completion.
    #[error("{} hook(s) failed to stop: {}", failures.len(), join(failures))]
    Shutdown { failures: Vec<HookFailure> },

    /// The stop deadline elapsed before every hook confirmed completion.
    #[error("shutdown timed out after {elapsed:?}, hooks still stopping: {remaining:?}")]
    ShutdownTimeout {
        elapsed: Duration,
        remaining: Vec<String>,
        failures: Vec<HookFailure>,
    },

    /// The operation is not valid in the coordinator's current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    /// Hooks can no longer be appended once shutdown has begun.
    #[error("cannot append hook '{hook}' while {state}")]
    HooksSealed { hook: String, state: LifecycleState },
}

fn join(failures: &[HookFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
