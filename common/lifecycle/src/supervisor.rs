//! Process-level entry point: start, wait for termination, stop within a deadline.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::coordinator::Lifecycle;
use crate::error::LifecycleError;
use crate::hook::HookContext;
use crate::signals::{OsSignals, TerminationSource};

/// Shutdown deadline used unless the deploying system overrides it.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How a supervised run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// Started, received a termination request and stopped within the deadline.
    Clean,
    /// A hook failed to start; started hooks were rolled back.
    StartupFailed,
    /// Every stop ran, but at least one reported an error.
    ShutdownFailed,
    /// The deadline elapsed with hooks still stopping.
    ShutdownTimedOut,
    /// A second termination request arrived while stopping.
    Forced,
}

impl ExitStatus {
    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::StartupFailed
            | ExitStatus::ShutdownFailed
            | ExitStatus::ShutdownTimedOut => 1,
            ExitStatus::Forced => 130,
        }
    }

    pub fn is_clean(&self) -> bool {
        *self == ExitStatus::Clean
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Drives a [`Lifecycle`] from process start to exit. One per process.
pub struct Supervisor<S = OsSignals> {
    lifecycle: Arc<Lifecycle>,
    termination: S,
    shutdown_timeout: Duration,
}

impl Supervisor<OsSignals> {
    /// Supervisor listening for SIGINT/SIGTERM.
    pub fn with_os_signals(lifecycle: Arc<Lifecycle>) -> std::io::Result<Self> {
        Ok(Self::new(lifecycle, OsSignals::install()?))
    }
}

impl<S: TerminationSource> Supervisor<S> {
    pub fn new(lifecycle: Arc<Lifecycle>, termination: S) -> Self {
        Self {
            lifecycle,
            termination,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Start the lifecycle, block until the first termination request (or a
    /// startup failure), then stop with the shutdown deadline.
    pub async fn run(mut self) -> ExitStatus {
        let cancel = CancellationToken::new();
        let mut requested = false;

        let started = {
            let start = self.lifecycle.start(HookContext::new(cancel.clone()));
            tokio::pin!(start);
            loop {
                tokio::select! {
                    result = &mut start => break result,
                    request = self.termination.recv(), if !requested => {
                        requested = true;
                        info!(
                            request = request.as_deref().unwrap_or("source closed"),
                            "Lifecycle: termination requested during startup"
                        );
                        cancel.cancel();
                    }
                }
            }
        };

        if let Err(e) = started {
            error!(error = %e, "Lifecycle: error in starting application");
            // Same stop path as a signal; the coordinator already rolled back.
            if let Err(e) = stop_within(&self.lifecycle, self.shutdown_timeout).await {
                warn!(error = %e, "Lifecycle: stop after failed startup reported errors");
            }
            return ExitStatus::StartupFailed;
        }

        if !requested {
            info!("Lifecycle: application started, waiting for termination request");
            let request = self.termination.recv().await;
            info!(
                request = request.as_deref().unwrap_or("source closed"),
                "Lifecycle: termination requested"
            );
        }

        self.lifecycle.request_stop();
        info!("Lifecycle: shutting down gracefully, press Ctrl+C again to force");

        let status = {
            let stop = stop_within(&self.lifecycle, self.shutdown_timeout);
            tokio::pin!(stop);
            tokio::select! {
                result = &mut stop => Some(result),
                Some(request) = self.termination.recv() => {
                    warn!(request = %request, "Lifecycle: second termination request, forcing exit");
                    None
                }
            }
        };

        match status {
            None => ExitStatus::Forced,
            Some(Ok(())) => {
                info!("Lifecycle: server exiting");
                ExitStatus::Clean
            }
            Some(Err(LifecycleError::ShutdownTimeout { remaining, .. })) => {
                error!(
                    remaining = ?remaining,
                    timeout_secs = self.shutdown_timeout.as_secs_f64(),
                    "Lifecycle: server forced to shutdown, hooks did not confirm stop"
                );
                ExitStatus::ShutdownTimedOut
            }
            Some(Err(e)) => {
                error!(error = %e, "Lifecycle: shutdown completed with errors");
                ExitStatus::ShutdownFailed
            }
        }
    }
}

async fn stop_within(lifecycle: &Lifecycle, timeout: Duration) -> Result<(), LifecycleError> {
    lifecycle.stop(Instant::now() + timeout).await
}
