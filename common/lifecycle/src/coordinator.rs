//! Lifecycle coordinator: ordered startup with compensating rollback, and
//! reverse-ordered, deadline-bounded shutdown.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{BoxError, HookFailure, HookPanicked, LifecycleError};
use crate::hook::{Hook, HookContext, HookFn};
use crate::metrics;
use crate::state::LifecycleState;

struct HookSlot {
    name: String,
    on_start: Option<HookFn>,
    on_stop: Option<HookFn>,
    started: bool,
}

#[derive(Default)]
struct Inner {
    hooks: Vec<HookSlot>,
    teardown: Option<JoinHandle<()>>,
}

/// Hooks whose stop has not confirmed yet, and stop failures seen so far.
#[derive(Default)]
struct StopProgress {
    pending: Vec<String>,
    failures: Vec<HookFailure>,
}

/// Collects hooks in registration order and drives the two-phase protocol.
///
/// The hook sequence is append-only; `start` visits it front to back, `stop`
/// back to front. A hook counts as started once its start operation returned
/// `Ok`, and every started hook gets exactly one stop call.
pub struct Lifecycle {
    inner: Mutex<Inner>,
    state: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            inner: Mutex::new(Inner::default()),
            state,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watch state transitions, e.g. for readiness probes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a hook. Hooks appended while `Starting` are started in turn by
    /// the running `start`; hooks appended while `Running` are never started
    /// but take part in the next `stop`.
    pub fn append(&self, hook: Hook) -> Result<(), LifecycleError> {
        let state = self.state();
        if state.is_shutting_down() {
            return Err(LifecycleError::HooksSealed {
                hook: hook.name,
                state,
            });
        }

        let mut inner = self.lock();
        debug!(
            hook = %hook.name,
            position = inner.hooks.len(),
            state = %state,
            "Lifecycle: hook appended"
        );
        inner.hooks.push(HookSlot {
            name: hook.name,
            on_start: hook.on_start,
            on_stop: hook.on_stop,
            started: state == LifecycleState::Running,
        });
        Ok(())
    }

    /// Run every start operation in registration order. On the first failure
    /// the hooks already started are stopped in reverse order and the error is
    /// returned; hooks after the failing one never see a start or stop call.
    pub async fn start(&self, ctx: HookContext) -> Result<(), LifecycleError> {
        self.transition("start", &[LifecycleState::Idle], LifecycleState::Starting)?;
        info!(hooks = self.len(), "Lifecycle: starting");

        let mut index = 0;
        loop {
            let Some((name, on_start)) = self.take_start(index) else {
                break;
            };

            let result = match on_start {
                Some(start) => guarded(&name, start(ctx.clone())).await,
                None => Ok(()),
            };

            match result {
                Ok(()) => {
                    self.mark_started(index);
                    metrics::emit_hook_start(&name, "ok");
                    debug!(hook = %name, "Lifecycle: hook started");
                    index += 1;
                }
                Err(source) => {
                    metrics::emit_hook_start(&name, "error");
                    warn!(hook = %name, error = %source, "Lifecycle: hook failed to start, rolling back");
                    let rollback = self.rollback(ctx).await;
                    self.state.send_replace(LifecycleState::Failed);
                    return Err(LifecycleError::Startup {
                        hook: name,
                        source,
                        rollback,
                    });
                }
            }
        }

        self.state.send_replace(LifecycleState::Running);
        info!(hooks = index, "Lifecycle: started");
        Ok(())
    }

    /// Mark that a stop has been requested. Returns false if not running.
    pub fn request_stop(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == LifecycleState::Running {
                *state = LifecycleState::StopRequested;
                true
            } else {
                false
            }
        })
    }

    /// Run every stop operation of the started hooks in reverse order, each
    /// with a context bound to `deadline`. A failing stop does not prevent the
    /// remaining ones from running, and a panicking stop counts as a failure
    /// of that hook. If the deadline elapses first, returns
    /// [`LifecycleError::ShutdownTimeout`] naming the hooks that have not
    /// confirmed; teardown carries on in the background. Ends in `Stopped`
    /// when every stop confirmed cleanly, `Failed` otherwise.
    pub async fn stop(&self, deadline: Instant) -> Result<(), LifecycleError> {
        match self.state() {
            LifecycleState::Idle => {
                self.state.send_replace(LifecycleState::Stopped);
                return Ok(());
            }
            LifecycleState::Stopped | LifecycleState::Failed => return Ok(()),
            _ => {}
        }
        self.transition(
            "stop",
            &[LifecycleState::Running, LifecycleState::StopRequested],
            LifecycleState::Stopping,
        )?;

        let hooks: Vec<(String, Option<HookFn>)> = {
            let mut inner = self.lock();
            inner
                .hooks
                .iter_mut()
                .filter(|slot| slot.started)
                .map(|slot| (slot.name.clone(), slot.on_stop.take()))
                .rev()
                .collect()
        };
        info!(hooks = hooks.len(), "Lifecycle: stopping");

        let progress = Arc::new(Mutex::new(StopProgress {
            pending: hooks.iter().map(|(name, _)| name.clone()).collect(),
            failures: Vec::new(),
        }));
        let clock = Instant::now();
        let mut teardown = tokio::spawn(run_stops(
            hooks,
            HookContext::with_deadline(deadline),
            progress.clone(),
        ));

        let finished = tokio::time::timeout_at(deadline, &mut teardown).await;
        match finished {
            Ok(joined) => {
                let mut progress = lock(&progress);
                if let Err(e) = joined {
                    progress.failures.push(HookFailure {
                        hook: "teardown".to_string(),
                        error: Box::new(e),
                    });
                }
                let failures = std::mem::take(&mut progress.failures);
                let clean = failures.is_empty();
                metrics::emit_shutdown_completed(clean);
                self.state.send_replace(if clean {
                    LifecycleState::Stopped
                } else {
                    LifecycleState::Failed
                });
                if clean {
                    info!(
                        duration_secs = clock.elapsed().as_secs_f64(),
                        "Lifecycle: stopped"
                    );
                    Ok(())
                } else {
                    warn!(
                        duration_secs = clock.elapsed().as_secs_f64(),
                        failed = failures.len(),
                        "Lifecycle: stopped with failures"
                    );
                    Err(LifecycleError::Shutdown { failures })
                }
            }
            Err(_) => {
                let elapsed = clock.elapsed();
                let (remaining, failures) = {
                    let mut progress = lock(&progress);
                    (
                        progress.pending.clone(),
                        std::mem::take(&mut progress.failures),
                    )
                };
                self.lock().teardown = Some(teardown);
                metrics::emit_shutdown_completed(false);
                self.state.send_replace(LifecycleState::Failed);
                warn!(
                    duration_secs = elapsed.as_secs_f64(),
                    remaining = ?remaining,
                    "Lifecycle: shutdown deadline reached"
                );
                Err(LifecycleError::ShutdownTimeout {
                    elapsed,
                    remaining,
                    failures,
                })
            }
        }
    }

    /// Stop every hook started so far, newest first, without a deadline.
    async fn rollback(&self, ctx: HookContext) -> Vec<HookFailure> {
        let hooks: Vec<(String, Option<HookFn>)> = {
            let mut inner = self.lock();
            inner
                .hooks
                .iter_mut()
                .filter(|slot| slot.started)
                .map(|slot| (slot.name.clone(), slot.on_stop.take()))
                .rev()
                .collect()
        };

        let progress = Arc::new(Mutex::new(StopProgress::default()));
        run_stops(hooks, ctx, progress.clone()).await;
        let mut progress = lock(&progress);
        std::mem::take(&mut progress.failures)
    }

    fn take_start(&self, index: usize) -> Option<(String, Option<HookFn>)> {
        let mut inner = self.lock();
        let slot = inner.hooks.get_mut(index)?;
        Some((slot.name.clone(), slot.on_start.take()))
    }

    fn mark_started(&self, index: usize) {
        if let Some(slot) = self.lock().hooks.get_mut(index) {
            slot.started = true;
        }
    }

    fn transition(
        &self,
        operation: &'static str,
        from: &[LifecycleState],
        to: LifecycleState,
    ) -> Result<(), LifecycleError> {
        let mut current = None;
        self.state.send_if_modified(|state| {
            if from.contains(state) {
                *state = to;
                true
            } else {
                current = Some(*state);
                false
            }
        });
        match current {
            Some(state) => Err(LifecycleError::InvalidState { operation, state }),
            None => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run a hook operation, turning a panic into an error for that hook.
async fn guarded<F>(hook: &str, operation: F) -> Result<(), BoxError>
where
    F: Future<Output = Result<(), BoxError>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let panic = HookPanicked {
                hook: hook.to_string(),
                message: panic_message(payload.as_ref()),
            };
            Err(panic.into())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

async fn run_stops(
    hooks: Vec<(String, Option<HookFn>)>,
    ctx: HookContext,
    progress: Arc<Mutex<StopProgress>>,
) {
    for (name, on_stop) in hooks {
        let clock = Instant::now();
        let result = match on_stop {
            Some(stop) => guarded(&name, stop(ctx.clone())).await,
            None => Ok(()),
        };
        let duration = clock.elapsed();

        let mut progress = lock(&progress);
        if let Some(position) = progress.pending.iter().position(|n| *n == name) {
            progress.pending.remove(position);
        }
        match result {
            Ok(()) => {
                metrics::emit_hook_stop(&name, "ok", duration);
                debug!(
                    hook = %name,
                    duration_secs = duration.as_secs_f64(),
                    "Lifecycle: hook stopped"
                );
            }
            Err(error) => {
                metrics::emit_hook_stop(&name, "error", duration);
                warn!(
                    hook = %name,
                    duration_secs = duration.as_secs_f64(),
                    error = %error,
                    "Lifecycle: hook failed to stop"
                );
                progress.failures.push(HookFailure { hook: name, error });
            }
        }
    }
}
