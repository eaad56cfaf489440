//! Start/stop hooks and the context they run with.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;

pub(crate) type HookFn =
    Box<dyn FnOnce(HookContext) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Context passed to hook operations.
///
/// Start operations get the supervisor's termination token, cancelled if a
/// termination request arrives while startup is still running. Stop
/// operations get the shutdown deadline; it is advisory, a stop operation
/// should keep cleaning up past it, but nobody waits for it any longer.
#[derive(Clone, Debug)]
pub struct HookContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl HookContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            deadline: None,
            cancel,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: CancellationToken::new(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| d <= Instant::now())
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Default for HookContext {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

/// A start/stop operation pair contributed by a constructed component. Both
/// operations are optional and each runs at most once.
pub struct Hook {
    pub(crate) name: String,
    pub(crate) on_start: Option<HookFn>,
    pub(crate) on_stop: Option<HookFn>,
}

impl Hook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_start: None,
            on_stop: None,
        }
    }

    /// Start operation. Return once the component is ready; long-running work
    /// belongs in a task owned by the component and ended by the stop operation.
    pub fn on_start<F, Fut>(mut self, start: F) -> Self
    where
        F: FnOnce(HookContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_start = Some(Box::new(move |ctx| start(ctx).boxed()));
        self
    }

    pub fn on_stop<F, Fut>(mut self, stop: F) -> Self
    where
        F: FnOnce(HookContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_stop = Some(Box::new(move |ctx| stop(ctx).boxed()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn for_component<C: Component>(component: Arc<C>) -> Self {
        let starter = component.clone();
        Hook::new(component.name())
            .on_start(move |ctx| async move { starter.start(ctx).await })
            .on_stop(move |ctx| async move { component.stop(ctx).await })
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("on_start", &self.on_start.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// Lifecycle capability of a value built through
/// [`Registry::provide_component`](crate::Registry::provide_component).
#[async_trait]
pub trait Component: Send + Sync + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn start(&self, ctx: HookContext) -> Result<(), BoxError>;

    async fn stop(&self, ctx: HookContext) -> Result<(), BoxError>;
}
