use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use axum::Router;
use common_metrics::track_metrics;
use lifecycle::{BoxError, Component, HookContext};
use routing::HttpRouter;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::HttpConfig;
use crate::error::HttpServerError;

struct Serving {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

pub struct HttpServer {
    listen_addr: String,
    router: Router,
    serving: Mutex<Option<Serving>>,
}

impl HttpServer {
    pub fn new(config: &HttpConfig, router: &HttpRouter) -> Self {
        Self {
            listen_addr: config.listen_addr.clone(),
            router: router
                .router()
                .layer(axum::middleware::from_fn(track_metrics)),
            serving: Mutex::new(None),
        }
    }

    /// Bound address while serving; resolves port 0 to the actual port.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().as_ref().map(|serving| serving.local_addr)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Serving>> {
        self.serving.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Component for HttpServer {
    fn name(&self) -> &str {
        "http-server"
    }

    async fn start(&self, _ctx: HookContext) -> Result<(), BoxError> {
        if self.lock().is_some() {
            return Err(HttpServerError::AlreadyStarted.into());
        }

        let listener =
            TcpListener::bind(&self.listen_addr)
                .await
                .map_err(|source| HttpServerError::Bind {
                    addr: self.listen_addr.clone(),
                    source,
                })?;
        let local_addr = listener.local_addr().map_err(HttpServerError::Serve)?;

        let shutdown = CancellationToken::new();
        let router = self.router.clone();
        let signal = shutdown.clone().cancelled_owned();
        let task = tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(signal)
                .await
        });
        info!(addr = %local_addr, "HTTP server listening");

        *self.lock() = Some(Serving {
            local_addr,
            shutdown,
            task,
        });
        Ok(())
    }

    async fn stop(&self, ctx: HookContext) -> Result<(), BoxError> {
        let Some(Serving {
            local_addr,
            shutdown,
            mut task,
        }) = self.lock().take()
        else {
            return Ok(());
        };

        info!(addr = %local_addr, "HTTP server shutting down");
        shutdown.cancel();

        let joined = tokio::select! {
            joined = &mut task => joined,
            _ = ctx.done() => {
                warn!(addr = %local_addr, "HTTP server drain deadline reached, aborting");
                task.abort();
                return Err(HttpServerError::DrainTimeout.into());
            }
        };
        joined
            .map_err(HttpServerError::Task)?
            .map_err(HttpServerError::Serve)?;
        info!(addr = %local_addr, "HTTP server stopped");
        Ok(())
    }
}
