use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use lifecycle::{BoxError, Component, HookContext};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::service::{Routes, RoutesBuilder};
use tonic::transport::Server;
use tonic_health::server::{health_reporter, HealthReporter};
use tonic_health::ServingStatus;
use tracing::{info, warn};

use crate::config::GrpcConfig;
use crate::error::GrpcServerError;

/// A gRPC service contributed to the server.
pub trait GrpcService: Send + Sync + 'static {
    /// Fully qualified service name, as reported by the health service.
    /// Usually `<FooServer<_> as tonic::server::NamedService>::NAME`.
    fn service_name(&self) -> &str;

    fn register(&self, routes: &mut RoutesBuilder);
}

/// Member of the gRPC service value group.
#[derive(Clone)]
pub struct GrpcServiceEntry(Arc<dyn GrpcService>);

impl GrpcServiceEntry {
    pub fn new<S: GrpcService>(service: S) -> Self {
        Self(Arc::new(service))
    }

    pub fn service_name(&self) -> &str {
        self.0.service_name()
    }
}

struct Serving {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<Result<(), tonic::transport::Error>>,
}

pub struct GrpcServer {
    listen_addr: String,
    services: Vec<String>,
    health: HealthReporter,
    routes: Mutex<Option<Routes>>,
    serving: Mutex<Option<Serving>>,
}

impl GrpcServer {
    pub fn new(config: &GrpcConfig, services: Vec<Arc<GrpcServiceEntry>>) -> Self {
        let (health, health_service) = health_reporter();

        let mut builder = RoutesBuilder::default();
        builder.add_service(health_service);
        for service in &services {
            service.0.register(&mut builder);
        }

        Self {
            listen_addr: config.listen_addr.clone(),
            services: services
                .iter()
                .map(|service| service.service_name().to_string())
                .collect(),
            health,
            routes: Mutex::new(Some(builder.routes())),
            serving: Mutex::new(None),
        }
    }

    /// Handle to update per-service health while running.
    pub fn health_reporter(&self) -> HealthReporter {
        self.health.clone()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.serving).as_ref().map(|serving| serving.local_addr)
    }

    async fn set_status(&self, status: ServingStatus) {
        let mut health = self.health.clone();
        health.set_service_status("", status).await;
        for service in &self.services {
            health.set_service_status(service, status).await;
        }
    }
}

#[async_trait]
impl Component for GrpcServer {
    fn name(&self) -> &str {
        "grpc-server"
    }

    async fn start(&self, _ctx: HookContext) -> Result<(), BoxError> {
        let Some(routes) = lock(&self.routes).take() else {
            return Err(GrpcServerError::AlreadyStarted.into());
        };

        let listener =
            TcpListener::bind(&self.listen_addr)
                .await
                .map_err(|source| GrpcServerError::Bind {
                    addr: self.listen_addr.clone(),
                    source,
                })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| GrpcServerError::Bind {
                addr: self.listen_addr.clone(),
                source,
            })?;

        self.set_status(ServingStatus::Serving).await;

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone().cancelled_owned();
        let task = tokio::spawn(async move {
            Server::builder()
                .add_routes(routes)
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal)
                .await
        });
        info!(
            addr = %local_addr,
            services = ?self.services,
            "gRPC server listening"
        );

        *lock(&self.serving) = Some(Serving {
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
        }) = lock(&self.serving).take()
        else {
            return Ok(());
        };

        info!(addr = %local_addr, "gRPC server shutting down");
        self.set_status(ServingStatus::NotServing).await;
        shutdown.cancel();

        let joined = tokio::select! {
            joined = &mut task => joined,
            _ = ctx.done() => {
                warn!(addr = %local_addr, "gRPC server drain deadline reached, aborting");
                task.abort();
                return Err(GrpcServerError::DrainTimeout.into());
            }
        };
        joined
            .map_err(GrpcServerError::Task)?
            .map_err(GrpcServerError::Transport)?;
        info!(addr = %local_addr, "gRPC server stopped");
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
