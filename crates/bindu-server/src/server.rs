//! The server runtime: component wiring, the accept loop, and shutdown.
//!
//! `run()` builds the storage and scheduler backends (retrying through the
//! configured startup policy), starts the worker pool, and serves HTTP until
//! a shutdown signal arrives. Any startup failure is returned as an error so
//! the process can exit non-zero; a signal-triggered shutdown drains
//! gracefully and returns `Ok`.

use crate::auth::TokenVerifier;
use crate::config::{SchedulerConfig, ServerConfig, StorageConfig};
use crate::handler::AgentHandler;
use crate::http::{handle_request, AppState};
use crate::manifest::AgentManifest;
use crate::metrics::Metrics;
use crate::push::PushDispatcher;
#[cfg(any(feature = "postgres", feature = "redis"))]
use crate::retry::execute_with_retry;
use crate::task_manager::TaskManager;
use crate::worker::{CancellationRegistry, WorkerPool};
use bindu_scheduler::{BoxedScheduler, InMemoryScheduler, InMemorySchedulerConfig, Scheduler};
use bindu_storage::{BoxedStorage, InMemoryStorage, InMemoryStorageConfig, Storage};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Server lifecycle errors. Every variant at startup maps to a non-zero
/// process exit in the examples.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("storage initialization failed: {0}")]
    Storage(String),

    #[error("scheduler initialization failed: {0}")]
    Scheduler(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A configured Bindu server, ready to run.
pub struct BinduServer {
    pub(crate) manifest: AgentManifest,
    pub(crate) config: ServerConfig,
    pub(crate) handler: Arc<dyn AgentHandler>,
    pub(crate) verifier: Option<Arc<dyn TokenVerifier>>,
}

impl BinduServer {
    pub fn builder() -> crate::builder::BinduServerBuilder {
        crate::builder::BinduServerBuilder::new()
    }

    /// Bind the listener and wire all components, without accepting yet.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let did = self.manifest.did.as_ref().map(|d| d.did.clone());

        info!("Initializing storage...");
        let storage = build_storage(&self.config, did.as_deref()).await?;
        info!("Storage initialized: {}", storage.backend_name());

        info!("Initializing scheduler...");
        let scheduler = build_scheduler(&self.config).await?;
        info!("Scheduler initialized: {}", scheduler.backend_name());

        let push = PushDispatcher::new(self.config.push.clone(), Arc::clone(&storage));
        let cancellations = CancellationRegistry::default();

        let worker_pool = Arc::new(WorkerPool::new(
            Arc::clone(&storage),
            Arc::clone(&scheduler),
            Arc::clone(&self.handler),
            push.clone(),
            cancellations.clone(),
            self.config.worker.clone(),
        ));

        let task_manager = TaskManager::new(
            Arc::clone(&storage),
            Arc::clone(&scheduler),
            push,
            cancellations,
        );

        let listener = TcpListener::bind(self.config.bind_address).await?;
        let local_addr = listener.local_addr()?;

        let state = Arc::new(AppState {
            manifest: self.manifest,
            task_manager,
            storage,
            scheduler,
            worker_pool,
            metrics: Metrics::new(),
            auth_enabled: self.config.auth.enabled,
            verifier: self.verifier,
            max_body_size: self.config.max_body_size,
            started_at: Instant::now(),
            agent_card_cache: tokio::sync::RwLock::new(None),
        });

        Ok(BoundServer {
            listener,
            local_addr,
            state,
        })
    }

    /// Run until SIGINT/SIGTERM, then drain gracefully.
    pub async fn run(self) -> Result<(), ServerError> {
        let bound = self.bind().await?;

        let shutdown = CancellationToken::new();
        spawn_signal_listener(shutdown.clone());

        bound.serve(shutdown).await
    }
}

/// A bound, fully wired server. Separated from [`BinduServer::run`] so tests
/// can bind an ephemeral port and drive shutdown themselves.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<AppState>,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` fires, then drain workers and
    /// release backends.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let worker_handles = self.state.worker_pool.spawn();
        info!(
            "Agent '{}' listening on http://{}",
            self.state.manifest.name, self.local_addr
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            debug!("New connection from {}", peer_addr);
                            let state = Arc::clone(&self.state);
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let state = Arc::clone(&state);
                                    async move {
                                        Ok::<_, Infallible>(handle_request(state, req).await)
                                    }
                                });
                                if let Err(err) =
                                    http1::Builder::new().serve_connection(io, service).await
                                {
                                    let err_str = err.to_string();
                                    if err_str.contains("connection closed before message completed")
                                    {
                                        debug!("Client disconnected: {}", err);
                                    } else {
                                        error!("Error serving connection: {}", err);
                                    }
                                }
                            });
                        }
                        Err(err) => {
                            error!("Accept failed: {}", err);
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Stop workers first so in-flight tasks finish their storage writes,
        // then wake any blocked dequeuers
        self.state.worker_pool.shutdown_token().cancel();
        self.state.scheduler.close().await;
        for handle in worker_handles {
            let _ = handle.await;
        }

        if let Err(err) = self.state.storage.close().await {
            error!("Storage close failed: {}", err);
        }
        info!("Shutdown complete");
        Ok(())
    }
}

async fn build_storage(
    config: &ServerConfig,
    did: Option<&str>,
) -> Result<Arc<BoxedStorage>, ServerError> {
    match &config.storage {
        StorageConfig::Memory => {
            let _ = did;
            Ok(Arc::new(InMemoryStorage::with_config(
                InMemoryStorageConfig {
                    context_history: config.context_history,
                    ..Default::default()
                },
            )))
        }
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            database_url,
            max_connections,
            min_connections,
        } => {
            let pg_config = bindu_storage::PostgresStorageConfig {
                database_url: database_url.clone(),
                max_connections: *max_connections,
                min_connections: *min_connections,
                context_history: config.context_history,
                ..Default::default()
            };
            let storage = execute_with_retry("storage initialization", &config.retry, || {
                bindu_storage::PostgresStorage::connect(pg_config.clone(), did)
            })
            .await
            .map_err(|e| ServerError::Storage(e.to_string()))?;
            Ok(Arc::new(storage))
        }
    }
}

async fn build_scheduler(config: &ServerConfig) -> Result<Arc<BoxedScheduler>, ServerError> {
    match &config.scheduler {
        SchedulerConfig::Memory => Ok(Arc::new(InMemoryScheduler::with_config(
            InMemorySchedulerConfig::default(),
        ))),
        #[cfg(feature = "redis")]
        SchedulerConfig::Redis { url, queue_key } => {
            let redis_config = bindu_scheduler::RedisSchedulerConfig {
                url: url.clone(),
                queue_key: queue_key.clone(),
                ..Default::default()
            };
            let scheduler = execute_with_retry("scheduler initialization", &config.retry, || {
                bindu_scheduler::RedisScheduler::connect(redis_config.clone())
            })
            .await
            .map_err(|e| ServerError::Scheduler(e.to_string()))?;
            Ok(Arc::new(scheduler))
        }
    }
}

fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(signal) => signal,
                    Err(err) => {
                        error!("SIGTERM handler installation failed: {}", err);
                        let _ = ctrl_c.await;
                        shutdown.cancel();
                        return;
                    }
                };
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        shutdown.cancel();
    });
}
