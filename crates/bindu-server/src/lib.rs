//! # Bindu server
//!
//! Turns a user-supplied agent function into a networked, multi-tenant,
//! A2A-protocol-compliant agent service: JSON-RPC over HTTP in front, durable
//! task storage and a scheduler-fed worker pool behind.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bindu_server::{AgentManifest, BinduServer, FnHandler, HandlerError};
//! use serde_json::{json, Value};
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let handler = FnHandler::new(|history: Vec<bindu_server::HandlerTurn>| async move {
//!         let last = history.last().map(|t| t.content.clone()).unwrap_or_default();
//!         Ok::<Value, HandlerError>(json!(format!("echo: {}", last)))
//!     });
//!
//!     let server = BinduServer::builder()
//!         .manifest(AgentManifest::new("echo-agent", "Echoes the last message"))
//!         .handler(handler)
//!         .build()?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod builder;
pub mod config;
pub mod handler;
pub mod http;
pub mod manifest;
pub mod metrics;
pub mod push;
pub mod retry;
pub mod server;
pub mod task_manager;
pub mod worker;

pub use auth::{AuthError, StaticTokenVerifier, TokenVerifier};
pub use builder::BinduServerBuilder;
pub use config::{
    AuthConfig, RetryConfig, SchedulerConfig, ServerConfig, StorageConfig, WorkerConfig,
};
pub use handler::{AgentHandler, FnHandler, HandlerError, HandlerTurn};
pub use manifest::AgentManifest;
pub use push::PushDispatcher;
pub use server::{BinduServer, BoundServer, ServerError};
pub use task_manager::TaskManager;
pub use worker::WorkerPool;
