//! Builder — the single entry point turning a handler and configuration
//! into a runnable agent service.

use crate::auth::TokenVerifier;
use crate::config::{SchedulerConfig, ServerConfig, StorageConfig};
use crate::handler::AgentHandler;
use crate::manifest::AgentManifest;
use crate::server::BinduServer;
use bindu_a2a_protocol::PushNotificationConfig;
use std::net::SocketAddr;
use std::sync::Arc;

/// Builder validation errors.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("a handler is required")]
    MissingHandler,

    #[error("auth is enabled but no token verifier was provided")]
    MissingVerifier,
}

/// Fluent builder for [`BinduServer`].
///
/// Zero configuration yields a single-process deployment: in-memory storage
/// and scheduler on `127.0.0.1:3773`.
pub struct BinduServerBuilder {
    manifest: AgentManifest,
    config: ServerConfig,
    handler: Option<Arc<dyn AgentHandler>>,
    verifier: Option<Arc<dyn TokenVerifier>>,
    env_overrides: bool,
}

impl BinduServerBuilder {
    pub fn new() -> Self {
        Self {
            manifest: AgentManifest::new("bindu-agent", "An A2A agent"),
            config: ServerConfig::default(),
            handler: None,
            verifier: None,
            env_overrides: true,
        }
    }

    pub fn manifest(mut self, manifest: AgentManifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.config.scheduler = scheduler;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.worker.workers = workers.max(1);
        self
    }

    /// Accumulate cross-task message history on contexts.
    pub fn context_history(mut self, enabled: bool) -> Self {
        self.config.context_history = enabled;
        self
    }

    pub fn push_enabled(mut self, enabled: bool) -> Self {
        self.config.push.enabled = enabled;
        self
    }

    /// Deployment-wide webhook for tasks without one of their own.
    pub fn global_webhook(mut self, webhook: PushNotificationConfig) -> Self {
        self.config.push.global_webhook = Some(webhook);
        self
    }

    /// Gate the A2A endpoint on bearer tokens checked by `verifier`.
    pub fn auth(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.config.auth.enabled = true;
        self.verifier = Some(verifier);
        self
    }

    /// Skip `BINDU_*` environment overrides (they apply by default).
    pub fn without_env_overrides(mut self) -> Self {
        self.env_overrides = false;
        self
    }

    pub fn handler(mut self, handler: impl AgentHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn handler_arc(mut self, handler: Arc<dyn AgentHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Validate and assemble the server.
    pub fn build(self) -> Result<BinduServer, BuildError> {
        let handler = self.handler.ok_or(BuildError::MissingHandler)?;

        let mut config = self.config;
        if self.env_overrides {
            config = config.apply_env_overrides();
        }
        if config.auth.enabled && self.verifier.is_none() {
            return Err(BuildError::MissingVerifier);
        }

        // The card advertises what the deployment actually supports
        let mut manifest = self.manifest;
        manifest.capabilities.push_notifications = config.push.enabled;

        Ok(BinduServer {
            manifest,
            config,
            handler,
            verifier: self.verifier,
        })
    }
}

impl Default for BinduServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
