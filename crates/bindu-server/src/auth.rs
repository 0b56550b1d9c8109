//! Authentication seam for the A2A endpoint.
//!
//! The runtime gates `POST /` on a bearer token when auth is enabled; the
//! actual verification (OAuth2 introspection, JWT validation, ...) is a
//! collaborator behind the [`TokenVerifier`] trait. A rejected or missing
//! token surfaces as the `InvalidToken` JSON-RPC error.

use async_trait::async_trait;
use std::collections::HashSet;

/// Token verification failure.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("token rejected: {0}")]
    Rejected(String),

    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// Verifies bearer tokens presented on the A2A endpoint.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<(), AuthError>;
}

/// Verifier backed by a fixed token set. Useful for tests and simple
/// deployments; production setups plug an introspection-backed verifier in
/// through the builder.
pub struct StaticTokenVerifier {
    tokens: HashSet<String>,
}

impl StaticTokenVerifier {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<(), AuthError> {
        if self.tokens.contains(token) {
            Ok(())
        } else {
            Err(AuthError::Rejected("unknown token".to_string()))
        }
    }
}

/// Extract the bearer token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
