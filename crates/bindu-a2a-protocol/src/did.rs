//! DID identity — the agent's decentralized identifier and W3C DID document.
//!
//! Key generation and signing are collaborators; the runtime only needs the
//! DID string (for schema isolation and discovery) and enough key material to
//! publish a resolvable document.

use serde::{Deserialize, Serialize};

const W3C_DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
const BINDU_CONTEXT: &str = "https://getbindu.com/ns/v1";
const VERIFICATION_KEY_TYPE: &str = "Ed25519VerificationKey2020";
const KEY_FRAGMENT: &str = "key-1";
const SERVICE_FRAGMENT: &str = "agent-service";
const SERVICE_TYPE: &str = "binduAgentService";

/// The agent's DID identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDid {
    /// The DID string (e.g. `did:bindu:alice:summarizer`).
    pub did: String,
    /// Base58btc-multibase Ed25519 public key, when the deployment has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
}

impl AgentDid {
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            public_key_multibase: None,
        }
    }

    pub fn with_public_key(mut self, public_key_multibase: impl Into<String>) -> Self {
        self.public_key_multibase = Some(public_key_multibase.into());
        self
    }

    /// Build the W3C DID document for this identity, pointing its service
    /// endpoint at the deployment URL.
    pub fn document(&self, service_url: &str) -> DidDocument {
        let key_id = format!("{}#{}", self.did, KEY_FRAGMENT);
        let verification_method = self
            .public_key_multibase
            .iter()
            .map(|key| VerificationMethod {
                id: key_id.clone(),
                method_type: VERIFICATION_KEY_TYPE.to_string(),
                controller: self.did.clone(),
                public_key_multibase: key.clone(),
            })
            .collect::<Vec<_>>();
        let authentication = verification_method.iter().map(|m| m.id.clone()).collect();

        DidDocument {
            context: vec![W3C_DID_CONTEXT.to_string(), BINDU_CONTEXT.to_string()],
            id: self.did.clone(),
            verification_method,
            authentication,
            service: vec![DidService {
                id: format!("{}#{}", self.did, SERVICE_FRAGMENT),
                service_type: SERVICE_TYPE.to_string(),
                service_endpoint: service_url.to_string(),
            }],
        }
    }
}

/// A W3C DID document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(rename = "verificationMethod", skip_serializing_if = "Vec::is_empty")]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authentication: Vec<String>,
    pub service: Vec<DidService>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub controller: String,
    #[serde(rename = "publicKeyMultibase")]
    pub public_key_multibase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidService {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}
