//! # A2A protocol types
//!
//! The data model of the agent-to-agent protocol surface served by Bindu:
//! tasks with their lifecycle states, conversation messages, artifacts,
//! feedback records, webhook configuration, the discovery agent card, DID
//! documents, and the closed JSON-RPC error taxonomy.
//!
//! Wire conventions: snake_case field names, kebab-case task states
//! (`input-required`), message parts tagged by `"type"`.

pub mod agent_card;
pub mod artifact;
pub mod context;
pub mod did;
pub mod error;
pub mod feedback;
pub mod message;
pub mod notification;
pub mod structured;
pub mod task;

pub use agent_card::{
    AgentCapabilities, AgentCard, AgentExtension, AgentKind, Skill, SkillSummary,
};
pub use artifact::Artifact;
pub use context::Context;
pub use did::{AgentDid, DidDocument};
pub use error::A2aError;
pub use feedback::Feedback;
pub use message::{FileContent, Message, Part, Role};
pub use notification::PushNotificationConfig;
pub use structured::{classify_handler_value, ControlState, HandlerOutcome, StructuredResponse};
pub use task::{Task, TaskKind, TaskState};

/// A2A protocol version served by this runtime.
pub const PROTOCOL_VERSION: &str = "1.0.0";
