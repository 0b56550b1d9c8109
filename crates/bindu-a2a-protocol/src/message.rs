//! Message — a single turn in a task's conversation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Metadata keys beginning with this prefix are reserved for the runtime
/// (e.g. `_error` on failed tasks).
pub const RESERVED_METADATA_PREFIX: char = '_';

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The client agent.
    User,
    /// This agent.
    Assistant,
    /// Runtime-injected instructions.
    System,
}

/// A message exchanged during a task.
///
/// `task_id` and `context_id` are back-references; the task manager overwrites
/// them with the resolved ids on submission, and mints `message_id` when the
/// client did not supply one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<Uuid>,
    pub role: Role,
    pub parts: Vec<Part>,
    /// Prior tasks this message depends on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_task_ids: Option<Vec<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Message {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            task_id: None,
            context_id: None,
            role,
            parts,
            reference_task_ids: None,
            metadata: None,
        }
    }

    /// A user message with a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// An assistant message with a single text part.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Part::text(text)])
    }

    /// An assistant message carrying arbitrary parts.
    pub fn assistant(parts: Vec<Part>) -> Self {
        Self::new(Role::Assistant, parts)
    }

    /// Concatenated text content of all text parts.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A part of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    /// Plain text content.
    Text { text: String },
    /// A file, inline (base64) or by reference.
    File { file: FileContent },
    /// Structured data.
    Data { data: Value },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn data(data: Value) -> Self {
        Part::Data { data }
    }

    pub fn file_url(url: impl Into<String>, name: Option<String>) -> Self {
        Part::File {
            file: FileContent {
                name,
                media_type: None,
                url: Some(url.into()),
                data: None,
            },
        }
    }
}

/// File content, inline (base64 in `data`) or by URL reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}
