//! Artifact — a structured output produced by a task.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::message::Part;

/// An opaque structured output attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Artifact {
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            artifact_id: Uuid::new_v4(),
            name: None,
            parts,
            metadata: None,
        }
    }

    pub fn named(name: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(parts)
        }
    }

    /// An artifact wrapping a single structured value.
    pub fn from_data(data: Value) -> Self {
        Self::new(vec![Part::data(data)])
    }
}
