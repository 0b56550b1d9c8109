//! Agent Card — the self-describing discovery document.
//!
//! Published at `/.well-known/agent.json`. The card carries a summary skill
//! list only (id, name, documentation link); full skill metadata and YAML
//! documentation bodies live behind the `/agent/skills` endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// What this deployment serves: a single agent, a team, or a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    #[default]
    Agent,
    Team,
    Workflow,
}

/// Capability flags declared by the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentCapabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub push_notifications: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<AgentExtension>,
}

/// A protocol extension advertised in the capabilities block (e.g. the DID
/// identity extension).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExtension {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

/// A skill: one documented ability of the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_modes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_modes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    /// Full YAML documentation body; served only by the documentation
    /// endpoint, elided everywhere else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_content: Option<String>,
}

impl Skill {
    /// Detail view: full metadata with the documentation body elided and
    /// replaced by a `has_documentation` flag.
    pub fn detail(&self) -> Value {
        let mut value = serde_json::to_value(self).expect("skill serializes");
        let map = value.as_object_mut().expect("skill is an object");
        let has_documentation = map.remove("documentation_content").is_some();
        map.insert("has_documentation".into(), Value::Bool(has_documentation));
        value
    }
}

/// Summary entry in the agent card's skill list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSummary {
    pub id: String,
    pub name: String,
    pub documentation_path: String,
}

/// The discovery document served at `/.well-known/agent.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub protocol_version: String,
    pub kind: AgentKind,
    pub capabilities: AgentCapabilities,
    pub skills: Vec<SkillSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_trust: Option<Map<String, Value>>,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra_data: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_skill() -> Skill {
        Skill {
            id: "summarize".into(),
            name: "Summarize".into(),
            description: Some("Summarize documents".into()),
            version: Some("1.0.0".into()),
            tags: vec!["text".into()],
            input_modes: vec!["text/plain".into()],
            output_modes: vec!["text/plain".into()],
            examples: vec!["Summarize this article".into()],
            documentation_content: Some("name: summarize\nusage: ...\n".into()),
        }
    }

    #[test]
    fn test_skill_detail_elides_documentation() {
        let detail = sample_skill().detail();
        assert!(detail.get("documentation_content").is_none());
        assert_eq!(detail["has_documentation"], true);

        let mut undocumented = sample_skill();
        undocumented.documentation_content = None;
        assert_eq!(undocumented.detail()["has_documentation"], false);
    }

    #[test]
    fn test_agent_card_serialization() {
        let card = AgentCard {
            id: Uuid::new_v4(),
            name: "echo".into(),
            description: "An echo agent".into(),
            url: "http://localhost:3773".into(),
            version: "0.1.0".into(),
            protocol_version: crate::PROTOCOL_VERSION.into(),
            kind: AgentKind::Agent,
            capabilities: AgentCapabilities::default(),
            skills: vec![SkillSummary {
                id: "echo".into(),
                name: "Echo".into(),
                documentation_path: "http://localhost:3773/agent/skills/echo".into(),
            }],
            agent_trust: None,
            default_input_modes: vec!["text/plain".into(), "application/json".into()],
            default_output_modes: vec!["text/plain".into(), "application/json".into()],
            extra_data: Map::new(),
        };

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["kind"], "agent");
        assert_eq!(json["skills"][0]["id"], "echo");
        assert!(json.get("agent_trust").is_none());
    }
}
