//! Agent manifest — the deployment's identity and declared surface.
//!
//! Assembled by the builder from user configuration; the agent card, skill
//! endpoints and DID document are all views over it.

use bindu_a2a_protocol::{
    AgentCapabilities, AgentCard, AgentDid, AgentKind, Skill, SkillSummary, PROTOCOL_VERSION,
};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The identity and metadata of a deployed agent.
#[derive(Debug, Clone)]
pub struct AgentManifest {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub version: String,
    pub url: String,
    pub kind: AgentKind,
    pub capabilities: AgentCapabilities,
    pub skills: Vec<Skill>,
    pub did: Option<AgentDid>,
    pub agent_trust: Option<Map<String, Value>>,
    pub extra_metadata: Map<String, Value>,
}

impl AgentManifest {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            version: "1.0.0".to_string(),
            url: "http://127.0.0.1:3773".to_string(),
            kind: AgentKind::Agent,
            capabilities: AgentCapabilities::default(),
            skills: Vec::new(),
            did: None,
            agent_trust: None,
            extra_metadata: Map::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_kind(mut self, kind: AgentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Load a skill from its `skill.yaml` definition. The raw document is
    /// kept verbatim as the skill's documentation body.
    pub fn with_skill_yaml(self, yaml: &str) -> Result<Self, serde_yml::Error> {
        let mut skill: Skill = serde_yml::from_str(yaml)?;
        skill.documentation_content = Some(yaml.to_string());
        Ok(self.with_skill(skill))
    }

    pub fn with_did(mut self, did: AgentDid) -> Self {
        self.did = Some(did);
        self
    }

    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_agent_trust(mut self, trust: Map<String, Value>) -> Self {
        self.agent_trust = Some(trust);
        self
    }

    /// Find a skill by id.
    pub fn find_skill(&self, skill_id: &str) -> Option<&Skill> {
        self.skills.iter().find(|s| s.id == skill_id)
    }

    /// Build the discovery agent card. Skills are reduced to
    /// (id, name, documentation link); full metadata lives behind
    /// `/agent/skills/{id}`.
    pub fn agent_card(&self) -> AgentCard {
        let skills = self
            .skills
            .iter()
            .map(|s| SkillSummary {
                id: s.id.clone(),
                name: s.name.clone(),
                documentation_path: format!("{}/agent/skills/{}", self.url, s.id),
            })
            .collect();

        let mut capabilities = self.capabilities.clone();
        if let Some(ref did) = self.did {
            capabilities
                .extensions
                .push(bindu_a2a_protocol::AgentExtension {
                    uri: did.did.clone(),
                    description: Some(format!("DID-based identity for {}", self.name)),
                    required: false,
                    params: None,
                });
        }

        AgentCard {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            version: self.version.clone(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            kind: self.kind,
            capabilities,
            skills,
            agent_trust: self.agent_trust.clone(),
            default_input_modes: vec!["text/plain".into(), "application/json".into()],
            default_output_modes: vec!["text/plain".into(), "application/json".into()],
            extra_data: self.extra_metadata.clone(),
        }
    }
}
