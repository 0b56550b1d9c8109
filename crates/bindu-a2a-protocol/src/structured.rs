//! Structured-response classification.
//!
//! The user handler returns an unconstrained value. By shape it is one of:
//!
//! - a control directive `{"state": "input-required"|"auth-required",
//!   "prompt": "..."}` pausing the task until the client replies,
//! - anything else — a plain answer appended as an assistant message.
//!
//! Handlers backed by LLMs often return the directive as a JSON *string*
//! rather than an object, so classification also tries to parse string
//! values that look like a directive.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Part;

/// The two pause states a handler may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlState {
    InputRequired,
    AuthRequired,
}

/// A handler return value recognized as a state directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub state: ControlState,
    pub prompt: String,
}

/// What the worker does with a handler's return value.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// Append these parts as an assistant message and complete the task.
    Reply(Vec<Part>),
    /// Append the prompt and pause the task in the directive's state.
    Control(StructuredResponse),
}

/// Classify a handler return value by shape.
pub fn classify_handler_value(value: Value) -> HandlerOutcome {
    match value {
        Value::String(text) => {
            // LLM handlers return directives as JSON text
            if let Some(directive) = parse_directive_text(&text) {
                return HandlerOutcome::Control(directive);
            }
            HandlerOutcome::Reply(vec![Part::text(text)])
        }
        Value::Object(ref map) => {
            if map.contains_key("state") {
                if let Ok(directive) = serde_json::from_value::<StructuredResponse>(value.clone()) {
                    return HandlerOutcome::Control(directive);
                }
            }
            HandlerOutcome::Reply(vec![Part::data(value)])
        }
        Value::Null => HandlerOutcome::Reply(vec![Part::text("")]),
        other => HandlerOutcome::Reply(vec![Part::data(other)]),
    }
}

fn parse_directive_text(text: &str) -> Option<StructuredResponse> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    if value.get("state").is_none() {
        return None;
    }
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_text_reply() {
        match classify_handler_value(json!("hello there")) {
            HandlerOutcome::Reply(parts) => {
                assert!(matches!(&parts[0], Part::Text { text } if text == "hello there"));
            }
            _ => panic!("expected reply"),
        }
    }

    #[test]
    fn test_object_directive() {
        let value = json!({"state": "input-required", "prompt": "What is your name?"});
        match classify_handler_value(value) {
            HandlerOutcome::Control(d) => {
                assert_eq!(d.state, ControlState::InputRequired);
                assert_eq!(d.prompt, "What is your name?");
            }
            _ => panic!("expected control directive"),
        }
    }

    #[test]
    fn test_stringified_directive() {
        let value = json!("{\"state\": \"auth-required\", \"prompt\": \"Sign in first\"}");
        match classify_handler_value(value) {
            HandlerOutcome::Control(d) => assert_eq!(d.state, ControlState::AuthRequired),
            _ => panic!("expected control directive"),
        }
    }

    #[test]
    fn test_object_with_unrelated_state_key() {
        // "state" with a non-directive value is plain data, not a directive
        let value = json!({"state": "California", "population": 39_000_000});
        match classify_handler_value(value) {
            HandlerOutcome::Reply(parts) => {
                assert!(matches!(parts[0], Part::Data { .. }));
            }
            _ => panic!("expected reply"),
        }
    }

    #[test]
    fn test_structured_reply() {
        let value = json!({"answer": 42, "confidence": 0.9});
        match classify_handler_value(value) {
            HandlerOutcome::Reply(parts) => assert!(matches!(parts[0], Part::Data { .. })),
            _ => panic!("expected reply"),
        }
    }

    #[test]
    fn test_text_that_merely_mentions_state() {
        match classify_handler_value(json!("the state of the union is strong")) {
            HandlerOutcome::Reply(_) => {}
            _ => panic!("expected reply"),
        }
    }
}
