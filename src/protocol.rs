//! A2A wire codec: request envelope, reply payloads, text normalization
//!
//! What this module provides
//! - Pure serialization types and extraction rules for the agent protocol
//!   boundary, decoupled from transports and services
//!
//! Exports
//! - Models
//!   - `MessageSendRequest` / `MessageSendParams` / `A2aMessage` / `TextPart`
//!   - `ReplyPayload::{Task, Message, Unrecognized}` tagged variant
//!   - `AgentCard` capability descriptor
//! - Utils (pure)
//!   - `ReplyPayload::classify(Value)` — explicit shape dispatch, never
//!     reflection-style probing
//!   - `extract_text(&ReplyPayload) -> String` — total; unparseable replies
//!     degrade to a stringified fallback instead of failing
//!
//! Implementation strategy
//! - Replies are classified by their `kind` discriminator (with a `parts`
//!   structural fallback) into an explicit variant before any text is read
//! - Text extraction tries a part's direct `text` field, then the nested
//!   `root.text` field; parts whose text begins with a markup/tag character
//!   are skipped in favor of the next part
//!
//! Testing strategy
//! - Golden-case unit tests per reply shape, including markup skipping and
//!   the stringified fallback for unrecognized payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// JSON-RPC envelope for a `message/send` call against an agent endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSendRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: MessageSendParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSendParams {
    pub message: A2aMessage,
    pub configuration: SendConfiguration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct A2aMessage {
    pub role: String,
    pub parts: Vec<TextPart>,
    pub message_id: String,
    pub context_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPart {
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendConfiguration {
    pub accepted_output_modes: Vec<String>,
}

impl MessageSendRequest {
    /// Build a user-role text message carrying the adapter's logical
    /// conversation id. Request and message ids are fresh per call.
    pub fn user_text(prompt: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Uuid::new_v4().to_string(),
            method: "message/send".to_string(),
            params: MessageSendParams {
                message: A2aMessage {
                    role: "user".to_string(),
                    parts: vec![TextPart {
                        kind: "text".to_string(),
                        text: prompt.into(),
                    }],
                    message_id: Uuid::new_v4().to_string(),
                    context_id: context_id.into(),
                },
                configuration: SendConfiguration {
                    accepted_output_modes: vec!["text".to_string()],
                },
            },
        }
    }
}

/// One part of a reply message. Text may sit directly on the part or nested
/// under `root`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<ReplyPartRoot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyPartRoot {
    #[serde(default)]
    pub text: Option<String>,
}

impl ReplyPart {
    fn candidate_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or_else(|| self.root.as_ref().and_then(|r| r.text.as_deref()))
    }
}

/// The heterogeneous reply shapes an agent endpoint may return, modeled as an
/// explicit variant rather than attribute probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplyPayload {
    /// A still-pending task handle
    Task { id: String },
    /// A structured message with one or more parts
    Message { parts: Vec<ReplyPart> },
    /// Anything else; kept verbatim for the stringified fallback
    Unrecognized(Value),
}

#[derive(Debug, Deserialize)]
struct TaskBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    parts: Vec<ReplyPart>,
}

impl ReplyPayload {
    /// Classify a raw reply value by its `kind` discriminator, falling back
    /// to the structural `parts` check and finally to `Unrecognized`.
    pub fn classify(value: Value) -> Self {
        let kind = value.get("kind").and_then(Value::as_str);
        match kind {
            Some("task") => match serde_json::from_value::<TaskBody>(value.clone()) {
                Ok(body) => ReplyPayload::Task { id: body.id },
                Err(_) => ReplyPayload::Unrecognized(value),
            },
            Some("message") => match serde_json::from_value::<MessageBody>(value.clone()) {
                Ok(body) => ReplyPayload::Message { parts: body.parts },
                Err(_) => ReplyPayload::Unrecognized(value),
            },
            _ => {
                if value.get("parts").is_some() {
                    match serde_json::from_value::<MessageBody>(value.clone()) {
                        Ok(body) => ReplyPayload::Message { parts: body.parts },
                        Err(_) => ReplyPayload::Unrecognized(value),
                    }
                } else {
                    ReplyPayload::Unrecognized(value)
                }
            }
        }
    }
}

/// Resolve a reply payload to a single flat text string. Total: an
/// unrecognized or text-free reply stringifies rather than failing, so the
/// orchestration layer never crashes on an unparseable reply.
pub fn extract_text(payload: &ReplyPayload) -> String {
    match payload {
        ReplyPayload::Task { id } => format!("Task created (id: {})", id),
        ReplyPayload::Message { parts } => {
            for part in parts {
                if let Some(text) = part.candidate_text() {
                    // Markup-prefixed parts are discarded in favor of the
                    // next candidate.
                    if !text.is_empty() && !text.starts_with('<') {
                        return text.to_string();
                    }
                }
            }
            serde_json::to_string(parts).unwrap_or_else(|_| "No response received".to_string())
        }
        ReplyPayload::Unrecognized(value) => value.to_string(),
    }
}

/// Capability descriptor fetched once per adapter at discovery time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentCard {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub url: Option<String>,
    pub capabilities: Option<Value>,
}
