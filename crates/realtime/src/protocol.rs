//! Defines the JSON event frames exchanged with the remote agent over the
//! data channel.

use kiosk_core::ToolSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events sent from the kiosk to the remote agent.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Registers instructions and tool declarations for the session.
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionUpdate },
    /// Appends an item (e.g. typed user input) to the conversation.
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
    /// Asks the remote agent to produce a response.
    #[serde(rename = "response.create")]
    ResponseCreate,
    /// The result of a function call, addressed by its call id.
    #[serde(rename = "tool.output")]
    ToolOutput { call_id: String, output: String },
}

#[derive(Serialize, Debug, Clone)]
pub struct SessionUpdate {
    pub instructions: String,
    pub tools: Vec<ToolSpec>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl ConversationItem {
    /// A user message carrying typed text.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            kind: "message".to_string(),
            role: "user".to_string(),
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
}

/// The inbound events this client acts on. Everything else is only logged.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "response.function_call.delta")]
    FunctionCallDelta { delta: FunctionCallDelta },
    #[serde(rename = "response.function_call.completed")]
    FunctionCallCompleted {
        #[serde(default)]
        call_id: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// One streamed fragment of a function call.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FunctionCallDelta {
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl ServerEvent {
    /// Classifies a parsed frame. Frames that do not fit a recognised shape
    /// are `Other`.
    pub fn classify(frame: &Value) -> Self {
        Self::deserialize(frame).unwrap_or(Self::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_events_serialize_with_type_tags() {
        let create = ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text("hello"),
        };
        assert_eq!(
            serde_json::to_value(&create).unwrap(),
            json!({
                "type": "conversation.item.create",
                "item": {
                    "type": "message",
                    "role": "user",
                    "content": [{ "type": "input_text", "text": "hello" }],
                },
            })
        );
        assert_eq!(
            serde_json::to_value(ClientEvent::ResponseCreate).unwrap(),
            json!({ "type": "response.create" })
        );
        assert_eq!(
            serde_json::to_value(ClientEvent::ToolOutput {
                call_id: "call_1".into(),
                output: "{\"ok\":true}".into(),
            })
            .unwrap(),
            json!({ "type": "tool.output", "call_id": "call_1", "output": "{\"ok\":true}" })
        );
    }

    #[test]
    fn classifies_function_call_frames() {
        let delta = json!({
            "type": "response.function_call.delta",
            "delta": { "call_id": "c1", "name": "add_item", "arguments": "{\"id\"" },
        });
        assert_eq!(
            ServerEvent::classify(&delta),
            ServerEvent::FunctionCallDelta {
                delta: FunctionCallDelta {
                    call_id: Some("c1".into()),
                    name: Some("add_item".into()),
                    arguments: Some("{\"id\"".into()),
                },
            }
        );

        let completed = json!({ "type": "response.function_call.completed", "call_id": "c1" });
        assert_eq!(
            ServerEvent::classify(&completed),
            ServerEvent::FunctionCallCompleted {
                call_id: Some("c1".into())
            }
        );
    }

    #[test]
    fn unrecognised_or_malformed_frames_are_other() {
        assert_eq!(
            ServerEvent::classify(&json!({ "type": "response.audio.delta", "delta": "AAAA" })),
            ServerEvent::Other
        );
        assert_eq!(
            ServerEvent::classify(&json!({ "type": "response.function_call.delta" })),
            ServerEvent::Other
        );
        assert_eq!(ServerEvent::classify(&json!({ "no_type": 1 })), ServerEvent::Other);
    }
}
