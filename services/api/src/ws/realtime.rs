//! Upstream realtime wire protocol.
//!
//! JSON text frames in both directions, each carrying a `type` tag. Outbound
//! events are a closed enum serialized with their wire type names; inbound
//! frames parse into a closed enum of the kinds the dispatcher understands,
//! with an explicit `Unknown` arm so new server event types pass through to
//! the event log instead of breaking the session.

use crate::error::SessionError;
use interview_core::agent::ToolSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Outbound (client) events ---

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
    #[serde(rename = "response.create")]
    ResponseCreate,
    #[serde(rename = "response.cancel")]
    ResponseCancel,
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: i64,
    },
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear,
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
}

impl ClientEvent {
    /// The wire type tag, used for event-log entries.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ResponseCreate => "response.create",
            ClientEvent::ResponseCancel => "response.cancel",
            ClientEvent::ConversationItemTruncate { .. } => "conversation.item.truncate",
            ClientEvent::InputAudioBufferClear => "input_audio_buffer.clear",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
        }
    }
}

/// The declarative session configuration pushed on connect and on every
/// agent handoff.
#[derive(Serialize, Debug, Clone)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: AudioTranscription,
    pub turn_detection: TurnDetection,
    pub tools: Vec<SessionTool>,
}

#[derive(Serialize, Debug, Clone)]
pub struct AudioTranscription {
    pub model: String,
}

/// Server-side voice-activity turn detection parameters.
#[derive(Serialize, Debug, Clone)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    pub create_response: bool,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            kind: "server_vad".to_string(),
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 200,
            create_response: true,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct SessionTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolSpec> for SessionTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            kind: "function".to_string(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.parameters.clone(),
        }
    }
}

/// A conversation item as it appears on the wire, in both directions.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ConversationItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ConversationItem {
    /// A user text message with a client-assigned id.
    pub fn user_text(id: &str, text: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            kind: "message".to_string(),
            role: Some("user".to_string()),
            content: vec![ContentPart {
                kind: "input_text".to_string(),
                text: Some(text.to_string()),
                transcript: None,
            }],
            ..Default::default()
        }
    }

    /// The result item answering a model function call.
    pub fn function_output(call_id: &str, output: &Value) -> Self {
        Self {
            kind: "function_call_output".to_string(),
            call_id: Some(call_id.to_string()),
            output: Some(output.to_string()),
            ..Default::default()
        }
    }

    /// First text or transcript fragment of the item's content, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find_map(|part| part.text.as_deref().or(part.transcript.as_deref()))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

// --- Inbound (server) events ---

/// The server event kinds the dispatcher acts on. Anything else arrives as
/// `Unknown` and is logged untouched.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    SessionCreated {
        session_id: Option<String>,
    },
    ConversationItemCreated {
        item: ConversationItem,
    },
    InputAudioTranscriptionCompleted {
        item_id: String,
        transcript: Option<String>,
    },
    AudioTranscriptDelta {
        item_id: String,
        delta: String,
    },
    AudioDelta {
        delta: String,
    },
    OutputItemDone {
        item: ConversationItem,
    },
    FunctionCallArgumentsDone {
        call_id: String,
        name: String,
        arguments: String,
    },
    Error {
        message: String,
    },
    Unknown {
        event_type: String,
        payload: Value,
    },
}

#[derive(Deserialize)]
struct SessionCreatedPayload {
    #[serde(default)]
    session: Option<SessionInfo>,
}

#[derive(Deserialize)]
struct SessionInfo {
    id: Option<String>,
}

#[derive(Deserialize)]
struct ItemPayload {
    item: ConversationItem,
}

#[derive(Deserialize)]
struct TranscriptionCompletedPayload {
    item_id: String,
    #[serde(default)]
    transcript: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptDeltaPayload {
    item_id: String,
    delta: String,
}

#[derive(Deserialize)]
struct AudioDeltaPayload {
    delta: String,
}

#[derive(Deserialize)]
struct FunctionCallDonePayload {
    call_id: String,
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl ServerEvent {
    /// Parses one inbound JSON frame. A frame with a recognized type but a
    /// malformed body is a `ProtocolError`; an unrecognized type is passed
    /// through as `Unknown`.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| SessionError::Protocol(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, SessionError> {
        let event_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| SessionError::Protocol("event is missing a type tag".to_string()))?
            .to_string();

        let malformed =
            |e: serde_json::Error| SessionError::Protocol(format!("{event_type}: {e}"));

        let event = match event_type.as_str() {
            "session.created" => {
                let p: SessionCreatedPayload = serde_json::from_value(value).map_err(malformed)?;
                ServerEvent::SessionCreated {
                    session_id: p.session.and_then(|s| s.id),
                }
            }
            "conversation.item.created" => {
                let p: ItemPayload = serde_json::from_value(value).map_err(malformed)?;
                ServerEvent::ConversationItemCreated { item: p.item }
            }
            "conversation.item.input_audio_transcription.completed" => {
                let p: TranscriptionCompletedPayload =
                    serde_json::from_value(value).map_err(malformed)?;
                ServerEvent::InputAudioTranscriptionCompleted {
                    item_id: p.item_id,
                    transcript: p.transcript,
                }
            }
            "response.audio_transcript.delta" => {
                let p: TranscriptDeltaPayload =
                    serde_json::from_value(value).map_err(malformed)?;
                ServerEvent::AudioTranscriptDelta {
                    item_id: p.item_id,
                    delta: p.delta,
                }
            }
            "response.audio.delta" => {
                let p: AudioDeltaPayload = serde_json::from_value(value).map_err(malformed)?;
                ServerEvent::AudioDelta { delta: p.delta }
            }
            "response.output_item.done" => {
                let p: ItemPayload = serde_json::from_value(value).map_err(malformed)?;
                ServerEvent::OutputItemDone { item: p.item }
            }
            "response.function_call_arguments.done" => {
                let p: FunctionCallDonePayload =
                    serde_json::from_value(value).map_err(malformed)?;
                ServerEvent::FunctionCallArgumentsDone {
                    call_id: p.call_id,
                    name: p.name,
                    arguments: p.arguments,
                }
            }
            "error" => {
                let p: ErrorPayload = serde_json::from_value(value).map_err(malformed)?;
                ServerEvent::Error {
                    message: p.error.message,
                }
            }
            _ => ServerEvent::Unknown {
                event_type: event_type.clone(),
                payload: value,
            },
        };
        Ok(event)
    }

    pub fn event_type(&self) -> &str {
        match self {
            ServerEvent::SessionCreated { .. } => "session.created",
            ServerEvent::ConversationItemCreated { .. } => "conversation.item.created",
            ServerEvent::InputAudioTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            ServerEvent::AudioTranscriptDelta { .. } => "response.audio_transcript.delta",
            ServerEvent::AudioDelta { .. } => "response.audio.delta",
            ServerEvent::OutputItemDone { .. } => "response.output_item.done",
            ServerEvent::FunctionCallArgumentsDone { .. } => {
                "response.function_call_arguments.done"
            }
            ServerEvent::Error { .. } => "error",
            ServerEvent::Unknown { event_type, .. } => event_type,
        }
    }
}
