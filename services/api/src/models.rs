//! API Models
//!
//! Core data structures shared between the orchestrator, the browser-facing
//! WebSocket protocol, and the REST surface. REST-exposed types carry
//! `utoipa` schema annotations for the generated OpenAPI documentation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// The four-state connection lifecycle of a session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Paused,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Disconnected => write!(f, "disconnected"),
            SessionStatus::Connecting => write!(f, "connecting"),
            SessionStatus::Connected => write!(f, "connected"),
            SessionStatus::Paused => write!(f, "paused"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Message,
    Breadcrumb,
    FunctionCall,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    InProgress,
    Done,
}

/// One entry in the conversation transcript.
///
/// Items are keyed by `item_id`, which stays stable across streaming
/// updates: deltas and status changes mutate the item in place. Items are
/// never removed, only marked done or hidden.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TranscriptItem {
    pub item_id: String,
    pub role: Role,
    pub kind: ItemKind,
    pub text: String,
    pub status: ItemStatus,
    /// Hidden items (like the synthetic greeting) are kept for protocol
    /// consistency but not rendered.
    pub hidden: bool,
    /// Structured payload for breadcrumbs (agent configs, tool calls).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub created_at_ms: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventDirection {
    Client,
    Server,
}

/// One observed protocol message, appended to the diagnostics event log.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EventLogEntry {
    pub direction: EventDirection,
    pub timestamp_ms: i64,
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Persisted UI preference: whether the diagnostics log pane is expanded.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiPrefs {
    #[schema(example = true)]
    pub logs_expanded: bool,
}

impl Default for UiPrefs {
    fn default() -> Self {
        Self {
            logs_expanded: true,
        }
    }
}

/// Roster listing entry for the pre-connect screen.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct AgentSummary {
    #[schema(example = "introduction")]
    pub id: String,
    pub public_description: String,
    pub downstream_agent_ids: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

/// Current wall-clock time in milliseconds, the timestamp unit used across
/// the transcript and event log.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Disconnected).unwrap(),
            "\"disconnected\""
        );
        let status: SessionStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(status, SessionStatus::Paused);
    }

    #[test]
    fn session_status_display() {
        assert_eq!(SessionStatus::Connecting.to_string(), "connecting");
        assert_eq!(SessionStatus::Connected.to_string(), "connected");
    }

    #[test]
    fn transcript_item_omits_empty_data() {
        let item = TranscriptItem {
            item_id: "abc".into(),
            role: Role::User,
            kind: ItemKind::Message,
            text: "hello".into(),
            status: ItemStatus::Done,
            hidden: false,
            data: None,
            created_at_ms: 0,
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("\"data\""));
        assert!(json.contains("\"in_progress\"") == false);
        assert!(json.contains("\"done\""));
    }

    #[test]
    fn event_log_entry_round_trips() {
        let entry = EventLogEntry {
            direction: EventDirection::Server,
            timestamp_ms: 42,
            event_type: "response.created".into(),
            payload: serde_json::json!({"type": "response.created"}),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: EventLogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.direction, EventDirection::Server);
        assert_eq!(back.event_type, "response.created");
    }

    #[test]
    fn prefs_default_expands_logs() {
        assert!(UiPrefs::default().logs_expanded);
    }
}
