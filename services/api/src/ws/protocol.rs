//! Browser-facing WebSocket protocol.
//!
//! The browser sends small JSON control messages (plus binary PCM16 mic
//! frames, handled outside this module); the server pushes status changes,
//! transcript upserts, event-log entries, and playback audio.

use crate::models::{EventLogEntry, SessionStatus, TranscriptItem};
use serde::{Deserialize, Serialize};

/// Control intents from the browser.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start a session. `mic_granted` reflects the browser's microphone
    /// permission result.
    Connect {
        #[serde(default = "default_true")]
        mic_granted: bool,
    },
    /// Pause a connected session, resume a paused one, or connect a
    /// disconnected one.
    Toggle,
    ToggleMute,
    SendText {
        text: String,
    },
    /// Barge-in: cut off the in-flight assistant response.
    Cancel,
}

fn default_true() -> bool {
    true
}

/// Server pushes to the browser.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status {
        status: SessionStatus,
        mic_muted: bool,
        active_agent: String,
    },
    /// A transcript item was created or mutated; the browser replaces its
    /// copy wholesale by `item_id`.
    TranscriptUpsert {
        item: TranscriptItem,
    },
    EventLogged {
        entry: EventLogEntry,
    },
    /// Base64 PCM16 playback audio, forwarded from the model.
    AudioChunk {
        data: String,
    },
    Error {
        message: String,
    },
}
