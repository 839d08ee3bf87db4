//! Event Bus
//!
//! Append-only, process-local log of every protocol event observed in either
//! direction, used for diagnostics and transcript reconstruction. Two
//! producers (the outbound send path and the inbound dispatcher), one
//! consumer (the diagnostics pane). No deletion, no reordering.

use crate::models::{EventDirection, EventLogEntry, now_ms};

#[derive(Debug, Default)]
pub struct EventBus {
    entries: Vec<EventLogEntry>,
    sent: u64,
    failed: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[EventLogEntry] {
        &self.entries
    }

    /// Outbound protocol events successfully handed to the data channel.
    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    /// Outbound send attempts dropped because the channel was not open.
    pub fn failed_count(&self) -> u64 {
        self.failed
    }

    /// Records a successful outbound protocol send.
    pub fn log_outbound(&mut self, event_type: &str, payload: serde_json::Value) -> EventLogEntry {
        self.sent += 1;
        self.append(EventDirection::Client, event_type, payload)
    }

    /// Records a send attempt that was dropped (channel not open). The
    /// attempt is logged as an error entry rather than surfaced as a failure
    /// to the caller.
    pub fn log_outbound_failed(
        &mut self,
        event_type: &str,
        payload: serde_json::Value,
    ) -> EventLogEntry {
        self.failed += 1;
        self.append(
            EventDirection::Client,
            "error.data_channel_not_open",
            serde_json::json!({ "attempted_event": event_type, "payload": payload }),
        )
    }

    /// Records a client-side lifecycle marker (pause, resume, mute, connect
    /// progress). Markers are not protocol sends and touch neither counter.
    pub fn log_marker(&mut self, event_type: &str, payload: serde_json::Value) -> EventLogEntry {
        self.append(EventDirection::Client, event_type, payload)
    }

    /// Records an inbound protocol event.
    pub fn log_server(&mut self, event_type: &str, payload: serde_json::Value) -> EventLogEntry {
        self.append(EventDirection::Server, event_type, payload)
    }

    fn append(
        &mut self,
        direction: EventDirection,
        event_type: &str,
        payload: serde_json::Value,
    ) -> EventLogEntry {
        let entry = EventLogEntry {
            direction,
            timestamp_ms: now_ms(),
            event_type: event_type.to_string(),
            payload,
        };
        self.entries.push(entry.clone());
        entry
    }
}
