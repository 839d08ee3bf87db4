//! Inbound server-event dispatch.
//!
//! Every upstream frame lands here: it is logged, parsed into a typed
//! `ServerEvent`, and applied to the session. Malformed frames and unknown
//! event types are recorded and skipped; they never tear the session down.

use super::realtime::{ClientEvent, ConversationItem, ServerEvent};
use super::session::SessionController;
use crate::error::SessionError;
use crate::models::{ItemStatus, Role};
use interview_core::agent::TRANSFER_TOOL_PREFIX;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

/// Applies one raw upstream frame to the session.
pub(crate) fn handle_frame(session: &mut SessionController, raw: &str) {
    match ServerEvent::parse(raw) {
        Ok(event) => {
            let payload: Value = serde_json::from_str(raw).unwrap_or(Value::Null);
            let entry = session.events.log_server(event.event_type(), payload);
            session.push_entry(entry);
            dispatch(session, event);
        }
        Err(e) => {
            warn!(error = %e, "dropping malformed upstream frame");
            let entry = session
                .events
                .log_marker(e.kind(), json!({ "message": e.to_string() }));
            session.push_entry(entry);
        }
    }
}

fn dispatch(session: &mut SessionController, event: ServerEvent) {
    match event {
        ServerEvent::SessionCreated { session_id } => {
            let item = session
                .transcript
                .add_breadcrumb("Session started", Some(json!({ "session_id": session_id })))
                .clone();
            session.push_item(item);
        }
        ServerEvent::ConversationItemCreated { item } => on_item_created(session, item),
        ServerEvent::InputAudioTranscriptionCompleted {
            item_id,
            transcript,
        } => on_transcription_completed(session, &item_id, transcript),
        ServerEvent::AudioTranscriptDelta { item_id, delta } => {
            if let Some(item) = session
                .transcript
                .append_delta(&item_id, Role::Assistant, &delta)
            {
                let item = item.clone();
                session.push_item(item);
            }
        }
        ServerEvent::AudioDelta { delta } => {
            session.push_ui(super::protocol::ServerMessage::AudioChunk { data: delta });
        }
        ServerEvent::OutputItemDone { item } => {
            if let Some(id) = item.id.as_deref() {
                if let Some(done) = session.transcript.mark_done(id) {
                    let done = done.clone();
                    session.push_item(done);
                }
            }
        }
        ServerEvent::FunctionCallArgumentsDone {
            call_id,
            name,
            arguments,
        } => on_function_call(session, &call_id, &name, &arguments),
        ServerEvent::Error { message } => {
            // Upstream errors are advisory; the session keeps running.
            error!(message, "upstream reported an error");
        }
        ServerEvent::Unknown { event_type, .. } => {
            debug!(event_type, "ignoring unhandled server event");
        }
    }
}

fn on_item_created(session: &mut SessionController, item: ConversationItem) {
    if item.kind != "message" {
        return;
    }
    let Some(role) = role_from_wire(item.role.as_deref()) else {
        debug!(?item.role, "skipping item with unrecognized role");
        return;
    };
    let Some(id) = item.id.as_deref() else {
        return;
    };
    let status = if item.status.as_deref() == Some("completed") {
        ItemStatus::Done
    } else {
        ItemStatus::InProgress
    };
    let text = item.first_text().unwrap_or_default().to_string();
    let stored = session
        .transcript
        .add_message(id, role, &text, status, false)
        .clone();
    session.push_item(stored);
}

fn on_transcription_completed(
    session: &mut SessionController,
    item_id: &str,
    transcript: Option<String>,
) {
    // Whisper returns an empty string for unintelligible audio.
    let text = transcript
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("[inaudible]");
    if session.transcript.set_text(item_id, text).is_none() {
        debug!(item_id, "transcription for unknown item");
        return;
    }
    session.transcript.mark_done(item_id);
    if let Some(item) = session.transcript.get(item_id) {
        let item = item.clone();
        session.push_item(item);
    }
}

fn on_function_call(session: &mut SessionController, call_id: &str, name: &str, arguments: &str) {
    let args: Value = serde_json::from_str(arguments).unwrap_or_else(|e| {
        warn!(name, error = %e, "unparseable function-call arguments");
        json!({})
    });
    if let Some(target) = name.strip_prefix(TRANSFER_TOOL_PREFIX) {
        let target = target.to_string();
        transfer(session, call_id, &target, args);
        return;
    }

    // Non-transfer tools are recorded and acknowledged so the model moves on.
    let item = session
        .transcript
        .add_function_call(call_id, name, Some(args))
        .clone();
    session.push_item(item);
    let output = json!({ "result": true });
    session.send_client_event(ClientEvent::ConversationItemCreate {
        item: ConversationItem::function_output(call_id, &output),
    });
    session.send_client_event(ClientEvent::ResponseCreate);
}

/// Hands the session off to `target` if the active agent lists it
/// downstream. A rejected handoff answers the tool call with
/// `did_transfer: false` and leaves the active agent unchanged.
fn transfer(session: &mut SessionController, call_id: &str, target: &str, args: Value) {
    let allowed = session
        .roster
        .get(&session.active_agent_id)
        .map(|agent| agent.can_transfer_to(target))
        .unwrap_or(false);

    if !allowed {
        let err = SessionError::TransferRejected {
            target: target.to_string(),
            from: session.active_agent_id.clone(),
        };
        warn!(error = %err, "refusing agent handoff");
        let entry = session.events.log_marker(
            err.kind(),
            json!({ "target": target, "from": session.active_agent_id }),
        );
        session.push_entry(entry);
        let output = json!({ "did_transfer": false, "reason": err.to_string() });
        session.send_client_event(ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_output(call_id, &output),
        });
        return;
    }

    session.active_agent_id = target.to_string();
    let data = session
        .roster
        .get(target)
        .and_then(|agent| serde_json::to_value(agent).ok());
    let item = session
        .transcript
        .add_breadcrumb(&format!("Agent: {target}"), data)
        .clone();
    session.push_item(item);
    session.push_status();

    let output = json!({ "did_transfer": true, "destination_agent": target, "arguments": args });
    session.send_client_event(ClientEvent::ConversationItemCreate {
        item: ConversationItem::function_output(call_id, &output),
    });
    // Reconfigure under the new agent before asking it to speak.
    session.configure(false);
    session.send_client_event(ClientEvent::ResponseCreate);
}

fn role_from_wire(role: Option<&str>) -> Option<Role> {
    match role {
        Some("user") => Some(Role::User),
        Some("assistant") => Some(Role::Assistant),
        Some("system") => Some(Role::System),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{ItemKind, SessionStatus};
    use crate::ws::protocol::ServerMessage;
    use crate::ws::transport::Transport;
    use interview_core::agent::{Agent, AgentRoster};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tracing::Level;

    fn chain_roster() -> Arc<AgentRoster> {
        Arc::new(
            AgentRoster::new(vec![
                Agent::new("introduction", "opening phase")
                    .with_instructions("Open the interview.")
                    .with_downstream(&["experience"]),
                Agent::new("experience", "resume deep-dive")
                    .with_instructions("Dig into past roles.")
                    .with_downstream(&["behavioral"]),
                Agent::new("behavioral", "behavioral questions")
                    .with_instructions("Ask behavioral questions."),
            ])
            .unwrap(),
        )
    }

    fn controller() -> (
        SessionController,
        mpsc::UnboundedReceiver<ServerMessage>,
        mpsc::UnboundedReceiver<ClientEvent>,
    ) {
        let config = Arc::new(Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            session_endpoint: "http://127.0.0.1:1/session".to_string(),
            realtime_url: "ws://127.0.0.1:1/realtime".to_string(),
            voice: "coral".to_string(),
            prompts_path: "./prompts".into(),
            prefs_path: "./prefs.json".into(),
            connect_timeout: Duration::from_millis(200),
            log_level: Level::INFO,
        });
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let mut session =
            SessionController::new(chain_roster(), config, reqwest::Client::new(), ui_tx);
        let (wire_tx, wire_rx) = mpsc::unbounded_channel();
        session.transport = Some(Transport::new(wire_tx));
        session.status = SessionStatus::Connected;
        (session, ui_rx, wire_rx)
    }

    fn wire_types(wire: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Vec<&'static str> {
        let mut types = Vec::new();
        while let Ok(event) = wire.try_recv() {
            types.push(event.event_type());
        }
        types
    }

    #[tokio::test]
    async fn streaming_deltas_concatenate_in_arrival_order() {
        let (mut session, _ui, _wire) = controller();
        for delta in ["Tell ", "me ", "about ", "yourself"] {
            let frame = json!({
                "type": "response.audio_transcript.delta",
                "item_id": "a1",
                "delta": delta,
            });
            handle_frame(&mut session, &frame.to_string());
        }
        assert_eq!(
            session.transcript.get("a1").unwrap().text,
            "Tell me about yourself"
        );
        assert_eq!(session.events.entries().len(), 4);
    }

    #[tokio::test]
    async fn duplicate_done_frames_are_idempotent() {
        let (mut session, mut ui, _wire) = controller();
        handle_frame(
            &mut session,
            &json!({"type": "response.audio_transcript.delta", "item_id": "a1", "delta": "answer"})
                .to_string(),
        );
        let done = json!({"type": "response.output_item.done", "item": {"id": "a1", "type": "message"}})
            .to_string();
        handle_frame(&mut session, &done);
        handle_frame(&mut session, &done);

        assert_eq!(
            session.transcript.get("a1").unwrap().status,
            ItemStatus::Done
        );
        // One upsert for the delta, one for the transition to done, none for
        // the duplicate.
        let upserts = {
            let mut count = 0;
            while let Ok(msg) = ui.try_recv() {
                if matches!(msg, ServerMessage::TranscriptUpsert { .. }) {
                    count += 1;
                }
            }
            count
        };
        assert_eq!(upserts, 2);
    }

    #[tokio::test]
    async fn item_created_registers_user_message() {
        let (mut session, _ui, _wire) = controller();
        let frame = json!({
            "type": "conversation.item.created",
            "item": {
                "id": "u1",
                "type": "message",
                "role": "user",
                "content": [{"type": "input_audio", "transcript": null}],
            },
        });
        handle_frame(&mut session, &frame.to_string());
        let item = session.transcript.get("u1").unwrap();
        assert_eq!(item.role, Role::User);
        assert_eq!(item.status, ItemStatus::InProgress);
        assert_eq!(item.text, "");
    }

    #[tokio::test]
    async fn empty_transcription_falls_back_to_inaudible() {
        let (mut session, _ui, _wire) = controller();
        handle_frame(
            &mut session,
            &json!({
                "type": "conversation.item.created",
                "item": {"id": "u1", "type": "message", "role": "user"},
            })
            .to_string(),
        );
        handle_frame(
            &mut session,
            &json!({
                "type": "conversation.item.input_audio_transcription.completed",
                "item_id": "u1",
                "transcript": " \n",
            })
            .to_string(),
        );
        let item = session.transcript.get("u1").unwrap();
        assert_eq!(item.text, "[inaudible]");
        assert_eq!(item.status, ItemStatus::Done);
    }

    #[tokio::test]
    async fn handoffs_follow_downstream_links_only() {
        let (mut session, _ui, mut wire) = controller();

        let call = |name: &str, call_id: &str| {
            json!({
                "type": "response.function_call_arguments.done",
                "call_id": call_id,
                "name": name,
                "arguments": "{\"rationale_for_transfer\": \"next phase\", \"conversation_context\": \"ctx\"}",
            })
            .to_string()
        };

        handle_frame(&mut session, &call("transfer_to_experience", "c1"));
        assert_eq!(session.active_agent_id, "experience");

        handle_frame(&mut session, &call("transfer_to_behavioral", "c2"));
        assert_eq!(session.active_agent_id, "behavioral");
        wire_types(&mut wire);

        // behavioral has no downstream links; going back is refused.
        handle_frame(&mut session, &call("transfer_to_experience", "c3"));
        assert_eq!(session.active_agent_id, "behavioral");
        assert!(
            session
                .events
                .entries()
                .iter()
                .any(|e| e.event_type == "error.transfer_rejected")
        );
        // The refusal still answers the tool call, but nothing else goes out.
        let types = wire_types(&mut wire);
        assert_eq!(types, vec!["conversation.item.create"]);
    }

    #[tokio::test]
    async fn accepted_handoff_reconfigures_the_session() {
        let (mut session, _ui, mut wire) = controller();
        handle_frame(
            &mut session,
            &json!({
                "type": "response.function_call_arguments.done",
                "call_id": "c1",
                "name": "transfer_to_experience",
                "arguments": "{}",
            })
            .to_string(),
        );

        match wire.try_recv().unwrap() {
            ClientEvent::ConversationItemCreate { item } => {
                assert_eq!(item.kind, "function_call_output");
                let output: Value =
                    serde_json::from_str(item.output.as_deref().unwrap()).unwrap();
                assert_eq!(output["did_transfer"], true);
                assert_eq!(output["destination_agent"], "experience");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            wire.try_recv().unwrap(),
            ClientEvent::InputAudioBufferClear
        ));
        match wire.try_recv().unwrap() {
            ClientEvent::SessionUpdate { session: config } => {
                assert_eq!(config.instructions, "Dig into past roles.");
                assert!(
                    config
                        .tools
                        .iter()
                        .any(|t| t.name == "transfer_to_behavioral")
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(wire.try_recv().unwrap(), ClientEvent::ResponseCreate));
    }

    #[tokio::test]
    async fn non_transfer_tool_calls_are_acknowledged() {
        let (mut session, _ui, mut wire) = controller();
        handle_frame(
            &mut session,
            &json!({
                "type": "response.function_call_arguments.done",
                "call_id": "c1",
                "name": "lookup_role_description",
                "arguments": "{\"role\": \"backend\"}",
            })
            .to_string(),
        );
        let types = wire_types(&mut wire);
        assert_eq!(types, vec!["conversation.item.create", "response.create"]);

        let item = session.transcript.get("c1").unwrap();
        assert_eq!(item.kind, ItemKind::FunctionCall);
        assert_eq!(item.text, "lookup_role_description");
        assert_eq!(item.data.as_ref().unwrap()["role"], "backend");
    }

    #[tokio::test]
    async fn audio_deltas_are_forwarded_to_the_browser() {
        let (mut session, mut ui, _wire) = controller();
        handle_frame(
            &mut session,
            &json!({"type": "response.audio.delta", "delta": "AAAA"}).to_string(),
        );
        let forwarded = std::iter::from_fn(|| ui.try_recv().ok())
            .any(|msg| matches!(&msg, ServerMessage::AudioChunk { data } if data == "AAAA"));
        assert!(forwarded);
    }

    #[tokio::test]
    async fn unknown_events_are_logged_and_ignored() {
        let (mut session, _ui, _wire) = controller();
        handle_frame(
            &mut session,
            &json!({"type": "rate_limits.updated", "rate_limits": []}).to_string(),
        );
        assert!(session.transcript.items().is_empty());
        assert_eq!(session.events.entries()[0].event_type, "rate_limits.updated");
    }

    #[tokio::test]
    async fn upstream_error_event_keeps_the_session_alive() {
        let (mut session, _ui, _wire) = controller();
        handle_frame(
            &mut session,
            &json!({"type": "error", "error": {"message": "turn too long"}}).to_string(),
        );
        assert_eq!(session.status, SessionStatus::Connected);
    }

    #[tokio::test]
    async fn malformed_frame_logs_a_protocol_marker() {
        let (mut session, _ui, _wire) = controller();
        handle_frame(&mut session, "{nope");
        handle_frame(
            &mut session,
            &json!({"type": "response.audio_transcript.delta", "item_id": "a1"}).to_string(),
        );
        let kinds: Vec<_> = session
            .events
            .entries()
            .iter()
            .map(|e| e.event_type.as_str())
            .collect();
        assert_eq!(kinds, vec!["error.protocol", "error.protocol"]);
    }
}
