//! Manages the browser WebSocket lifecycle and the session state machine.
//!
//! One `SessionController` per browser connection owns all mutable session
//! state. Browser intents and upstream transport events feed a single
//! `select!` loop, so handlers never contend over shared state.

use super::dispatch;
use super::protocol::{ClientMessage, ServerMessage};
use super::realtime::{
    AudioTranscription, ClientEvent, ConversationItem, SessionConfig, SessionTool, TurnDetection,
};
use super::transport::{Transport, TransportEvent};
use crate::audio;
use crate::config::Config;
use crate::error::SessionError;
use crate::events::EventBus;
use crate::models::{ItemStatus, Role, SessionStatus, TranscriptItem, now_ms};
use crate::state::AppState;
use crate::transcript::TranscriptStore;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitStream};
use interview_core::agent::AgentRoster;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for a new browser connection: spawns the UI writer task and
/// runs the session loop until either side disconnects.
#[instrument(name = "interview_session", skip_all, fields(conn_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id: u32 = rand::random();
    tracing::Span::current().record("conn_id", conn_id.to_string());
    info!("New browser connection");

    let (mut socket_tx, socket_rx) = socket.split();
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // All pushes to the browser funnel through one writer task, so handlers
    // can emit without holding the sink.
    let writer = tokio::spawn(async move {
        while let Some(msg) = ui_rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to serialize UI message");
                    continue;
                }
            };
            if socket_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = socket_tx.close().await;
    });

    let session = SessionController::new(
        state.roster.clone(),
        state.config.clone(),
        state.http.clone(),
        ui_tx,
    );
    run_session(session, socket_rx).await;

    writer.abort();
    info!("Browser connection closed");
}

/// The session loop: one `select!` over browser messages and upstream
/// transport events. The transport receiver lives here, not in the
/// controller, and is replaced wholesale on every (re)connect so frames from
/// a stale reader can never reach the session.
async fn run_session(mut session: SessionController, mut socket_rx: SplitStream<WebSocket>) {
    let mut transport_rx: Option<mpsc::Receiver<TransportEvent>> = None;

    loop {
        tokio::select! {
            msg = socket_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                if let Some(rx) = session.handle_client_message(msg).await {
                                    transport_rx = Some(rx);
                                }
                            }
                            Err(e) => warn!(error = %e, "ignoring malformed browser message"),
                        }
                    }
                    Some(Ok(Message::Binary(frame))) => session.handle_mic_frame(&frame),
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Browser closed the connection");
                        break;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "browser socket error");
                        break;
                    }
                }
            }
            event = next_transport_event(&mut transport_rx) => {
                match event {
                    TransportEvent::Frame(raw) => dispatch::handle_frame(&mut session, &raw),
                    TransportEvent::Closed => {
                        session.on_transport_closed();
                        transport_rx = None;
                    }
                }
            }
        }
    }
}

/// Awaits the next upstream event, or parks forever while no transport is
/// attached so the `select!` stays driven by the browser side alone.
async fn next_transport_event(rx: &mut Option<mpsc::Receiver<TransportEvent>>) -> TransportEvent {
    match rx {
        Some(rx) => match rx.recv().await {
            Some(event) => event,
            None => TransportEvent::Closed,
        },
        None => std::future::pending().await,
    }
}

/// All mutable state for one browser session.
pub(crate) struct SessionController {
    pub(crate) roster: Arc<AgentRoster>,
    pub(crate) config: Arc<Config>,
    http: reqwest::Client,
    ui_tx: mpsc::UnboundedSender<ServerMessage>,
    pub(crate) status: SessionStatus,
    pub(crate) active_agent_id: String,
    mic_granted: bool,
    pub(crate) mic_muted: bool,
    /// The simulated greeting fires only on the first connect of a session.
    greeted: bool,
    pub(crate) transcript: TranscriptStore,
    pub(crate) events: EventBus,
    pub(crate) transport: Option<Transport>,
}

impl SessionController {
    pub(crate) fn new(
        roster: Arc<AgentRoster>,
        config: Arc<Config>,
        http: reqwest::Client,
        ui_tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        let active_agent_id = roster.entry_agent_id().to_string();
        Self {
            roster,
            config,
            http,
            ui_tx,
            status: SessionStatus::Disconnected,
            active_agent_id,
            mic_granted: true,
            mic_muted: false,
            greeted: false,
            transcript: TranscriptStore::new(),
            events: EventBus::new(),
            transport: None,
        }
    }

    /// Routes one browser intent. Returns a new transport receiver when the
    /// intent opened a connection.
    async fn handle_client_message(
        &mut self,
        msg: ClientMessage,
    ) -> Option<mpsc::Receiver<TransportEvent>> {
        match msg {
            ClientMessage::Connect { mic_granted } => self.connect(mic_granted).await,
            ClientMessage::Toggle => self.toggle().await,
            ClientMessage::ToggleMute => {
                self.toggle_mute();
                None
            }
            ClientMessage::SendText { text } => {
                self.send_text(&text);
                None
            }
            ClientMessage::Cancel => {
                self.cancel_in_flight_response();
                None
            }
        }
    }

    /// Runs the connect sequence: credential fetch, transport negotiation,
    /// initial session configuration, and the one-time greeting. Any failure
    /// reverts to `Disconnected`; there is no automatic retry.
    pub(crate) async fn connect(
        &mut self,
        mic_granted: bool,
    ) -> Option<mpsc::Receiver<TransportEvent>> {
        if self.status != SessionStatus::Disconnected {
            warn!(status = %self.status, "connect requested while session is active");
            return None;
        }
        self.mic_granted = mic_granted;
        if !mic_granted {
            self.fail_connect(SessionError::MediaAccess(
                "microphone permission denied".to_string(),
            ));
            return None;
        }

        self.set_status(SessionStatus::Connecting);
        let entry = self.events.log_marker(
            "fetch_session_token_request",
            json!({ "endpoint": self.config.session_endpoint }),
        );
        self.push_entry(entry);

        match Transport::open(&self.config, &self.http).await {
            Ok((transport, rx)) => {
                self.transport = Some(transport);
                self.set_status(SessionStatus::Connected);
                if let Some(agent) = self.roster.get(&self.active_agent_id) {
                    let title = format!("Agent: {}", agent.id);
                    let data = serde_json::to_value(agent).ok();
                    let item = self.transcript.add_breadcrumb(&title, data).clone();
                    self.push_item(item);
                }
                let greet = !self.greeted;
                self.greeted = true;
                self.configure(greet);
                Some(rx)
            }
            Err(e) => {
                self.fail_connect(e);
                None
            }
        }
    }

    fn fail_connect(&mut self, err: SessionError) {
        error!(error = %err, "connect failed");
        let entry = self
            .events
            .log_marker(err.kind(), json!({ "message": err.to_string() }));
        self.push_entry(entry);
        self.push_ui(ServerMessage::Error {
            message: err.to_string(),
        });
        self.transport = None;
        self.set_status(SessionStatus::Disconnected);
    }

    /// Pause a connected session, resume a paused one, or connect a
    /// disconnected one. Pausing keeps the transport open and only gates the
    /// microphone capture path.
    pub(crate) async fn toggle(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        match self.status {
            SessionStatus::Connected => {
                if let Some(transport) = &self.transport {
                    transport.set_input_audio_enabled(false);
                }
                self.set_status(SessionStatus::Paused);
                let entry = self.events.log_marker("paused", json!({}));
                self.push_entry(entry);
                None
            }
            SessionStatus::Paused => {
                // Resume passes through Connecting so observers see the same
                // transition shape as a fresh connect.
                self.set_status(SessionStatus::Connecting);
                if let Some(transport) = &self.transport {
                    transport.set_input_audio_enabled(!self.mic_muted);
                }
                self.set_status(SessionStatus::Connected);
                let entry = self.events.log_marker("resuming", json!({}));
                self.push_entry(entry);
                None
            }
            SessionStatus::Disconnected => self.connect(self.mic_granted).await,
            SessionStatus::Connecting => None,
        }
    }

    /// Mute is only meaningful while connected; anywhere else it is ignored.
    pub(crate) fn toggle_mute(&mut self) {
        if self.status != SessionStatus::Connected {
            warn!(status = %self.status, "ignoring mute toggle outside a connected session");
            return;
        }
        self.mic_muted = !self.mic_muted;
        if let Some(transport) = &self.transport {
            transport.set_input_audio_enabled(!self.mic_muted);
        }
        let marker = if self.mic_muted {
            "mic_muted"
        } else {
            "mic_unmuted"
        };
        let entry = self
            .events
            .log_marker(marker, json!({ "muted": self.mic_muted }));
        self.push_entry(entry);
        self.push_status();
    }

    /// Pushes the active agent's configuration upstream, clearing any
    /// buffered input first. Runs on connect and on every handoff.
    pub(crate) fn configure(&mut self, trigger_greeting: bool) {
        let Some(session) = self.build_session_config() else {
            return;
        };
        self.send_client_event(ClientEvent::InputAudioBufferClear);
        self.send_client_event(ClientEvent::SessionUpdate { session });
        if trigger_greeting {
            self.send_simulated_user_message("hi");
        }
    }

    fn build_session_config(&self) -> Option<SessionConfig> {
        let Some(agent) = self.roster.get(&self.active_agent_id) else {
            error!(agent = %self.active_agent_id, "active agent missing from roster");
            return None;
        };
        Some(SessionConfig {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions: agent.instructions.clone(),
            voice: self.config.voice.clone(),
            input_audio_format: "pcm16".to_string(),
            output_audio_format: "pcm16".to_string(),
            input_audio_transcription: AudioTranscription {
                model: "whisper-1".to_string(),
            },
            turn_detection: TurnDetection::default(),
            tools: agent.tools.iter().map(SessionTool::from).collect(),
        })
    }

    /// The hidden greeting turn: a synthetic user "hi" that prompts the
    /// agent to open the interview.
    fn send_simulated_user_message(&mut self, text: &str) {
        let id = Uuid::new_v4().simple().to_string();
        let item = self
            .transcript
            .add_message(&id, Role::User, text, ItemStatus::Done, true)
            .clone();
        self.push_item(item);
        self.send_client_event(ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text(&id, text),
        });
        self.send_client_event(ClientEvent::ResponseCreate);
    }

    /// Sends a typed user message: barge in on any in-flight response, record
    /// the turn locally, then ask the model to respond.
    pub(crate) fn send_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.cancel_in_flight_response();
        let id = Uuid::new_v4().simple().to_string();
        let item = self
            .transcript
            .add_message(&id, Role::User, text, ItemStatus::Done, false)
            .clone();
        self.push_item(item);
        self.send_client_event(ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text(&id, text),
        });
        self.send_client_event(ClientEvent::ResponseCreate);
    }

    /// Barge-in. With no assistant response in flight this is a no-op;
    /// otherwise exactly one truncate (at the current playback offset)
    /// followed by exactly one cancel.
    pub(crate) fn cancel_in_flight_response(&mut self) {
        let Some(item) = self.transcript.latest_assistant() else {
            return;
        };
        if item.status == ItemStatus::Done {
            return;
        }
        let item_id = item.item_id.clone();
        let audio_end_ms = (now_ms() - item.created_at_ms).max(0);
        self.send_client_event(ClientEvent::ConversationItemTruncate {
            item_id: item_id.clone(),
            content_index: 0,
            audio_end_ms,
        });
        self.send_client_event(ClientEvent::ResponseCancel);
        if let Some(done) = self.transcript.mark_done(&item_id) {
            let done = done.clone();
            self.push_item(done);
        }
    }

    /// Sends a typed event upstream, logging it as sent or as a dropped
    /// attempt. The log carries the failure; callers do not branch on it.
    pub(crate) fn send_client_event(&mut self, event: ClientEvent) {
        let event_type = event.event_type();
        let payload = serde_json::to_value(&event).unwrap_or(Value::Null);
        let delivered = match &self.transport {
            Some(transport) => transport.send(event).is_ok(),
            None => false,
        };
        let entry = if delivered {
            self.events.log_outbound(event_type, payload)
        } else {
            warn!(event_type, "dropping outbound event, data channel is not open");
            self.events.log_outbound_failed(event_type, payload)
        };
        self.push_entry(entry);
    }

    /// Forwards one raw PCM16 mic frame upstream. Audio rides outside the
    /// event log; a frame every few tens of milliseconds would drown it.
    pub(crate) fn handle_mic_frame(&mut self, frame: &[u8]) {
        if self.status != SessionStatus::Connected {
            return;
        }
        let Some(transport) = &self.transport else {
            return;
        };
        if !transport.input_audio_enabled() {
            return;
        }
        let audio = audio::encode_pcm16(frame);
        if transport
            .send(ClientEvent::InputAudioBufferAppend { audio })
            .is_err()
        {
            warn!("mic frame dropped, upstream channel closed");
        }
    }

    pub(crate) fn on_transport_closed(&mut self) {
        if self.status == SessionStatus::Disconnected {
            return;
        }
        warn!("upstream transport closed");
        self.transport = None;
        let entry = self.events.log_marker("transport_closed", json!({}));
        self.push_entry(entry);
        self.set_status(SessionStatus::Disconnected);
    }

    fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.push_status();
    }

    pub(crate) fn push_status(&self) {
        self.push_ui(ServerMessage::Status {
            status: self.status,
            mic_muted: self.mic_muted,
            active_agent: self.active_agent_id.clone(),
        });
    }

    pub(crate) fn push_item(&self, item: TranscriptItem) {
        self.push_ui(ServerMessage::TranscriptUpsert { item });
    }

    pub(crate) fn push_entry(&self, entry: crate::models::EventLogEntry) {
        self.push_ui(ServerMessage::EventLogged { entry });
    }

    pub(crate) fn push_ui(&self, msg: ServerMessage) {
        // A closed UI channel means the browser is gone; the loop will see
        // the socket close shortly after.
        let _ = self.ui_tx.send(msg);
    }
}
