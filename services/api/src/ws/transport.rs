//! Upstream transport.
//!
//! Owns the WebSocket to the realtime API: credential fetch, negotiation
//! under a fail-fast timeout, a writer task that serializes typed client
//! events, and a reader task that surfaces inbound frames as
//! `TransportEvent`s into the session loop. The session never touches the
//! socket directly.

use crate::config::Config;
use crate::error::SessionError;
use crate::ws::realtime::ClientEvent;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, warn};

/// Gate on the microphone capture path. Pause and mute flip this flag; the
/// mic frame handler checks it before forwarding audio upstream.
#[derive(Debug, Default)]
pub struct AudioTrack {
    enabled: AtomicBool,
}

impl AudioTrack {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

/// Inbound activity from the upstream socket, delivered to the session loop.
#[derive(Debug)]
pub enum TransportEvent {
    /// One raw JSON text frame from the server.
    Frame(String),
    /// The socket closed or errored; the session reverts to disconnected.
    Closed,
}

#[derive(Deserialize)]
struct CredentialResponse {
    client_secret: ClientSecret,
}

#[derive(Deserialize)]
struct ClientSecret {
    value: String,
}

/// Fetches an ephemeral realtime credential from the session endpoint.
pub async fn fetch_credential(http: &reqwest::Client, config: &Config) -> Result<String, SessionError> {
    let response = timeout(
        config.connect_timeout,
        http.get(&config.session_endpoint).send(),
    )
    .await
    .map_err(|_| SessionError::Credential("credential fetch timed out".to_string()))?
    .map_err(|e| SessionError::Credential(e.to_string()))?;

    if !response.status().is_success() {
        return Err(SessionError::Credential(format!(
            "session endpoint returned {}",
            response.status()
        )));
    }

    let body: CredentialResponse = response
        .json()
        .await
        .map_err(|e| SessionError::Credential(format!("malformed credential response: {e}")))?;

    if body.client_secret.value.is_empty() {
        return Err(SessionError::Credential(
            "credential response carried an empty secret".to_string(),
        ));
    }
    Ok(body.client_secret.value)
}

/// An open upstream connection. Dropping the `Transport` closes the outbound
/// channel, which ends the writer task and shuts the socket down.
#[derive(Debug)]
pub struct Transport {
    outbound: mpsc::UnboundedSender<ClientEvent>,
    input_track: AudioTrack,
}

impl Transport {
    /// Builds a transport over an already-plumbed outbound channel. Used by
    /// tests to observe the typed events a session emits.
    pub fn new(outbound: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self {
            outbound,
            input_track: AudioTrack::new(true),
        }
    }

    /// Negotiates the upstream WebSocket and spawns its reader and writer
    /// tasks. The whole handshake (credential fetch included by the caller)
    /// is bounded by `config.connect_timeout`.
    pub async fn open(
        config: &Config,
        http: &reqwest::Client,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), SessionError> {
        let credential = fetch_credential(http, config).await?;

        let mut request = config
            .realtime_url
            .as_str()
            .into_client_request()
            .map_err(|e| SessionError::Negotiation(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(
            "Authorization",
            format!("Bearer {credential}")
                .parse()
                .map_err(|_| SessionError::Negotiation("invalid credential header".to_string()))?,
        );
        headers.insert(
            "OpenAI-Beta",
            "realtime=v1"
                .parse()
                .map_err(|_| SessionError::Negotiation("invalid beta header".to_string()))?,
        );

        let (socket, _) = timeout(config.connect_timeout, connect_async(request))
            .await
            .map_err(|_| SessionError::Negotiation("connection timed out".to_string()))?
            .map_err(|e| SessionError::Negotiation(e.to_string()))?;

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientEvent>();
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(64);

        tokio::spawn(async move {
            while let Some(event) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize client event");
                        continue;
                    }
                };
                if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
                    warn!(error = %e, "upstream write failed, stopping writer");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            loop {
                match stream.next().await {
                    Some(Ok(WsMessage::Text(text))) => {
                        if event_tx
                            .send(TransportEvent::Frame(text.to_string()))
                            .await
                            .is_err()
                        {
                            // Session loop is gone; nothing left to deliver to.
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                    Some(Ok(WsMessage::Close(frame))) => {
                        debug!(?frame, "upstream socket closed");
                        let _ = event_tx.send(TransportEvent::Closed).await;
                        break;
                    }
                    Some(Ok(other)) => {
                        debug!(?other, "ignoring non-text upstream frame");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "upstream read error");
                        let _ = event_tx.send(TransportEvent::Closed).await;
                        break;
                    }
                    None => {
                        let _ = event_tx.send(TransportEvent::Closed).await;
                        break;
                    }
                }
            }
        });

        Ok((Self::new(outbound_tx), event_rx))
    }

    /// Hands a typed event to the writer task. Fails when the channel has
    /// closed, which the caller records as a dropped send.
    pub fn send(&self, event: ClientEvent) -> Result<(), SessionError> {
        self.outbound
            .send(event)
            .map_err(|_| SessionError::ChannelClosed)
    }

    /// Whether microphone frames should be forwarded upstream. Pause and
    /// mute gate this without touching the socket.
    pub fn input_audio_enabled(&self) -> bool {
        self.input_track.is_enabled()
    }

    pub fn set_input_audio_enabled(&self, enabled: bool) {
        self.input_track.set_enabled(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_track_flips() {
        let track = AudioTrack::new(true);
        assert!(track.is_enabled());
        track.set_enabled(false);
        assert!(!track.is_enabled());
    }

    #[tokio::test]
    async fn send_after_channel_close_reports_channel_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Transport::new(tx);
        drop(rx);
        let err = transport.send(ClientEvent::ResponseCreate).unwrap_err();
        assert!(matches!(err, SessionError::ChannelClosed));
    }

    #[tokio::test]
    async fn send_delivers_typed_events_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = Transport::new(tx);
        transport.send(ClientEvent::InputAudioBufferClear).unwrap();
        transport.send(ClientEvent::ResponseCreate).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            ClientEvent::InputAudioBufferClear
        ));
        assert!(matches!(rx.try_recv().unwrap(), ClientEvent::ResponseCreate));
    }
}
