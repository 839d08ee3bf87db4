//! Session error taxonomy.
//!
//! Connect-path failures (credential, media, negotiation) are user-visible
//! and force the session back to `Disconnected`. Everything else is recovered
//! locally: the error is logged, the offending operation is skipped, and the
//! session continues. Nothing here triggers an automatic retry.

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no ephemeral credential available: {0}")]
    Credential(String),
    #[error("microphone unavailable: {0}")]
    MediaAccess(String),
    #[error("transport negotiation failed: {0}")]
    Negotiation(String),
    #[error("data channel is not open")]
    ChannelClosed,
    #[error("malformed protocol event: {0}")]
    Protocol(String),
    #[error("transfer to '{target}' rejected: not a downstream agent of '{from}'")]
    TransferRejected { target: String, from: String },
}

impl SessionError {
    /// Stable event-type string used when recording the error on the event bus.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Credential(_) => "error.no_ephemeral_key",
            SessionError::MediaAccess(_) => "error.media_access",
            SessionError::Negotiation(_) => "error.negotiation",
            SessionError::ChannelClosed => "error.data_channel_not_open",
            SessionError::Protocol(_) => "error.protocol",
            SessionError::TransferRejected { .. } => "error.transfer_rejected",
        }
    }
}
