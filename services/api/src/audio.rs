//! PCM16 audio helpers.
//!
//! The browser ships raw little-endian PCM16 frames over its WebSocket; the
//! realtime API expects the same bytes base64-encoded inside
//! `input_audio_buffer.append` events. Playback deltas arrive base64-encoded
//! and are forwarded to the browser untouched, so only the encode direction
//! lives here.

use base64::Engine;

/// Encodes a raw PCM16 byte frame for an `input_audio_buffer.append` event.
pub fn encode_pcm16(frame: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(frame)
}
