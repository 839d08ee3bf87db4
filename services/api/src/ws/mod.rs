//! The WebSocket stack: browser protocol, upstream transport, and the
//! session orchestrator between them.

pub mod dispatch;
pub mod protocol;
pub mod realtime;
pub mod session;
pub mod transport;

pub use session::ws_handler;
