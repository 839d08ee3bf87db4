//! Interview API Library Crate
//!
//! This library contains the realtime interview orchestrator: the session
//! state machine, the browser and upstream WebSocket protocols, the
//! transcript and event stores, the REST handlers, and routing. The `api`
//! binary is a thin wrapper around this library.

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod prefs;
pub mod router;
pub mod state;
pub mod transcript;
pub mod ws;
