//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared,
//! read-only resources every connection needs: the agent roster, the HTTP
//! client used for credential fetches, the preference store, and the
//! configuration.

use crate::{config::Config, prefs::PrefsStore};
use interview_core::agent::AgentRoster;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub roster: Arc<AgentRoster>,
    pub http: reqwest::Client,
    pub prefs: Arc<PrefsStore>,
    pub config: Arc<Config>,
}
