//! UI preference persistence.
//!
//! The only state that survives a reload: the diagnostics log-pane
//! visibility flag, stored as a small JSON file. Sessions and transcripts
//! are in-memory per connection and intentionally reset.

use crate::models::UiPrefs;
use anyhow::Result;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the stored preferences, falling back to defaults when the file
    /// is missing or unreadable.
    pub async fn load(&self) -> UiPrefs {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "corrupt prefs file, using defaults");
                UiPrefs::default()
            }),
            Err(_) => UiPrefs::default(),
        }
    }

    pub async fn save(&self, prefs: &UiPrefs) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(prefs)?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }
}
