//! Upload history persistence
//!
//! Keeps the last known state of every upload in a JSON file so it can be
//! shown again after a restart. The orchestrator never reads it back: uploads
//! that were still in flight when saved are loaded as failed, since their
//! drivers are gone.

use crate::model::upload_snapshot::UploadSnapshot;
use crate::model::upload_state::{StateClass, UploadState};
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

const HISTORY_FILE: &str = "upload_history.json";
const INTERRUPTED: &str = "interrupted";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedHistory {
    uploads: Vec<UploadSnapshot>,
}

/// Manages the upload history file
pub struct UploadHistory {
    history_file: PathBuf,
}

impl UploadHistory {
    pub fn new(data_dir: PathBuf) -> Self {
        UploadHistory {
            history_file: data_dir.join(HISTORY_FILE),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.history_file
    }

    /// Load the saved history. A missing or unreadable file yields an empty one.
    pub async fn load(&self) -> eyre::Result<Vec<UploadSnapshot>> {
        if !self.history_file.exists() {
            return Ok(Vec::new());
        }

        match fs::read_to_string(&self.history_file).await {
            Ok(content) => {
                let mut history: PersistedHistory = serde_json::from_str(&content)?;
                for snapshot in &mut history.uploads {
                    Self::mark_interrupted(snapshot);
                }
                tracing::info!(
                    "Loaded {} uploads from previous session",
                    history.uploads.len()
                );
                Ok(history.uploads)
            }
            Err(e) => {
                tracing::warn!("Failed to load upload history: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Uploads that were in flight cannot be resumed
    fn mark_interrupted(snapshot: &mut UploadSnapshot) {
        if snapshot.status.class() == StateClass::Uploading {
            snapshot.status = UploadState::Failure;
            snapshot.error = Some(INTERRUPTED.to_string());
        }
    }

    /// Replace the saved history with `snapshots`
    pub async fn save(&self, snapshots: &[UploadSnapshot]) -> eyre::Result<()> {
        if let Some(parent) = self.history_file.parent() {
            fs::create_dir_all(parent).await?;
        }

        let history = PersistedHistory {
            uploads: snapshots.to_vec(),
        };
        let content = serde_json::to_string_pretty(&history)?;
        fs::write(&self.history_file, content).await?;

        tracing::debug!("Saved {} uploads to history", history.uploads.len());
        Ok(())
    }
}
