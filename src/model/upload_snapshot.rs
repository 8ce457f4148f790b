//! Serializable views of an upload for presentation and history

use crate::model::remote::{UploadOutcome, UploadProgress};
use crate::model::upload_id::UploadId;
use crate::model::upload_state::UploadState;
use serde::{Deserialize, Serialize};
use url::Url;

/// Flat record of one upload, produced on demand for history persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSnapshot {
    pub id: UploadId,
    pub name: String,
    pub size_bytes: u64,
    pub status: UploadState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<UploadProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix seconds
    pub created_at: u64,
}

/// Everything a row in the presentation layer shows about one upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadDetails {
    pub id: UploadId,
    pub name: String,
    pub size_bytes: u64,
    pub state: UploadState,
    /// Id stored by the machine once a destination was received
    pub upload_id: Option<UploadId>,
    /// Last destination the machine accepted. A step retry that resumes past
    /// the destination step keeps the earlier one
    pub destination: Option<Url>,
    pub progress: Option<UploadProgress>,
    pub error: Option<String>,
    pub result: Option<UploadOutcome>,
    pub created_at: u64,
}

impl UploadDetails {
    pub fn to_snapshot(&self) -> UploadSnapshot {
        UploadSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            size_bytes: self.size_bytes,
            status: self.state,
            progress: self.progress,
            error: self.error.clone(),
            created_at: self.created_at,
        }
    }
}
