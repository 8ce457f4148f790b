//! Payloads exchanged with the upload gateway

use serde::{Deserialize, Serialize};
use url::Url;

/// Byte-level progress of one transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
    /// Whole percent, floored, 0..=100
    pub percentage: u32,
}

impl UploadProgress {
    /// Build a progress record, clamping `loaded` to `total`
    pub fn new(loaded: u64, total: u64) -> Self {
        let loaded = loaded.min(total);
        let percentage = if total == 0 {
            100
        } else {
            ((loaded as u128 * 100) / total as u128) as u32
        };
        UploadProgress {
            loaded,
            total,
            percentage,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.loaded >= self.total
    }
}

/// Answer to a destination request
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationGrant {
    /// Identifier assigned by the gateway
    pub upload_id: String,
    pub destination: Url,
    /// Unix seconds after which the destination is no longer valid
    pub expires_at: u64,
}

/// Answer to a finished transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub url: String,
    /// Unix seconds
    pub uploaded_at: u64,
}

/// Answer to a completion confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub success: bool,
    pub message: String,
}

/// Result stored on an upload that reached `Success`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub receipt: TransferReceipt,
    pub confirmation: Confirmation,
}
