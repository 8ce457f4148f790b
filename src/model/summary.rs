//! Aggregate view over all registered uploads

use crate::model::upload_state::{StateClass, UploadState};
use serde::{Deserialize, Serialize};

/// Count of uploads per state class.
///
/// Always derived from the live machines, never updated incrementally. The five
/// buckets partition `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub total: usize,
    pub idle: usize,
    pub uploading: usize,
    pub success: usize,
    pub failure: usize,
    pub cancelled: usize,
}

impl UploadSummary {
    /// Bucket every state yielded by `states`
    pub fn from_states<I>(states: I) -> Self
    where
        I: IntoIterator<Item = UploadState>,
    {
        states
            .into_iter()
            .fold(UploadSummary::default(), |mut summary, state| {
                summary.total += 1;
                match state.class() {
                    StateClass::Idle => summary.idle += 1,
                    StateClass::Uploading => summary.uploading += 1,
                    StateClass::Success => summary.success += 1,
                    StateClass::Failure => summary.failure += 1,
                    StateClass::Cancelled => summary.cancelled += 1,
                }
                summary
            })
    }

    pub fn has_active_uploads(&self) -> bool {
        self.uploading > 0
    }

    pub fn has_failed_uploads(&self) -> bool {
        self.failure > 0
    }

    /// Returns true if nothing is in flight
    pub fn is_settled(&self) -> bool {
        self.uploading == 0
    }

    /// Share of finished uploads (success, failure or cancelled), 0.0 to 100.0
    pub fn finished_percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let finished = self.success + self.failure + self.cancelled;
        finished as f64 / self.total as f64 * 100.0
    }
}
