//! Events an upload machine reacts to

use crate::model::remote::{UploadOutcome, UploadProgress};
use crate::model::upload_id::UploadId;
use url::Url;

/// Everything that can be sent to an upload machine.
///
/// Events that are not valid for the machine's current state are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Start,
    DestinationReceived {
        upload_id: UploadId,
        destination: Url,
    },
    ProgressUpdate(UploadProgress),
    /// Transfer done, waiting for the confirmation
    Confirmed,
    Succeeded(UploadOutcome),
    Error {
        reason: String,
    },
    Cancel,
    /// Go back to the step that failed, keeping everything gathered so far
    RetryStep,
    /// Redo the whole sequence from the destination request
    RetryAll,
}

/// Payload-free discriminant of [`UploadEvent`], used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    DestinationReceived,
    ProgressUpdate,
    Confirmed,
    Succeeded,
    Error,
    Cancel,
    RetryStep,
    RetryAll,
}

impl UploadEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UploadEvent::Start => EventKind::Start,
            UploadEvent::DestinationReceived { .. } => EventKind::DestinationReceived,
            UploadEvent::ProgressUpdate(_) => EventKind::ProgressUpdate,
            UploadEvent::Confirmed => EventKind::Confirmed,
            UploadEvent::Succeeded(_) => EventKind::Succeeded,
            UploadEvent::Error { .. } => EventKind::Error,
            UploadEvent::Cancel => EventKind::Cancel,
            UploadEvent::RetryStep => EventKind::RetryStep,
            UploadEvent::RetryAll => EventKind::RetryAll,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        UploadEvent::Error {
            reason: reason.into(),
        }
    }
}
