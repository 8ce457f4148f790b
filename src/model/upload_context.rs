use crate::model::remote::{UploadOutcome, UploadProgress};
use crate::model::upload_file::UploadFile;
use crate::model::upload_id::UploadId;
use crate::services::cancellation::CancelSignal;
use url::Url;

/// Mutable record carried by one upload machine.
///
/// At any instant at most one of `result` and `error` is set: `result` only in
/// `Success`, `error` only in `Failure`.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub file: UploadFile,
    /// Set once a destination has been obtained
    pub upload_id: Option<UploadId>,
    pub destination: Option<Url>,
    pub progress: Option<UploadProgress>,
    pub result: Option<UploadOutcome>,
    pub error: Option<String>,
    /// Flipping this stops in-flight work for the upload
    pub cancel: CancelSignal,
}

impl UploadContext {
    pub fn new(file: UploadFile, cancel: CancelSignal) -> Self {
        UploadContext {
            file,
            upload_id: None,
            destination: None,
            progress: None,
            result: None,
            error: None,
            cancel,
        }
    }

    /// Returns false if both a result and an error are recorded
    pub fn is_consistent(&self) -> bool {
        !(self.result.is_some() && self.error.is_some())
    }
}
