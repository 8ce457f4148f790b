//! Boundary to the remote upload service
//!
//! The orchestrator only talks to the remote side through [`UploadGateway`].
//! Implementations own the transport; the orchestrator owns sequencing,
//! cancellation checks and retries.

use crate::model::error::GatewayResult;
use crate::model::remote::{Confirmation, DestinationGrant, TransferReceipt, UploadProgress};
use crate::model::upload_file::UploadFile;
use crate::services::cancellation::CancelSignal;
use futures::future::BoxFuture;
use std::sync::Arc;
use url::Url;

/// Callback receiving progress of a running transfer
pub type ProgressSink = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// The three remote operations every upload goes through.
///
/// Every operation may fail and must be safe to call again for the same file.
#[cfg_attr(test, mockall::automock)]
pub trait UploadGateway: Send + Sync {
    /// Ask for a place to send `size_bytes` bytes of `filename` to
    fn request_destination(
        &self,
        filename: &str,
        size_bytes: u64,
    ) -> BoxFuture<'static, GatewayResult<DestinationGrant>>;

    /// Send the bytes of `file` to `destination`.
    ///
    /// Implementations call `on_progress` zero or more times with a
    /// non-decreasing `loaded` up to `total`, poll `is_cancelled` while
    /// working, stop reporting once it is set and fail with
    /// [`GatewayError::Cancelled`](crate::model::error::GatewayError::Cancelled).
    fn transfer(
        &self,
        destination: &Url,
        file: &UploadFile,
        on_progress: ProgressSink,
        is_cancelled: CancelSignal,
    ) -> BoxFuture<'static, GatewayResult<TransferReceipt>>;

    /// Tell the remote side the upload identified by `upload_id` is complete
    fn confirm(&self, upload_id: &str, filename: &str)
        -> BoxFuture<'static, GatewayResult<Confirmation>>;
}
