//! In-process stand-in for a remote upload service
//!
//! Every operation sleeps for a random amount of time. With
//! `fail_first_attempt` set, the first destination request of every file name
//! fails with a network error and every later attempt succeeds.

use crate::model::error::{GatewayError, GatewayResult};
use crate::model::remote::{Confirmation, DestinationGrant, TransferReceipt, UploadProgress};
use crate::model::upload_file::UploadFile;
use crate::services::cancellation::CancelSignal;
use crate::services::gateway::{ProgressSink, UploadGateway};
use crate::settings::uploader_config::SimulationConfig;
use futures::future::BoxFuture;
use futures::FutureExt;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

const DESTINATION_HOST: &str = "https://api.example.com/upload/";
const RECEIPT_HOST: &str = "https://example.com/uploads/";
const DESTINATION_TTL_SECS: u64 = 3600;

pub struct SimulatedGateway {
    config: SimulationConfig,
    /// Destination requests seen per file name
    attempts: Mutex<HashMap<String, u32>>,
}

impl SimulatedGateway {
    pub fn new(config: SimulationConfig) -> Self {
        SimulatedGateway {
            config,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Number of destination requests made for `filename` so far
    pub fn attempts(&self, filename: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(filename)
            .copied()
            .unwrap_or_default()
    }

    /// Record one more destination request and return the number of earlier ones
    fn record_attempt(&self, filename: &str) -> u32 {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let count = attempts.entry(filename.to_string()).or_insert(0);
        let previous = *count;
        *count += 1;
        previous
    }
}

fn random_delay(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

fn unix_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

impl UploadGateway for SimulatedGateway {
    fn request_destination(
        &self,
        filename: &str,
        size_bytes: u64,
    ) -> BoxFuture<'static, GatewayResult<DestinationGrant>> {
        let previous = self.record_attempt(filename);
        let fail = self.config.fail_first_attempt && previous == 0;
        let delay = random_delay(self.config.min_delay_ms, self.config.max_delay_ms);

        async move {
            tokio::time::sleep(delay).await;
            if fail {
                return Err(GatewayError::Network(
                    "Failed to get upload URL - network error".to_string(),
                ));
            }

            let now = unix_now();
            let raw = format!("{}{}?size={}", DESTINATION_HOST, now.as_millis(), size_bytes);
            let destination = Url::parse(&raw)
                .map_err(|e| GatewayError::Rejected(format!("Invalid upload URL: {}", e)))?;
            Ok(DestinationGrant {
                upload_id: format!("upload_{}", now.as_millis()),
                destination,
                expires_at: now.as_secs() + DESTINATION_TTL_SECS,
            })
        }
        .boxed()
    }

    fn transfer(
        &self,
        destination: &Url,
        file: &UploadFile,
        on_progress: ProgressSink,
        is_cancelled: CancelSignal,
    ) -> BoxFuture<'static, GatewayResult<TransferReceipt>> {
        let receipt_id = destination
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();
        let file = file.clone();
        let min_interval = self.config.progress_min_interval_ms;
        let max_interval = self.config.progress_max_interval_ms;

        async move {
            let data = file
                .read_all()
                .await
                .map_err(|e| GatewayError::Rejected(format!("Cannot read {}: {}", file.name, e)))?;

            // the bytes read decide the size, the file may have changed since submission
            let total = data.len() as u64;
            let max_step = (total / 10).max(1);
            let mut loaded = 0u64;
            loop {
                tokio::time::sleep(random_delay(min_interval, max_interval)).await;
                if is_cancelled.is_cancelled() {
                    return Err(GatewayError::Cancelled("Upload cancelled".to_string()));
                }
                let step = rand::thread_rng().gen_range(1..=max_step);
                loaded = loaded.saturating_add(step).min(total);
                on_progress(UploadProgress::new(loaded, total));
                if loaded >= total {
                    break;
                }
            }

            let url = format!(
                "{}{}",
                RECEIPT_HOST,
                utf8_percent_encode(&file.name, NON_ALPHANUMERIC)
            );
            Ok(TransferReceipt {
                id: receipt_id,
                filename: file.name,
                size_bytes: total,
                url,
                uploaded_at: unix_now().as_secs(),
            })
        }
        .boxed()
    }

    fn confirm(
        &self,
        upload_id: &str,
        filename: &str,
    ) -> BoxFuture<'static, GatewayResult<Confirmation>> {
        let delay = random_delay(
            self.config.confirm_min_delay_ms,
            self.config.confirm_max_delay_ms,
        );
        let upload_id = upload_id.to_string();
        let filename = filename.to_string();

        async move {
            tokio::time::sleep(delay).await;
            tracing::debug!("Confirmed {} for {}", upload_id, filename);
            Ok(Confirmation {
                success: true,
                message: format!("Successfully processed {}", filename),
            })
        }
        .boxed()
    }
}
