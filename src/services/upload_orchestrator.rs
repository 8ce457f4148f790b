//! Upload orchestration
//!
//! The orchestrator turns submitted files into registered upload machines and
//! runs one driver task per upload. A driver walks the three gateway
//! operations in order and feeds every result back to its machine as an event.
//! Control operations (cancel, retries, removal) act on the machines and
//! relaunch drivers; they never wait for a driver.
//!
//! Locking: the registry sits behind a `std::sync::Mutex` that is only held for
//! synchronous bookkeeping and never across an `.await`.

use crate::model::error::GatewayError;
use crate::model::remote::UploadOutcome;
use crate::model::summary::UploadSummary;
use crate::model::upload_context::UploadContext;
use crate::model::upload_event::UploadEvent;
use crate::model::upload_file::UploadFile;
use crate::model::upload_id::UploadId;
use crate::model::upload_machine::UploadMachine;
use crate::model::upload_snapshot::{UploadDetails, UploadSnapshot};
use crate::model::upload_state::UploadState;
use crate::services::cancellation::CancelSignal;
use crate::services::gateway::{ProgressSink, UploadGateway};
use crate::services::upload_registry::{RestartHandle, UploadRegistry, UploadSlot};
use crate::settings::uploader_config::UploaderConfig;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::Instrument;

/// State shared between the orchestrator handle and its driver tasks
struct Shared {
    registry: Mutex<UploadRegistry>,
    gateway: Arc<dyn UploadGateway>,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, UploadRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, id: &UploadId, generation: u64, event: UploadEvent) {
        self.registry().dispatch(id, Some(generation), event);
    }
}

/// Drives many independent uploads concurrently.
///
/// Must be used from within a Tokio runtime. Dropping the orchestrator shuts
/// it down: every upload is cancelled and forgotten.
pub struct UploadOrchestrator {
    shared: Arc<Shared>,
    config: UploaderConfig,
}

impl UploadOrchestrator {
    pub fn new(gateway: Arc<dyn UploadGateway>, config: UploaderConfig) -> Self {
        UploadOrchestrator {
            shared: Arc::new(Shared {
                registry: Mutex::new(UploadRegistry::new()),
                gateway,
            }),
            config,
        }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Register one upload per file and, with `auto_start`, start them.
    ///
    /// Returns the assigned ids in the order of `files`.
    pub fn submit(&self, files: Vec<UploadFile>) -> Vec<UploadId> {
        files.into_iter().map(|file| self.submit_one(file)).collect()
    }

    pub fn submit_one(&self, file: UploadFile) -> UploadId {
        let mut id = UploadId::generate();
        let mut registry = self.shared.registry();
        while registry.contains(&id) {
            id = UploadId::generate();
        }

        let cancel = CancelSignal::new();
        let restart = self.restart_handle(id.clone(), file.clone(), cancel.clone());
        tracing::info!(
            "Submitted {} ({} bytes) as {}",
            file.name,
            file.size_bytes,
            id
        );
        let machine = UploadMachine::new(UploadContext::new(file, cancel));
        registry.register(id.clone(), UploadSlot::new(machine, unix_secs()).with_restart(restart));

        if self.config.auto_start {
            Self::start_locked(&mut registry, &id);
        }
        id
    }

    /// Start every upload that is still idle. Returns how many were started.
    pub fn start_all(&self) -> usize {
        let mut registry = self.shared.registry();
        registry
            .ids_in_state(UploadState::Idle)
            .into_iter()
            .filter(|id| Self::start_locked(&mut registry, id))
            .count()
    }

    /// Start a single idle upload
    pub fn start(&self, id: &UploadId) -> bool {
        Self::start_locked(&mut self.shared.registry(), id)
    }

    fn start_locked(registry: &mut UploadRegistry, id: &UploadId) -> bool {
        match registry.get(id) {
            Some(slot) if slot.state() == UploadState::Idle && slot.can_restart() => {}
            _ => return false,
        }
        registry.dispatch(id, None, UploadEvent::Start);
        registry
            .get_mut(id)
            .is_some_and(|slot| slot.launch(Duration::ZERO))
    }

    /// Retry only the step that failed, keeping the destination and progress
    /// gathered so far.
    ///
    /// The relaunched driver still asks the gateway for a fresh destination and
    /// transfers to it. The machine resumes in `Transferring` or `Confirming`
    /// and no longer accepts `DestinationReceived`, so
    /// [`UploadDetails::destination`] keeps reporting the first grant while the
    /// bytes go to the new one.
    pub fn retry_step(&self, id: &UploadId) -> bool {
        self.retry(id, UploadEvent::RetryStep)
    }

    /// Retry the whole sequence of one failed upload from the destination
    /// request
    pub fn retry_upload(&self, id: &UploadId) -> bool {
        self.retry(id, UploadEvent::RetryAll)
    }

    /// Retry every failed upload from scratch. Returns how many were restarted.
    pub fn retry_all(&self) -> usize {
        let mut registry = self.shared.registry();
        let failed = registry.ids_in_state(UploadState::Failure);
        failed
            .iter()
            .filter(|id| self.retry_locked(&mut registry, id, UploadEvent::RetryAll))
            .count()
    }

    fn retry(&self, id: &UploadId, event: UploadEvent) -> bool {
        self.retry_locked(&mut self.shared.registry(), id, event)
    }

    fn retry_locked(&self, registry: &mut UploadRegistry, id: &UploadId, event: UploadEvent) -> bool {
        match registry.get(id) {
            Some(slot) if slot.state() == UploadState::Failure && slot.can_restart() => {}
            Some(slot) if slot.state() == UploadState::Failure => {
                tracing::warn!("Upload {} cannot be restarted", id);
                return false;
            }
            _ => return false,
        }
        tracing::info!("Retrying upload {} ({:?})", id, event.kind());
        if registry.dispatch(id, None, event).is_none() {
            return false;
        }
        let delay = self.config.restart_delay();
        registry
            .get_mut(id)
            .is_some_and(|slot| slot.launch(delay))
    }

    /// Cancel one in-flight upload. The driver notices the signal at its next
    /// suspension point and stops without reporting anything.
    pub fn cancel_upload(&self, id: &UploadId) -> bool {
        Self::cancel_locked(&mut self.shared.registry(), id)
    }

    /// Cancel every in-flight upload. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut registry = self.shared.registry();
        registry
            .ids()
            .iter()
            .filter(|id| Self::cancel_locked(&mut registry, id))
            .count()
    }

    fn cancel_locked(registry: &mut UploadRegistry, id: &UploadId) -> bool {
        let Some(slot) = registry.get(id) else {
            return false;
        };
        if !slot.state().is_active() {
            return false;
        }
        slot.machine().context().cancel.cancel();
        tracing::info!("Cancelled upload {}", id);
        registry.dispatch(id, None, UploadEvent::Cancel).is_some()
    }

    /// Forget one upload, whatever its state
    pub fn remove_upload(&self, id: &UploadId) -> bool {
        let removed = self.shared.registry().unregister(id).is_some();
        if removed {
            tracing::info!("Removed upload {}", id);
        }
        removed
    }

    /// Forget every upload. Returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let count = self.shared.registry().clear();
        tracing::info!("Cleared {} uploads", count);
        count
    }

    /// Cancel and forget every upload
    pub fn shutdown(&self) {
        let count = self.shared.registry().clear();
        if count > 0 {
            tracing::info!("Shut down with {} uploads registered", count);
        }
    }

    pub fn summary(&self) -> UploadSummary {
        self.shared.registry().summary()
    }

    /// Receiver that observes every summary change
    pub fn subscribe_summary(&self) -> watch::Receiver<UploadSummary> {
        self.shared.registry().subscribe()
    }

    /// Stream of summaries, starting with the current one
    pub fn summary_updates(&self) -> WatchStream<UploadSummary> {
        WatchStream::new(self.subscribe_summary())
    }

    /// Wait until no upload is in flight anymore
    pub async fn wait_until_settled(&self) {
        let mut rx = self.subscribe_summary();
        let _ = rx.wait_for(UploadSummary::is_settled).await;
    }

    pub fn state(&self, id: &UploadId) -> Option<UploadState> {
        self.shared.registry().get(id).map(|slot| slot.state())
    }

    pub fn details(&self, id: &UploadId) -> Option<UploadDetails> {
        self.shared.registry().details(id)
    }

    /// Details of every upload in submission order
    pub fn all_details(&self) -> Vec<UploadDetails> {
        self.shared.registry().all_details()
    }

    pub fn snapshots(&self) -> Vec<UploadSnapshot> {
        self.all_details()
            .iter()
            .map(UploadDetails::to_snapshot)
            .collect()
    }

    pub fn upload_ids(&self) -> Vec<UploadId> {
        self.shared.registry().ids()
    }

    pub fn len(&self) -> usize {
        self.shared.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.registry().is_empty()
    }

    /// Capability to (re)launch the driver of one upload.
    ///
    /// Holds the shared state weakly so that registered slots do not keep the
    /// registry that owns them alive.
    fn restart_handle(&self, id: UploadId, file: UploadFile, cancel: CancelSignal) -> RestartHandle {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        Arc::new(move |generation, delay| {
            let shared = shared.upgrade()?;
            let span = tracing::info_span!("upload", id = %id, file = %file.name, generation);
            let driver = drive(
                shared,
                id.clone(),
                generation,
                file.clone(),
                cancel.clone(),
                delay,
            );
            Some(tokio::spawn(driver.instrument(span)).abort_handle())
        })
    }
}

impl Drop for UploadOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Walk the gateway operations for one upload, reporting to its machine.
///
/// Returns silently as soon as the cancellation signal is observed after an
/// await. Events that no longer fit the machine's state (for example the
/// destination of a step retry that resumed at the transfer) are ignored by
/// the machine.
async fn drive(
    shared: Arc<Shared>,
    id: UploadId,
    generation: u64,
    file: UploadFile,
    cancel: CancelSignal,
    delay: Duration,
) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if cancel.is_cancelled() {
        return;
    }
    let gateway = shared.gateway.clone();
    shared.dispatch(&id, generation, UploadEvent::Start);

    let grant = gateway
        .request_destination(&file.name, file.size_bytes)
        .await;
    if cancel.is_cancelled() {
        return;
    }
    let grant = match grant {
        Ok(grant) => grant,
        Err(e) => {
            log_gateway_error("Destination request", &e);
            shared.dispatch(&id, generation, UploadEvent::error(e.to_string()));
            return;
        }
    };
    shared.dispatch(
        &id,
        generation,
        UploadEvent::DestinationReceived {
            upload_id: id.clone(),
            destination: grant.destination.clone(),
        },
    );

    let on_progress: ProgressSink = {
        let shared = shared.clone();
        let id = id.clone();
        let cancel = cancel.clone();
        Arc::new(move |progress| {
            if cancel.is_cancelled() {
                return;
            }
            tracing::trace!("Progress {}%", progress.percentage);
            shared.dispatch(&id, generation, UploadEvent::ProgressUpdate(progress));
        })
    };
    let receipt = gateway
        .transfer(&grant.destination, &file, on_progress, cancel.clone())
        .await;
    if cancel.is_cancelled() {
        return;
    }
    let receipt = match receipt {
        Ok(receipt) => receipt,
        Err(e) => {
            log_gateway_error("Transfer", &e);
            shared.dispatch(&id, generation, UploadEvent::error(e.to_string()));
            return;
        }
    };
    shared.dispatch(&id, generation, UploadEvent::Confirmed);

    let confirmation = gateway.confirm(&grant.upload_id, &file.name).await;
    if cancel.is_cancelled() {
        return;
    }
    match confirmation {
        Ok(confirmation) if confirmation.success => {
            tracing::info!("Upload complete: {}", receipt.url);
            shared.dispatch(
                &id,
                generation,
                UploadEvent::Succeeded(UploadOutcome {
                    receipt,
                    confirmation,
                }),
            );
        }
        Ok(confirmation) => {
            tracing::warn!("Confirmation refused: {}", confirmation.message);
            shared.dispatch(&id, generation, UploadEvent::error(confirmation.message));
        }
        Err(e) => {
            log_gateway_error("Confirmation", &e);
            shared.dispatch(&id, generation, UploadEvent::error(e.to_string()));
        }
    }
}

/// A gateway that stopped on its own cancellation check is not worth a warning
fn log_gateway_error(step: &str, e: &GatewayError) {
    if e.is_cancellation() {
        tracing::debug!("{} stopped: {}", step, e);
    } else {
        tracing::warn!("{} failed: {}", step, e);
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
