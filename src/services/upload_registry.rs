//! Registry of live upload machines and the summary derived from them
//!
//! The registry owns one [`UploadSlot`] per submitted upload. Every change that
//! can move a machine between summary buckets goes through the registry, which
//! recomputes the [`UploadSummary`] and publishes it on a watch channel when it
//! changed. The published value therefore always matches the live machines.

use crate::model::summary::UploadSummary;
use crate::model::upload_event::UploadEvent;
use crate::model::upload_id::UploadId;
use crate::model::upload_machine::{Transition, UploadMachine};
use crate::model::upload_snapshot::UploadDetails;
use crate::model::upload_state::UploadState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Relaunches the driver of one upload with the given generation and start delay
pub type RestartHandle = Arc<dyn Fn(u64, Duration) -> Option<AbortHandle> + Send + Sync>;

/// Everything the orchestrator keeps about one upload
pub struct UploadSlot {
    machine: UploadMachine,
    /// Unix seconds
    created_at: u64,
    restart: Option<RestartHandle>,
    driver: Option<AbortHandle>,
    /// Bumped on every driver launch; events of older drivers are dropped
    generation: u64,
}

impl UploadSlot {
    pub fn new(machine: UploadMachine, created_at: u64) -> Self {
        UploadSlot {
            machine,
            created_at,
            restart: None,
            driver: None,
            generation: 0,
        }
    }

    pub fn with_restart(mut self, restart: RestartHandle) -> Self {
        self.restart = Some(restart);
        self
    }

    pub fn machine(&self) -> &UploadMachine {
        &self.machine
    }

    pub fn state(&self) -> UploadState {
        self.machine.state()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn can_restart(&self) -> bool {
        self.restart.is_some()
    }

    /// Launch a new driver, superseding any previous one.
    ///
    /// Returns false if the slot has no restart capability.
    pub fn launch(&mut self, delay: Duration) -> bool {
        let Some(restart) = self.restart.clone() else {
            return false;
        };
        self.abort_driver();
        self.generation += 1;
        self.driver = restart(self.generation, delay);
        self.driver.is_some()
    }

    fn abort_driver(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }

    /// Flip the cancellation signal, stop the machine and abort its driver
    fn teardown(&mut self) {
        self.machine.context().cancel.cancel();
        self.machine.stop();
        self.abort_driver();
    }

    pub fn details(&self, id: &UploadId) -> UploadDetails {
        let context = self.machine.context();
        UploadDetails {
            id: id.clone(),
            name: context.file.name.clone(),
            size_bytes: context.file.size_bytes,
            state: self.machine.state(),
            upload_id: context.upload_id.clone(),
            destination: context.destination.clone(),
            progress: context.progress,
            error: context.error.clone(),
            result: context.result.clone(),
            created_at: self.created_at,
        }
    }
}

pub struct UploadRegistry {
    slots: HashMap<UploadId, UploadSlot>,
    /// Submission order
    order: Vec<UploadId>,
    summary_tx: watch::Sender<UploadSummary>,
}

impl Default for UploadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadRegistry {
    pub fn new() -> Self {
        let (summary_tx, _) = watch::channel(UploadSummary::default());
        UploadRegistry {
            slots: HashMap::new(),
            order: Vec::new(),
            summary_tx,
        }
    }

    /// Add a slot under `id`. Returns false and leaves the registry untouched
    /// if the id is already taken.
    pub fn register(&mut self, id: UploadId, slot: UploadSlot) -> bool {
        if self.slots.contains_key(&id) {
            tracing::warn!("Upload {} is already registered", id);
            return false;
        }
        self.order.push(id.clone());
        self.slots.insert(id, slot);
        self.publish();
        true
    }

    /// Remove the slot under `id`, stopping its machine and driver
    pub fn unregister(&mut self, id: &UploadId) -> Option<UploadSlot> {
        let mut slot = self.slots.remove(id)?;
        self.order.retain(|other| other != id);
        slot.teardown();
        self.publish();
        Some(slot)
    }

    /// Remove every slot, stopping all machines and drivers
    pub fn clear(&mut self) -> usize {
        let count = self.slots.len();
        for slot in self.slots.values_mut() {
            slot.teardown();
        }
        self.slots.clear();
        self.order.clear();
        self.publish();
        count
    }

    pub fn get(&self, id: &UploadId) -> Option<&UploadSlot> {
        self.slots.get(id)
    }

    pub fn get_mut(&mut self, id: &UploadId) -> Option<&mut UploadSlot> {
        self.slots.get_mut(id)
    }

    pub fn contains(&self, id: &UploadId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Ids in submission order
    pub fn ids(&self) -> Vec<UploadId> {
        self.order.clone()
    }

    /// Ids of the uploads currently in `state`, in submission order
    pub fn ids_in_state(&self, state: UploadState) -> Vec<UploadId> {
        self.iter()
            .filter(|(_, slot)| slot.state() == state)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Slots in submission order
    pub fn iter(&self) -> impl Iterator<Item = (&UploadId, &UploadSlot)> {
        self.order
            .iter()
            .filter_map(move |id| self.slots.get(id).map(|slot| (id, slot)))
    }

    /// Deliver `event` to the machine registered under `id`.
    ///
    /// With `generation` set, the event is dropped unless it matches the
    /// generation of the slot's current driver. Unknown ids are ignored.
    pub fn dispatch(
        &mut self,
        id: &UploadId,
        generation: Option<u64>,
        event: UploadEvent,
    ) -> Option<Transition> {
        let Some(slot) = self.slots.get_mut(id) else {
            tracing::trace!("Dropping {:?} for unknown upload {}", event.kind(), id);
            return None;
        };
        if generation.is_some_and(|g| g != slot.generation) {
            tracing::trace!("Dropping {:?} from a stale driver of {}", event.kind(), id);
            return None;
        }

        let transition = slot.machine.send(event)?;
        if transition.changed_state() {
            tracing::debug!(
                "Upload {}: {} -> {} on {:?}",
                id,
                transition.from,
                transition.to,
                transition.event
            );
            self.publish();
        }
        Some(transition)
    }

    /// Summary computed from the live machines
    pub fn summary(&self) -> UploadSummary {
        UploadSummary::from_states(self.slots.values().map(|slot| slot.state()))
    }

    /// Summary last published to subscribers
    pub fn published_summary(&self) -> UploadSummary {
        *self.summary_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadSummary> {
        self.summary_tx.subscribe()
    }

    pub fn details(&self, id: &UploadId) -> Option<UploadDetails> {
        self.slots.get(id).map(|slot| slot.details(id))
    }

    pub fn all_details(&self) -> Vec<UploadDetails> {
        self.iter().map(|(id, slot)| slot.details(id)).collect()
    }

    fn publish(&self) {
        let next = self.summary();
        self.summary_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
