//! Finite-state protocol instance for one upload
//!
//! The machine only records what happened: it never calls the gateway and
//! holds no retry policy. All transitions live in [`UploadMachine::transition`],
//! keyed by the current state and the incoming event; anything not listed there
//! is ignored, so duplicate or late events are harmless.

use crate::model::remote::{UploadOutcome, UploadProgress};
use crate::model::upload_context::UploadContext;
use crate::model::upload_event::{EventKind, UploadEvent};
use crate::model::upload_id::UploadId;
use crate::model::upload_state::UploadState;
use url::Url;

/// How the context changes when a transition fires
#[derive(Debug, Clone, PartialEq)]
enum ContextUpdate {
    Keep,
    StoreDestination { upload_id: UploadId, destination: Url },
    ReplaceProgress(UploadProgress),
    StoreResult(UploadOutcome),
    StoreError(String),
    ClearError,
    ResetForRetry,
}

/// A transition that was applied to a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: UploadState,
    pub to: UploadState,
    pub event: EventKind,
}

impl Transition {
    pub fn changed_state(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone)]
pub struct UploadMachine {
    state: UploadState,
    context: UploadContext,
    /// Working state that produced the current failure
    failed_from: Option<UploadState>,
    stopped: bool,
}

impl UploadMachine {
    pub fn new(context: UploadContext) -> Self {
        UploadMachine {
            state: UploadState::Idle,
            context,
            failed_from: None,
            stopped: false,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn context(&self) -> &UploadContext {
        &self.context
    }

    /// Working state the current failure occurred in, if failed
    pub fn failed_from(&self) -> Option<UploadState> {
        self.failed_from
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop the machine. A stopped machine ignores every further event.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Feed one event to the machine.
    ///
    /// Returns the applied transition, or `None` if the event was not valid in
    /// the current state.
    pub fn send(&mut self, event: UploadEvent) -> Option<Transition> {
        if self.stopped {
            return None;
        }
        let kind = event.kind();
        let from = self.state;
        let (to, update) = self.transition(event)?;
        self.apply(to, update);
        Some(Transition {
            from,
            to,
            event: kind,
        })
    }

    fn transition(&self, event: UploadEvent) -> Option<(UploadState, ContextUpdate)> {
        use UploadState::*;

        match (self.state, event) {
            (Idle, UploadEvent::Start) => Some((GettingDestination, ContextUpdate::Keep)),

            (
                GettingDestination,
                UploadEvent::DestinationReceived {
                    upload_id,
                    destination,
                },
            ) => Some((
                Transferring,
                ContextUpdate::StoreDestination {
                    upload_id,
                    destination,
                },
            )),

            (Transferring, UploadEvent::ProgressUpdate(progress)) => {
                Some((Transferring, ContextUpdate::ReplaceProgress(progress)))
            }
            (Transferring, UploadEvent::Confirmed) => Some((Confirming, ContextUpdate::Keep)),

            (Transferring | Confirming, UploadEvent::Succeeded(outcome)) => {
                Some((Success, ContextUpdate::StoreResult(outcome)))
            }

            (GettingDestination | Transferring | Confirming, UploadEvent::Error { reason }) => {
                Some((Failure, ContextUpdate::StoreError(reason)))
            }
            (GettingDestination | Transferring | Confirming, UploadEvent::Cancel) => {
                Some((Cancelled, ContextUpdate::Keep))
            }

            (Failure, UploadEvent::RetryStep) => Some((
                self.failed_from.unwrap_or(GettingDestination),
                ContextUpdate::ClearError,
            )),
            (Failure, UploadEvent::RetryAll) => {
                Some((GettingDestination, ContextUpdate::ResetForRetry))
            }

            _ => None,
        }
    }

    fn apply(&mut self, to: UploadState, update: ContextUpdate) {
        let ctx = &mut self.context;
        match update {
            ContextUpdate::Keep => {}
            ContextUpdate::StoreDestination {
                upload_id,
                destination,
            } => {
                ctx.upload_id = Some(upload_id);
                ctx.destination = Some(destination);
            }
            ContextUpdate::ReplaceProgress(progress) => ctx.progress = Some(progress),
            ContextUpdate::StoreResult(outcome) => {
                ctx.result = Some(outcome);
                ctx.error = None;
            }
            ContextUpdate::StoreError(reason) => {
                ctx.error = Some(reason);
                ctx.result = None;
            }
            ContextUpdate::ClearError => ctx.error = None,
            ContextUpdate::ResetForRetry => {
                ctx.error = None;
                ctx.progress = None;
                ctx.result = None;
            }
        }

        self.failed_from = if to == UploadState::Failure {
            Some(self.state)
        } else {
            None
        };
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::remote::{Confirmation, TransferReceipt};
    use crate::model::upload_file::UploadFile;
    use crate::services::cancellation::CancelSignal;

    fn machine() -> UploadMachine {
        let file = UploadFile::from_bytes("a.txt", vec![0u8; 100]);
        UploadMachine::new(UploadContext::new(file, CancelSignal::new()))
    }

    fn destination() -> UploadEvent {
        UploadEvent::DestinationReceived {
            upload_id: UploadId::from("upload_1"),
            destination: Url::parse("https://api.example.com/upload/1?size=100").unwrap(),
        }
    }

    fn outcome() -> UploadOutcome {
        UploadOutcome {
            receipt: TransferReceipt {
                id: "1".into(),
                filename: "a.txt".into(),
                size_bytes: 100,
                url: "https://example.com/uploads/a.txt".into(),
                uploaded_at: 0,
            },
            confirmation: Confirmation {
                success: true,
                message: "Successfully processed a.txt".into(),
            },
        }
    }

    fn transferring() -> UploadMachine {
        let mut m = machine();
        m.send(UploadEvent::Start);
        m.send(destination());
        assert_eq!(m.state(), UploadState::Transferring);
        m
    }

    #[test]
    fn test_happy_path() {
        let mut m = transferring();
        m.send(UploadEvent::ProgressUpdate(UploadProgress::new(50, 100)));
        m.send(UploadEvent::ProgressUpdate(UploadProgress::new(100, 100)));
        m.send(UploadEvent::Confirmed);
        assert_eq!(m.state(), UploadState::Confirming);
        m.send(UploadEvent::Succeeded(outcome()));

        assert_eq!(m.state(), UploadState::Success);
        assert_eq!(m.context().progress.unwrap().percentage, 100);
        assert!(m.context().result.is_some());
        assert!(m.context().error.is_none());
        assert_eq!(m.context().upload_id, Some(UploadId::from("upload_1")));
    }

    #[test]
    fn test_success_directly_from_transferring() {
        let mut m = transferring();
        let t = m.send(UploadEvent::Succeeded(outcome())).unwrap();
        assert_eq!(t.from, UploadState::Transferring);
        assert_eq!(t.to, UploadState::Success);
    }

    #[test]
    fn test_progress_is_replaced_wholesale() {
        let mut m = transferring();
        m.send(UploadEvent::ProgressUpdate(UploadProgress::new(80, 100)));
        m.send(UploadEvent::ProgressUpdate(UploadProgress::new(20, 100)));
        assert_eq!(m.context().progress, Some(UploadProgress::new(20, 100)));
    }

    #[test]
    fn test_invalid_events_are_ignored() {
        let mut m = machine();
        assert!(m.send(UploadEvent::Confirmed).is_none());
        assert!(m.send(destination()).is_none());
        assert!(m.send(UploadEvent::Cancel).is_none());
        assert!(m.send(UploadEvent::RetryAll).is_none());
        assert_eq!(m.state(), UploadState::Idle);

        m.send(UploadEvent::Start);
        assert!(m.send(UploadEvent::Start).is_none());
        assert!(m
            .send(UploadEvent::ProgressUpdate(UploadProgress::new(1, 100)))
            .is_none());
        assert!(m.context().progress.is_none());
    }

    #[test]
    fn test_error_records_reason_and_origin() {
        let mut m = machine();
        m.send(UploadEvent::Start);
        m.send(UploadEvent::error("network error"));

        assert_eq!(m.state(), UploadState::Failure);
        assert_eq!(m.failed_from(), Some(UploadState::GettingDestination));
        assert_eq!(m.context().error.as_deref(), Some("network error"));
        assert!(m.context().result.is_none());
    }

    #[test]
    fn test_retry_step_returns_to_failed_step_and_keeps_context() {
        let mut m = transferring();
        m.send(UploadEvent::ProgressUpdate(UploadProgress::new(40, 100)));
        m.send(UploadEvent::error("Upload failed - network error"));
        assert_eq!(m.failed_from(), Some(UploadState::Transferring));

        m.send(UploadEvent::RetryStep);

        assert_eq!(m.state(), UploadState::Transferring);
        assert!(m.context().error.is_none());
        assert_eq!(m.context().upload_id, Some(UploadId::from("upload_1")));
        assert!(m.context().destination.is_some());
        assert_eq!(m.context().progress, Some(UploadProgress::new(40, 100)));
        assert_eq!(m.failed_from(), None);
    }

    #[test]
    fn test_retry_step_from_confirming() {
        let mut m = transferring();
        m.send(UploadEvent::Confirmed);
        m.send(UploadEvent::error("Failed to notify completion - network error"));
        m.send(UploadEvent::RetryStep);
        assert_eq!(m.state(), UploadState::Confirming);
    }

    #[test]
    fn test_retry_all_resets_to_getting_destination() {
        let mut m = transferring();
        let cancel = m.context().cancel.clone();
        m.send(UploadEvent::ProgressUpdate(UploadProgress::new(40, 100)));
        m.send(UploadEvent::error("boom"));

        m.send(UploadEvent::RetryAll);

        assert_eq!(m.state(), UploadState::GettingDestination);
        assert!(m.context().error.is_none());
        assert!(m.context().progress.is_none());
        assert!(m.context().result.is_none());
        assert_eq!(m.context().file.name, "a.txt");
        assert!(m.context().cancel.same_as(&cancel));
    }

    #[test]
    fn test_cancel_from_every_working_state() {
        let mut m = machine();
        m.send(UploadEvent::Start);
        m.send(UploadEvent::Cancel);
        assert_eq!(m.state(), UploadState::Cancelled);

        let mut m = transferring();
        m.send(UploadEvent::Cancel);
        assert_eq!(m.state(), UploadState::Cancelled);

        let mut m = transferring();
        m.send(UploadEvent::Confirmed);
        m.send(UploadEvent::Cancel);
        assert_eq!(m.state(), UploadState::Cancelled);
        assert!(m.context().error.is_none());
    }

    #[test]
    fn test_terminal_states_ignore_everything() {
        let mut m = transferring();
        m.send(UploadEvent::Cancel);
        assert!(m.send(UploadEvent::Succeeded(outcome())).is_none());
        assert!(m
            .send(UploadEvent::ProgressUpdate(UploadProgress::new(100, 100)))
            .is_none());
        assert!(m.send(UploadEvent::RetryAll).is_none());
        assert_eq!(m.state(), UploadState::Cancelled);
        assert!(m.context().result.is_none());

        let mut m = transferring();
        m.send(UploadEvent::Succeeded(outcome()));
        assert!(m.send(UploadEvent::error("late")).is_none());
        assert!(m.send(UploadEvent::Cancel).is_none());
        assert_eq!(m.state(), UploadState::Success);
        assert!(m.context().error.is_none());
    }

    #[test]
    fn test_failure_ignores_cancel_and_errors() {
        let mut m = transferring();
        m.send(UploadEvent::error("first"));
        assert!(m.send(UploadEvent::Cancel).is_none());
        assert!(m.send(UploadEvent::error("second")).is_none());
        assert_eq!(m.context().error.as_deref(), Some("first"));
    }

    #[test]
    fn test_stopped_machine_ignores_events() {
        let mut m = machine();
        m.stop();
        assert!(m.send(UploadEvent::Start).is_none());
        assert_eq!(m.state(), UploadState::Idle);
    }
}
