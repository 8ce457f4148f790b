//! Lifecycle states of a single upload
//!
//! Every upload machine is in exactly one of these states. The states are grouped
//! into coarse classes for the aggregate summary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the lifecycle state of an upload.
///
/// `Success` and `Cancelled` are terminal. `Failure` is recoverable through
/// either kind of retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// Submitted but not started yet
    #[default]
    Idle,
    /// Waiting for the gateway to hand out an upload destination
    GettingDestination,
    /// Bytes are being transferred to the destination
    Transferring,
    /// Transfer finished, waiting for the gateway to confirm it
    Confirming,
    /// Upload completed successfully
    Success,
    /// One of the remote operations failed
    Failure,
    /// Upload cancelled by the user
    Cancelled,
}

/// Coarse bucket an upload state is counted in by the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateClass {
    Idle,
    Uploading,
    Success,
    Failure,
    Cancelled,
}

impl UploadState {
    /// All states, in lifecycle order
    pub const ALL: [UploadState; 7] = [
        UploadState::Idle,
        UploadState::GettingDestination,
        UploadState::Transferring,
        UploadState::Confirming,
        UploadState::Success,
        UploadState::Failure,
        UploadState::Cancelled,
    ];

    /// Returns the summary bucket for this state
    pub fn class(&self) -> StateClass {
        match self {
            UploadState::Idle => StateClass::Idle,
            UploadState::GettingDestination
            | UploadState::Transferring
            | UploadState::Confirming => StateClass::Uploading,
            UploadState::Success => StateClass::Success,
            UploadState::Failure => StateClass::Failure,
            UploadState::Cancelled => StateClass::Cancelled,
        }
    }

    /// Returns true while one of the three remote operations is in flight
    pub fn is_active(&self) -> bool {
        self.class() == StateClass::Uploading
    }

    /// Returns true if no further transition is accepted
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Success | UploadState::Cancelled)
    }

    /// Returns true if the upload failed and can be retried
    pub fn is_failed(&self) -> bool {
        matches!(self, UploadState::Failure)
    }

    /// Returns true if the upload completed successfully
    pub fn is_success(&self) -> bool {
        matches!(self, UploadState::Success)
    }

    /// Returns true if the upload was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadState::Cancelled)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadState::Idle => write!(f, "Idle"),
            UploadState::GettingDestination => write!(f, "Getting destination"),
            UploadState::Transferring => write!(f, "Transferring"),
            UploadState::Confirming => write!(f, "Confirming"),
            UploadState::Success => write!(f, "Success"),
            UploadState::Failure => write!(f, "Failure"),
            UploadState::Cancelled => write!(f, "Cancelled"),
        }
    }
}
