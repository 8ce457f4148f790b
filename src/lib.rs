//! # uploadflow
//!
//! Concurrent, resumable multi-step file uploads.
//!
//! Every submitted file is driven through three remote operations (request a
//! destination, transfer the bytes with progress, confirm completion) by its
//! own state machine. Uploads can be cancelled individually or in bulk, retried
//! from the failed step or from scratch, and an aggregate summary of all
//! uploads is kept up to date as they progress.
//!
//! The library is used by the `uploadflow` binary, which runs uploads against
//! a simulated gateway, and by the integration tests.

#![forbid(unsafe_code)]

pub mod model;
pub mod services;
pub mod settings;
pub mod utils;
