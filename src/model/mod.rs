//! This module provides the objects describing an upload: its file, its protocol
//! states and events, the machine driving them and the views derived from it

pub mod error;
pub mod remote;
pub mod summary;
pub mod upload_context;
pub mod upload_event;
pub mod upload_file;
pub mod upload_id;
pub mod upload_machine;
pub mod upload_snapshot;
pub mod upload_state;
