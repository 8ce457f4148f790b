//! This module provides the asynchronous side of uploading: the gateway
//! boundary, the orchestrator driving upload machines and the history store

pub mod cancellation;
pub mod gateway;
pub mod simulated_gateway;
pub mod upload_history;
pub mod upload_orchestrator;
pub mod upload_registry;
