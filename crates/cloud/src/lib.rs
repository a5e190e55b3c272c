//! Remote job client for the queue-based compute service.
//!
//! Submits generation requests to a bearer-authenticated remote queue,
//! polls job status to a terminal state, and retrieves output payloads.
//! The synchronous run path carries an exponential-backoff retry
//! envelope for the gateway errors endpoints produce while cold-starting.

pub mod client;
pub mod payload;
