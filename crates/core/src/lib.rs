//! Core domain layer for the faceforge generation platform.
//!
//! Holds the request model and its validation, the transport codec for
//! image artifacts, remote job records and statuses, and the shared
//! exponential-backoff policy.  This crate performs no network I/O --
//! the HTTP layers live in `faceforge-comfyui` and `faceforge-cloud`.

pub mod artifact;
pub mod backoff;
pub mod error;
pub mod job;
pub mod request;
