//! Local execution driver for a ComfyUI-compatible engine.
//!
//! Provides a typed node-graph workflow model with parameter patching,
//! a REST wrapper over the engine's HTTP API, reference-image staging
//! into the engine's input directory, and the bounded submit-and-poll
//! driver that turns a patched graph into output artifacts.

pub mod api;
pub mod driver;
pub mod inputs;
pub mod workflow;
