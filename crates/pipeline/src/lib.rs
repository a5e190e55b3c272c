//! Orchestration façade over the local engine and the remote queue.
//!
//! Exposes the single `generate` operation callers use, plus strictly
//! sequential batch generation and artifact saving.  Backend choice and
//! all credentials are injected through [`config::GeneratorConfig`],
//! resolved once at process start.

pub mod config;
pub mod generator;
