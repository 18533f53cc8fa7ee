//! `kinema-worker` library crate.
//!
//! Re-exports the pipeline pieces for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod config;
pub mod output;
pub mod pipeline;
