//! ComfyUI WebSocket and REST client library.
//!
//! Provides engine configuration, typed message parsing, WebSocket
//! connection handling, HTTP API wrappers, the per-job result
//! demultiplexer, and a session type that ties submission and result
//! collection together.

pub mod api;
pub mod client;
pub mod collector;
pub mod config;
pub mod messages;
pub mod session;
