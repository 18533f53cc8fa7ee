//! Core domain logic for kinema.
//!
//! Pose data, the canonical skeleton tables, conditioning-image rendering,
//! typed job graphs and session identifiers. Nothing in this crate talks to
//! the network; the engine client lives in `kinema-comfyui`.

pub mod canvas;
pub mod coords;
pub mod error;
pub mod job_graph;
pub mod pose;
pub mod render;
pub mod session;
pub mod skeleton;
