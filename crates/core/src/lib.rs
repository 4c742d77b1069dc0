//! Domain types and pure logic for the newsframe pipeline.
//!
//! This crate has zero internal deps so it can be shared by the ComfyUI
//! client, the news sources, the orchestrator and the worker binary.

pub mod clock;
pub mod error;
pub mod headline;
pub mod job;
pub mod naming;
pub mod prompt;
pub mod selection;
pub mod style;
pub mod summary;
pub mod types;
