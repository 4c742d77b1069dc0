//! ComfyUI client library.
//!
//! Provides the [`server::ImageServer`] seam, its REST implementation
//! ([`api::ComfyUIApi`]), workflow graph patching, typed history parsing,
//! poll retry backoff and the [`job::JobClient`] that drives one
//! generation job from submission to artifact retrieval.

pub mod api;
pub mod history;
pub mod job;
pub mod retry;
pub mod server;
pub mod workflow;
