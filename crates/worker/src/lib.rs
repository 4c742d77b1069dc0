//! Worker process: configuration and wiring for the newsframe binary.

pub mod app;
pub mod config;
