//! Run orchestration: headline -> prompt -> image job -> persisted artifact.
//!
//! [`run::RunOrchestrator`] performs one run; [`trigger::RunTrigger`]
//! repeats runs on an interval until stopped.

pub mod composite;
pub mod error;
pub mod retention;
pub mod run;
pub mod store;
pub mod trigger;
