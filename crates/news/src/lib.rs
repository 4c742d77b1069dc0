//! Headline sources.
//!
//! The orchestrator depends only on [`source::HeadlineSource`]. The RSS
//! implementation fetches every configured feed concurrently and tolerates
//! individual feed failures; the static source serves operator-supplied
//! headlines.

pub mod error;
pub mod feed;
pub mod rss;
pub mod source;
