//! # Xuexi Common Library
//!
//! Shared code for the xuexi runner and its tooling:
//! - Event model and the replayable EventLog
//! - TOML configuration loading and path resolution
//! - SSE helpers for streaming the EventLog over HTTP
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
