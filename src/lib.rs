//! trickshelf - client layer for a trick-sharing site
//!
//! A slim top-of-page progress indicator plus the client plumbing around it.
//!
//! # Architecture
//!
//! - **dom**: in-memory document the indicator renders into
//! - **progress**: indicator state machine, transition queue, operation tracker
//! - **storage**: expiring JSON cache
//! - **api**: REST client over a pluggable transport
//! - **shell** / **controllers**: page boot, session lookup and form handling

pub mod errors;
pub use errors::{Result, ShelfError};

// Indicator engine
pub mod dom;
pub mod progress;
pub use progress::{ProgressBar, ProgressOptions, ProgressStatus, Settings};

// Client plumbing
pub mod api;
pub mod config;
pub mod controllers;
pub mod shell;
pub mod storage;
pub use config::AppConfig;
pub use shell::AppShell;
pub use storage::TtlStore;

pub mod cli;
