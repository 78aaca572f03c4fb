//! # o2mc-core
//!
//! Core library for the O2MC tagging client.
//!
//! This library provides:
//! - The [`O2mc`] facade that owns a configured [`Tagger`]
//! - Batching and periodic dispatch of tracked events over HTTP
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use o2mc_core::O2mc;
//!
//! #[tokio::main]
//! async fn main() -> o2mc_core::Result<()> {
//!     let o2mc = O2mc::new("app-123", "https://collector.example.com", Duration::from_secs(30), true)?;
//!
//!     o2mc.tracker().track("MainActivityCreated");
//!     o2mc.tracker().track_with_properties("Clicked button", "Create Track Event");
//!
//!     o2mc.shutdown().await;
//!     Ok(())
//! }
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, TrackerConfig};
pub use error::{Error, Result};
pub use facade::O2mc;
pub use tracker::{DispatchOutcome, DispatchStats, Tagger};
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod facade;
pub mod logging;
pub mod tracker;
pub mod types;
