//! Event tracking and dispatch
//!
//! ## Architecture
//!
//! ```text
//! track() ──▶ EventBus ──▶ BatchBus ──▶ pending Batch ──▶ POST endpoint
//!                              ▲
//!                   DispatchTimer (every interval)
//! ```
//!
//! - Events are buffered in memory until the next dispatch cycle
//! - At most one batch is in flight; a failed batch is resent on later
//!   cycles and carries its retry count
//! - Network failures never reach the caller of `track()`

mod batch_bus;
mod client;
mod event_bus;
mod tagger;
mod timer;

pub use client::DispatchClient;
pub use tagger::{DispatchOutcome, DispatchStats, Tagger};
pub use timer::DispatchTimer;
