//! Upwatch monitoring core.
//!
//! - [`Prober`]: one HTTP GET per target, classified into a
//!   [`ProbeOutcome`](upwatch_core::probe::ProbeOutcome).
//! - [`Scheduler`]: the tick loop. Selects due targets, probes them with
//!   bounded concurrency and applies each result (history, status, live
//!   update, alert) in isolation from every other target.
//! - [`Monitor`]: facade handed to the HTTP layer for on-demand probes,
//!   test alerts and live-update subscriptions.

pub mod config;
pub mod error;
pub mod prober;
pub mod scheduler;
pub mod service;

pub use config::MonitorConfig;
pub use error::MonitorError;
pub use prober::Prober;
pub use scheduler::{MonitorStores, Scheduler, TickReport};
pub use service::Monitor;
