//! Upwatch domain model and monitoring rules.
//!
//! Pure logic and contracts shared by every other crate:
//!
//! - [`target`]: the monitored target, its bounds and the due predicate.
//! - [`probe`]: probe outcomes and HTTP status classification.
//! - [`status`]: the status enum and the alerting transition engine.
//! - [`history`]: check records and uptime math.
//! - [`repository`]: storage contracts implemented by `upwatch-db`.

pub mod alert;
pub mod channels;
pub mod error;
pub mod history;
pub mod probe;
pub mod repository;
pub mod status;
pub mod target;
pub mod types;
