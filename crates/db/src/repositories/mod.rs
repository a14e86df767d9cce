//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod check_history_repo;
pub mod target_repo;
pub mod user_repo;

pub use check_history_repo::CheckHistoryRepo;
pub use target_repo::TargetRepo;
pub use user_repo::UserRepo;
