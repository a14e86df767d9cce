//! Upwatch HTTP server library.
//!
//! Exposes config, state, error handling, routes and the live-update
//! WebSocket so integration tests and the binary share one router.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
