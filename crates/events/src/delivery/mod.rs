//! External delivery channels for alerts.

pub mod email;
pub mod webhook;
