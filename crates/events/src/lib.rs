//! Upwatch live updates and alert delivery.
//!
//! - [`EventBus`]: in-process publish/subscribe hub for [`StatusUpdate`]s,
//!   backed by `tokio::sync::broadcast`.
//! - [`delivery`]: external delivery channels (SMTP email, webhook).
//! - [`AlertDispatcher`]: attempts every configured channel for one alert,
//!   with primary/alternate fallback for email.

pub mod bus;
pub mod delivery;
pub mod dispatcher;

pub use bus::{EventBus, StatusUpdate};
pub use delivery::email::{EmailConfig, EmailTransport, EmailTransports, SmtpTransport};
pub use delivery::webhook::WebhookDelivery;
pub use dispatcher::{AlertDispatcher, ChannelOutcome, DispatchResult, SkipReason, Transport};
