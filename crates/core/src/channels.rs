//! Well-known alert channel name constants.
//!
//! Used as structured log fields and as keys in dispatch reports.

/// Alert delivered via SMTP.
pub const CHANNEL_EMAIL: &str = "email";

/// Alert delivered as a JSON POST to the target's webhook URL.
pub const CHANNEL_WEBHOOK: &str = "webhook";
