//! Alert addressing for the dispatcher.
//!
//! The scheduler resolves the owner's contact details before dispatch, so
//! an [`AlertTarget`] is self-contained and the dispatcher never touches
//! storage.

use serde::Serialize;

use crate::target::{AlertSettings, Target};
use crate::types::DbId;

/// Message sent when a target transitions into `down`.
pub const DOWN_ALERT_MESSAGE: &str = "Website is down!";

/// Message sent by the manual test-alert hook.
pub const TEST_ALERT_MESSAGE: &str = "This is a test alert from Upwatch";

/// Everything the dispatcher needs to notify a target's owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertTarget {
    pub target_id: DbId,
    pub name: String,
    pub url: String,
    /// Resolved owner email, `None` when it could not be resolved.
    pub owner_email: Option<String>,
    pub alerts: AlertSettings,
}

impl AlertTarget {
    pub fn from_target(target: &Target, owner_email: Option<String>) -> Self {
        Self {
            target_id: target.id,
            name: target.name.clone(),
            url: target.url.clone(),
            owner_email: owner_email.filter(|e| !e.trim().is_empty()),
            alerts: target.alerts.clone(),
        }
    }
}
