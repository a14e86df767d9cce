//! Alert dispatch across email and webhook channels.
//!
//! [`AlertDispatcher::dispatch`] never fails: every channel is attempted
//! independently and its outcome lands in [`DispatchResult`]. The email
//! transports live behind an `RwLock<Option<Arc<_>>>`; a dispatch clones the
//! `Arc` once and uses that snapshot for both the primary and the alternate
//! attempt, so [`AlertDispatcher::refresh_transport`] can swap the handle at
//! any time without tearing an in-flight send.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use upwatch_core::alert::AlertTarget;
use upwatch_core::channels::{CHANNEL_EMAIL, CHANNEL_WEBHOOK};
use upwatch_core::types::Timestamp;

use crate::delivery::email::{load_transports_from_env, AlertEmail, EmailTransports};
use crate::delivery::webhook::{WebhookDelivery, WebhookPayload};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Which transport delivered an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Primary,
    Alternate,
    Http,
}

/// Why a channel was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The channel has no transport or destination configured.
    NotConfigured,
    /// The target opted out of this channel.
    Disabled,
    /// The owner's email address could not be resolved.
    MissingRecipient,
}

/// Outcome of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Sent(Transport),
    Failed(String),
    Skipped(SkipReason),
}

impl ChannelOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

/// Per-channel report of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub email: ChannelOutcome,
    pub webhook: ChannelOutcome,
}

impl DispatchResult {
    pub fn any_sent(&self) -> bool {
        self.email.is_sent() || self.webhook.is_sent()
    }
}

// ---------------------------------------------------------------------------
// AlertDispatcher
// ---------------------------------------------------------------------------

type TransportLoader = Box<dyn Fn() -> Option<EmailTransports> + Send + Sync>;

/// Delivers alerts to a target owner across every configured channel.
pub struct AlertDispatcher {
    transports: RwLock<Option<Arc<EmailTransports>>>,
    loader: TransportLoader,
    webhook: WebhookDelivery,
}

impl AlertDispatcher {
    /// Build a dispatcher whose email transports come from `SMTP_*` variables.
    pub fn from_env(webhook: WebhookDelivery) -> Self {
        Self::with_loader(webhook, load_transports_from_env)
    }

    /// Build a dispatcher with a custom transport loader.
    ///
    /// The loader runs once now and again on every
    /// [`refresh_transport`](Self::refresh_transport).
    pub fn with_loader<F>(webhook: WebhookDelivery, loader: F) -> Self
    where
        F: Fn() -> Option<EmailTransports> + Send + Sync + 'static,
    {
        let initial = loader().map(Arc::new);
        Self {
            transports: RwLock::new(initial),
            loader: Box::new(loader),
            webhook,
        }
    }

    /// Whether an email transport is currently installed.
    pub async fn email_configured(&self) -> bool {
        self.transports.read().await.is_some()
    }

    /// Rebuild the email transports and swap them in atomically.
    ///
    /// Returns whether email is configured afterwards.
    pub async fn refresh_transport(&self) -> bool {
        let fresh = (self.loader)().map(Arc::new);
        let configured = fresh.is_some();
        *self.transports.write().await = fresh;
        tracing::info!(email_configured = configured, "Email transport refreshed");
        configured
    }

    /// Attempt every channel for `target`. Never fails.
    pub async fn dispatch(&self, target: &AlertTarget, message: &str) -> DispatchResult {
        let now = chrono::Utc::now();
        let (email, webhook) = tokio::join!(
            self.send_email(target, message, now),
            self.send_webhook(target, message, now),
        );

        tracing::info!(
            target_id = target.target_id,
            email = ?email,
            webhook = ?webhook,
            "Alert dispatched"
        );
        DispatchResult { email, webhook }
    }

    async fn send_email(
        &self,
        target: &AlertTarget,
        message: &str,
        now: Timestamp,
    ) -> ChannelOutcome {
        if !target.alerts.email_enabled {
            return ChannelOutcome::Skipped(SkipReason::Disabled);
        }
        let Some(to) = target.owner_email.as_deref() else {
            tracing::warn!(target_id = target.target_id, "No owner email, skipping email alert");
            return ChannelOutcome::Skipped(SkipReason::MissingRecipient);
        };
        let Some(transports) = self.transports.read().await.clone() else {
            return ChannelOutcome::Skipped(SkipReason::NotConfigured);
        };

        let email = AlertEmail::render(target, message, now);

        let primary_err = match transports.primary.send(to, &email).await {
            Ok(()) => return ChannelOutcome::Sent(Transport::Primary),
            Err(e) => e,
        };
        tracing::warn!(
            target_id = target.target_id,
            channel = CHANNEL_EMAIL,
            transport = %transports.primary.describe(),
            error = %primary_err,
            "Primary email transport failed"
        );

        let Some(alternate) = transports.alternate.as_ref() else {
            return ChannelOutcome::Failed(format!("primary: {primary_err}"));
        };
        match alternate.send(to, &email).await {
            Ok(()) => ChannelOutcome::Sent(Transport::Alternate),
            Err(alt_err) => {
                tracing::error!(
                    target_id = target.target_id,
                    channel = CHANNEL_EMAIL,
                    transport = %alternate.describe(),
                    error = %alt_err,
                    "Alternate email transport failed"
                );
                ChannelOutcome::Failed(format!("primary: {primary_err}; alternate: {alt_err}"))
            }
        }
    }

    async fn send_webhook(
        &self,
        target: &AlertTarget,
        message: &str,
        now: Timestamp,
    ) -> ChannelOutcome {
        let Some(url) = target
            .alerts
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        else {
            return ChannelOutcome::Skipped(SkipReason::NotConfigured);
        };

        let payload = WebhookPayload::new(target, message, now);
        match self.webhook.deliver(url, &payload).await {
            Ok(()) => ChannelOutcome::Sent(Transport::Http),
            Err(e) => {
                tracing::error!(
                    target_id = target.target_id,
                    channel = CHANNEL_WEBHOOK,
                    url,
                    error = %e,
                    "Webhook delivery failed"
                );
                ChannelOutcome::Failed(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
