//! Alert email delivery via SMTP.
//!
//! [`SmtpTransport`] wraps the `lettre` async SMTP transport. Two of them are
//! built from one [`EmailConfig`]: the primary (implicit TLS, port 465 by
//! default) and an alternate (STARTTLS, port 587 by default) that shares the
//! same credentials. The dispatcher only sees the [`EmailTransport`] trait so
//! tests can substitute recording transports.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use upwatch_core::alert::AlertTarget;
use upwatch_core::types::Timestamp;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for a single email send attempt.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

/// Error raised while turning configuration into transports.
#[derive(Debug, thiserror::Error)]
pub enum EmailConfigError {
    #[error("SMTP_USER is set to '{user}' but SMTP_PASSWORD is missing")]
    MissingPassword { user: String },

    #[error("Invalid sender address '{address}': {source}")]
    FromAddress {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("Cannot build SMTP relay for {host}: {source}")]
    Relay {
        host: String,
        #[source]
        source: lettre::transport::smtp::Error,
    },
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default port of the primary transport (implicit TLS).
const DEFAULT_PRIMARY_PORT: u16 = 465;

/// Default port of the alternate transport (STARTTLS).
const DEFAULT_ALTERNATE_PORT: u16 = 587;

/// Sender address used when neither `SMTP_FROM` nor `SMTP_USER` is set.
const DEFAULT_FROM_ADDRESS: &str = "alerts@upwatch.local";

/// Display name on the `From` header.
const DEFAULT_FROM_NAME: &str = "Upwatch";

/// Upper bound on one SMTP conversation.
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// TLS from the first byte (SMTPS).
    Tls,
    /// Plain connection upgraded with STARTTLS.
    StartTls,
    /// No encryption. Only sensible for local relays.
    None,
}

impl FromStr for SmtpSecurity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tls" | "ssl" | "smtps" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            "none" | "plain" => Ok(Self::None),
            other => Err(format!("unknown SMTP security mode '{other}'")),
        }
    }
}

impl fmt::Display for SmtpSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tls => "tls",
            Self::StartTls => "starttls",
            Self::None => "none",
        })
    }
}

/// One SMTP server to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpEndpoint {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
}

impl fmt::Display for SmtpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.port, self.security)
    }
}

/// Configuration for both email transports.
#[derive(Clone)]
pub struct EmailConfig {
    pub primary: SmtpEndpoint,
    pub alternate: SmtpEndpoint,
    /// RFC 5322 "From" address.
    pub from_address: String,
    pub from_name: String,
    /// Username and password, shared by both transports.
    pub credentials: Option<(String, String)>,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("primary", &self.primary)
            .field("alternate", &self.alternate)
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .field("user", &self.credentials.as_ref().map(|(u, _)| u))
            .finish()
    }
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable            | Default                          |
    /// |---------------------|----------------------------------|
    /// | `SMTP_HOST`         | -                                |
    /// | `SMTP_PORT`         | `465`                            |
    /// | `SMTP_SECURITY`     | `tls`                            |
    /// | `SMTP_ALT_HOST`     | value of `SMTP_HOST`             |
    /// | `SMTP_ALT_PORT`     | `587`                            |
    /// | `SMTP_ALT_SECURITY` | `starttls`                       |
    /// | `SMTP_USER`         | -                                |
    /// | `SMTP_PASSWORD`     | -                                |
    /// | `SMTP_FROM`         | `SMTP_USER`, else `alerts@upwatch.local` |
    /// | `SMTP_FROM_NAME`    | `Upwatch`                        |
    pub fn from_env() -> Result<Option<Self>, EmailConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EmailConfig::from_env`] with an arbitrary variable source.
    ///
    /// Unparseable ports or security modes fall back to their defaults with
    /// a warning.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, EmailConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let Some(host) = var("SMTP_HOST") else {
            return Ok(None);
        };

        let user = var("SMTP_USER");
        let credentials = match (user, var("SMTP_PASSWORD")) {
            (Some(user), Some(pass)) => Some((user, pass)),
            (Some(user), None) => return Err(EmailConfigError::MissingPassword { user }),
            (None, _) => None,
        };

        let primary = SmtpEndpoint {
            port: parse_or_default("SMTP_PORT", var("SMTP_PORT"), DEFAULT_PRIMARY_PORT),
            security: parse_or_default("SMTP_SECURITY", var("SMTP_SECURITY"), SmtpSecurity::Tls),
            host: host.clone(),
        };
        let alternate = SmtpEndpoint {
            host: var("SMTP_ALT_HOST").unwrap_or(host),
            port: parse_or_default("SMTP_ALT_PORT", var("SMTP_ALT_PORT"), DEFAULT_ALTERNATE_PORT),
            security: parse_or_default(
                "SMTP_ALT_SECURITY",
                var("SMTP_ALT_SECURITY"),
                SmtpSecurity::StartTls,
            ),
        };

        let from_address = var("SMTP_FROM")
            .or_else(|| credentials.as_ref().map(|(user, _)| user.clone()))
            .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string());

        Ok(Some(Self {
            primary,
            alternate,
            from_address,
            from_name: var("SMTP_FROM_NAME").unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
            credentials,
        }))
    }

    fn sender(&self) -> Result<Mailbox, EmailConfigError> {
        let address: Address =
            self.from_address
                .parse()
                .map_err(|source| EmailConfigError::FromAddress {
                    address: self.from_address.clone(),
                    source,
                })?;
        Ok(Mailbox::new(Some(self.from_name.clone()), address))
    }
}

fn parse_or_default<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
    }
}

// ---------------------------------------------------------------------------
// AlertEmail
// ---------------------------------------------------------------------------

/// A rendered alert, identical for every transport attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl AlertEmail {
    pub fn render(target: &AlertTarget, message: &str, at: Timestamp) -> Self {
        let time = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let subject = format!("Upwatch Alert: {}", target.name);
        let text = format!(
            "{message}\n\nTarget: {}\nURL: {}\nTime: {time}",
            target.name, target.url
        );

        let message = escape_html(message);
        let name = escape_html(&target.name);
        let url = escape_html(&target.url);
        let html = format!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
             <h2>Upwatch Alert</h2>\
             <div style=\"padding: 20px; border: 1px solid #e0e0e0; border-radius: 5px;\">\
             <p style=\"font-size: 16px; font-weight: bold;\">{message}</p>\
             <p><strong>Target:</strong> {name}</p>\
             <p><strong>URL:</strong> <a href=\"{url}\">{url}</a></p>\
             <p><strong>Time:</strong> {time}</p>\
             </div>\
             <p style=\"color: #757575; font-size: 12px;\">This is an automated alert from Upwatch</p>\
             </div>"
        );

        Self {
            subject,
            text,
            html,
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Transports
// ---------------------------------------------------------------------------

/// Something that can deliver a rendered alert to one recipient.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, to: &str, email: &AlertEmail) -> Result<(), EmailError>;

    /// Human-readable identity for logs.
    fn describe(&self) -> String;
}

/// `lettre` SMTP transport bound to one endpoint.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    endpoint: SmtpEndpoint,
}

impl SmtpTransport {
    pub fn new(endpoint: &SmtpEndpoint, config: &EmailConfig) -> Result<Self, EmailConfigError> {
        let relay_err = |source| EmailConfigError::Relay {
            host: endpoint.host.clone(),
            source,
        };

        let mut builder = match endpoint.security {
            SmtpSecurity::Tls => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&endpoint.host).map_err(relay_err)?
            }
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&endpoint.host)
                    .map_err(relay_err)?
            }
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&endpoint.host)
            }
        }
        .port(endpoint.port)
        .timeout(Some(SMTP_TIMEOUT));

        if let Some((user, pass)) = &config.credentials {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from: config.sender()?,
            endpoint: endpoint.clone(),
        })
    }
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    async fn send(&self, to: &str, email: &AlertEmail) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>()?)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.mailer.send(message).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("smtp {}", self.endpoint)
    }
}

/// The primary transport plus the single alternate tried on failure.
#[derive(Clone)]
pub struct EmailTransports {
    pub primary: Arc<dyn EmailTransport>,
    pub alternate: Option<Arc<dyn EmailTransport>>,
}

impl EmailTransports {
    /// Build both SMTP transports.
    ///
    /// A primary that cannot be built is an error; an alternate that cannot
    /// be built is dropped with a warning.
    pub fn from_config(config: &EmailConfig) -> Result<Self, EmailConfigError> {
        let primary = SmtpTransport::new(&config.primary, config)?;
        let alternate = match SmtpTransport::new(&config.alternate, config) {
            Ok(t) => Some(Arc::new(t) as Arc<dyn EmailTransport>),
            Err(e) => {
                tracing::warn!(error = %e, "Alternate SMTP transport unavailable");
                None
            }
        };
        Ok(Self {
            primary: Arc::new(primary),
            alternate,
        })
    }
}

/// Read `SMTP_*` variables and build transports.
///
/// Any configuration problem disables email with a single warning.
pub fn load_transports_from_env() -> Option<EmailTransports> {
    let config = match EmailConfig::from_env() {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::warn!("SMTP_HOST not set, email alerts disabled");
            return None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Email alerts disabled");
            return None;
        }
    };

    match EmailTransports::from_config(&config) {
        Ok(transports) => {
            tracing::info!(
                primary = %config.primary,
                alternate = %config.alternate,
                "Email transports configured"
            );
            Some(transports)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Email alerts disabled");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
