//! Shared helpers for dispatcher integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use upwatch_core::alert::AlertTarget;
use upwatch_core::target::Target;
use upwatch_events::delivery::email::{AlertEmail, EmailError, EmailTransport};

// ---------------------------------------------------------------------------
// Recording email transport
// ---------------------------------------------------------------------------

/// Email transport that records every attempt and optionally fails it.
pub struct RecordingTransport {
    pub name: &'static str,
    pub fail: bool,
    pub sent: Mutex<Vec<(String, AlertEmail)>>,
}

impl RecordingTransport {
    pub fn ok(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: false,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: true,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> Vec<(String, AlertEmail)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, to: &str, email: &AlertEmail) -> Result<(), EmailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), email.clone()));
        if self.fail {
            return Err(EmailError::Build(format!("{} refused", self.name)));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.to_string()
    }
}

// ---------------------------------------------------------------------------
// Webhook receiver
// ---------------------------------------------------------------------------

pub type Received = Arc<Mutex<Vec<serde_json::Value>>>;

/// Local HTTP server with `/hook` (records and returns 200) and `/broken`
/// (records and returns 500).
pub async fn spawn_webhook_receiver() -> (SocketAddr, Received) {
    let received: Received = Arc::default();

    async fn hook(State(rx): State<Received>, Json(body): Json<serde_json::Value>) -> StatusCode {
        rx.lock().unwrap().push(body);
        StatusCode::OK
    }

    async fn broken(State(rx): State<Received>, Json(body): Json<serde_json::Value>) -> StatusCode {
        rx.lock().unwrap().push(body);
        StatusCode::INTERNAL_SERVER_ERROR
    }

    let app = Router::new()
        .route("/hook", post(hook))
        .route("/broken", post(broken))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, received)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn alert_target(owner_email: Option<&str>, webhook_url: Option<String>) -> AlertTarget {
    let mut target = Target::new(11, "Storefront", "https://shop.example.com", 3);
    target.alerts.webhook_url = webhook_url;
    AlertTarget::from_target(&target, owner_email.map(str::to_string))
}
