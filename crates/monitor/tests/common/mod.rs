//! Shared fixtures for monitor integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Json, Router};
use upwatch_core::error::StoreError;
use upwatch_core::history::NewCheckRecord;
use upwatch_core::probe::DEFAULT_PROBE_USER_AGENT;
use upwatch_core::repository::{HistorySink, OwnerDirectory, RuntimeState, TargetStore};
use upwatch_core::target::Target;
use upwatch_core::types::DbId;
use upwatch_events::delivery::email::{AlertEmail, EmailError, EmailTransport, EmailTransports};
use upwatch_events::delivery::webhook::WebhookDelivery;
use upwatch_events::{AlertDispatcher, EventBus};
use upwatch_monitor::{MonitorConfig, MonitorStores, Prober, Scheduler};

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    pub targets: Mutex<HashMap<DbId, Target>>,
    pub history: Mutex<Vec<NewCheckRecord>>,
    /// Owner id to email.
    pub owners: Mutex<HashMap<DbId, String>>,
    pub fail_history_for: Mutex<HashSet<DbId>>,
    pub fail_update_for: Mutex<HashSet<DbId>>,
    pub fail_owner_lookup: AtomicBool,
    pub updates: AtomicUsize,
    /// Delay between reading targets and returning them.
    pub load_delay_ms: AtomicU64,
}

impl MemoryStore {
    pub fn with_targets(targets: Vec<Target>) -> Arc<Self> {
        let store = Self::default();
        {
            let mut map = store.targets.lock().unwrap();
            let mut owners = store.owners.lock().unwrap();
            for t in targets {
                owners.insert(t.owner_id, format!("owner{}@example.com", t.owner_id));
                map.insert(t.id, t);
            }
        }
        Arc::new(store)
    }

    pub fn target(&self, id: DbId) -> Target {
        self.targets.lock().unwrap()[&id].clone()
    }

    pub fn history_for(&self, id: DbId) -> Vec<NewCheckRecord> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.target_id == id)
            .cloned()
            .collect()
    }
}

fn injected(what: &str) -> StoreError {
    StoreError::backend(std::io::Error::new(std::io::ErrorKind::Other, what.to_string()))
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn find_active_targets(&self) -> Result<Vec<Target>, StoreError> {
        let mut targets: Vec<Target> = self
            .targets
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.is_active)
            .cloned()
            .collect();
        targets.sort_by_key(|t| t.id);
        let delay = self.load_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(targets)
    }

    async fn update_runtime_state(&self, id: DbId, state: RuntimeState) -> Result<(), StoreError> {
        if self.fail_update_for.lock().unwrap().contains(&id) {
            return Err(injected("update refused"));
        }
        let mut targets = self.targets.lock().unwrap();
        let target = targets
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "target", id })?;
        target.status = state.status;
        target.response_time_ms = state.response_time_ms;
        target.last_checked = Some(match target.last_checked {
            Some(prev) if prev > state.last_checked => prev,
            _ => state.last_checked,
        });
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl HistorySink for MemoryStore {
    async fn append_history(&self, record: &NewCheckRecord) -> Result<(), StoreError> {
        if self.fail_history_for.lock().unwrap().contains(&record.target_id) {
            return Err(injected("history refused"));
        }
        self.history.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl OwnerDirectory for MemoryStore {
    async fn resolve_owner_email(&self, target: &Target) -> Result<Option<String>, StoreError> {
        if self.fail_owner_lookup.load(Ordering::SeqCst) {
            return Err(injected("owner lookup refused"));
        }
        Ok(self.owners.lock().unwrap().get(&target.owner_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Recording email transport
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(String, AlertEmail)>>,
}

impl RecordingTransport {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, to: &str, email: &AlertEmail) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push((to.to_string(), email.clone()));
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

// ---------------------------------------------------------------------------
// Local HTTP endpoints
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct ServerState {
    pub current: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    pub hits: Arc<AtomicUsize>,
    pub webhooks: Arc<Mutex<Vec<serde_json::Value>>>,
}

async fn status(State(s): State<ServerState>, Path(code): Path<u16>) -> StatusCode {
    s.hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn slow(State(s): State<ServerState>, Path(ms): Path<u64>) -> StatusCode {
    s.hits.fetch_add(1, Ordering::SeqCst);
    let now = s.current.fetch_add(1, Ordering::SeqCst) + 1;
    s.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    s.current.fetch_sub(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn user_agent(headers: HeaderMap) -> StatusCode {
    match headers.get("user-agent").and_then(|v| v.to_str().ok()) {
        Some(DEFAULT_PROBE_USER_AGENT) => StatusCode::OK,
        _ => StatusCode::BAD_REQUEST,
    }
}

async fn hook(State(s): State<ServerState>, Json(body): Json<serde_json::Value>) -> StatusCode {
    s.webhooks.lock().unwrap().push(body);
    StatusCode::OK
}

/// Spawn a local server standing in for probed sites and webhook receivers.
///
/// - `GET /status/{code}` answers with `code`
/// - `GET /slow/{ms}` answers 200 after `ms` milliseconds
/// - `GET /redirect` redirects to `/status/200`
/// - `GET /loop` redirects to itself
/// - `GET /ua` answers 200 only for the default probe user agent
/// - `POST /hook` records the JSON body
pub async fn spawn_server() -> (SocketAddr, ServerState) {
    let state = ServerState::default();
    let app = Router::new()
        .route("/status/{code}", get(status))
        .route("/slow/{ms}", get(slow))
        .route("/redirect", get(|| async { Redirect::temporary("/status/200") }))
        .route("/loop", get(|| async { Redirect::temporary("/loop") }))
        .route("/ua", get(user_agent))
        .route("/hook", post(hook))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

/// An address nothing listens on.
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        probe_timeout_min_secs: 1,
        ..MonitorConfig::default()
    }
}

pub fn target(id: DbId, url: String) -> Target {
    Target::new(id, format!("target-{id}"), url, 100 + id)
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub email: Arc<RecordingTransport>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub bus: Arc<EventBus>,
    pub scheduler: Arc<Scheduler>,
}

pub fn harness(targets: Vec<Target>, config: MonitorConfig) -> Harness {
    let store = MemoryStore::with_targets(targets);
    let email = Arc::new(RecordingTransport::default());
    let dispatcher = Arc::new(dispatcher_with(email.clone()));
    let bus = Arc::new(EventBus::default());
    let prober = Prober::new(&config.user_agent).unwrap();
    let scheduler = Arc::new(Scheduler::new(
        MonitorStores::from_shared(store.clone()),
        dispatcher.clone(),
        bus.clone(),
        prober,
        config,
    ));
    Harness {
        store,
        email,
        dispatcher,
        bus,
        scheduler,
    }
}

pub fn dispatcher_with(email: Arc<RecordingTransport>) -> AlertDispatcher {
    let webhook = WebhookDelivery::new(Duration::from_secs(5)).unwrap();
    AlertDispatcher::with_loader(webhook, move || {
        Some(EmailTransports {
            primary: email.clone() as Arc<dyn EmailTransport>,
            alternate: None,
        })
    })
}
