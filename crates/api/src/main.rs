use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upwatch_db::PgMonitorStore;
use upwatch_events::{AlertDispatcher, EventBus, WebhookDelivery};
use upwatch_monitor::{Monitor, MonitorConfig, MonitorStores};

use upwatch_api::config::ServerConfig;
use upwatch_api::router::build_app_router;
use upwatch_api::state::AppState;
use upwatch_api::ws;

/// Bound on how long background tasks get to finish after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("DATABASE_URL must be set")]
    MissingDatabaseUrl,
    #[error("Invalid HOST address '{0}'")]
    InvalidHost(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Webhook client error: {0}")]
    Webhook(#[from] upwatch_events::delivery::webhook::WebhookError),
    #[error("Monitor error: {0}")]
    Monitor(#[from] upwatch_monitor::MonitorError),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Upwatch failed");
            ExitCode::FAILURE
        }
    }
}

/// Registry + `EnvFilter` + fmt layer; `LOG_FORMAT=json` selects JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "upwatch_api=debug,upwatch_monitor=info,upwatch_events=info,tower_http=debug".into()
    });
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<(), StartupError> {
    // --- Configuration ---
    let config = ServerConfig::from_env();
    let monitor_config = MonitorConfig::from_env();
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    // --- Database ---
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| StartupError::MissingDatabaseUrl)?;
    let pool = upwatch_db::create_pool(&database_url).await?;
    upwatch_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");
    upwatch_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    // --- Monitoring core ---
    let bus = Arc::new(EventBus::default());
    let dispatcher = Arc::new(AlertDispatcher::from_env(WebhookDelivery::new(
        monitor_config.webhook_timeout,
    )?));
    let stores = MonitorStores::from_shared(Arc::new(PgMonitorStore::new(pool.clone())));
    let monitor = Arc::new(Monitor::new(stores, dispatcher, Arc::clone(&bus), monitor_config)?);

    let cancel = CancellationToken::new();
    let scheduler_handle = monitor.start(cancel.child_token());

    // --- Live updates ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let forwarder_handle = ws::spawn_status_forwarder(
        monitor.subscribe(),
        Arc::clone(&ws_manager),
        cancel.child_token(),
    );
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), cancel.child_token());

    // --- Router ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        monitor,
    };
    let app = build_app_router(state, &config);

    // --- Serve ---
    let host: IpAddr = config
        .host
        .parse()
        .map_err(|_| StartupError::InvalidHost(config.host.clone()))?;
    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Starting server");

    let server_cancel = cancel.clone();
    let server_ws = Arc::clone(&ws_manager);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_cancel.cancel();
            // Upgraded sockets hold the server open until they close.
            server_ws.shutdown_all().await;
        })
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    cancel.cancel();

    if tokio::time::timeout(DRAIN_TIMEOUT, scheduler_handle).await.is_err() {
        tracing::warn!("Scheduler did not stop within the drain timeout");
    }
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, forwarder_handle).await;
    let _ = heartbeat_handle.await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Resolve on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
