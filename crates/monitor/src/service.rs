//! Facade over the scheduler, prober and dispatcher.
//!
//! The HTTP layer talks to the monitoring core only through [`Monitor`].

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use upwatch_core::alert::AlertTarget;
use upwatch_core::probe::ProbeOutcome;
use upwatch_core::target::Target;
use upwatch_events::{AlertDispatcher, DispatchResult, EventBus, StatusUpdate};

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::prober::Prober;
use crate::scheduler::{MonitorStores, Scheduler};

pub struct Monitor {
    scheduler: Arc<Scheduler>,
    prober: Prober,
    dispatcher: Arc<AlertDispatcher>,
    bus: Arc<EventBus>,
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(
        stores: MonitorStores,
        dispatcher: Arc<AlertDispatcher>,
        bus: Arc<EventBus>,
        config: MonitorConfig,
    ) -> Result<Self, MonitorError> {
        let prober = Prober::new(&config.user_agent)?;
        let scheduler = Arc::new(Scheduler::new(
            stores,
            Arc::clone(&dispatcher),
            Arc::clone(&bus),
            prober.clone(),
            config.clone(),
        ));
        Ok(Self {
            scheduler,
            prober,
            dispatcher,
            bus,
            config,
        })
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Spawn the scheduler loop on the current runtime.
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.scheduler().run(cancel))
    }

    /// Probe a target immediately, outside the tick loop.
    ///
    /// Nothing is persisted and no alert is sent.
    pub async fn probe_now(&self, target: &Target) -> ProbeOutcome {
        let timeout = target.probe_timeout(
            self.config.probe_timeout_min_secs,
            self.config.probe_timeout_max_secs,
        );
        self.prober.probe(&target.url, timeout).await
    }

    /// Dispatch `message` to the target's channels, bypassing the status
    /// engine.
    pub async fn send_test_alert(&self, target: &AlertTarget, message: &str) -> DispatchResult {
        tracing::info!(target_id = target.target_id, "Sending test alert");
        self.dispatcher.dispatch(target, message).await
    }

    /// Re-read email transport settings and swap them in.
    pub async fn refresh_transport(&self) -> bool {
        self.dispatcher.refresh_transport().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.bus.subscribe()
    }

    /// Call `listener` for every status update until the bus closes.
    ///
    /// Updates missed by a lagging listener are dropped, not replayed.
    pub fn on_status_update<F>(&self, listener: F) -> JoinHandle<()>
    where
        F: Fn(StatusUpdate) + Send + 'static,
    {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(update) => listener(update),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Status listener lagged, updates dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
