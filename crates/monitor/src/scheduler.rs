//! The monitoring tick loop.
//!
//! Every tick the scheduler reads the active targets, selects the due ones
//! and spawns one task per due target. Each task probes under a semaphore
//! permit and then applies the result in a fixed order:
//!
//! 1. append a check history record (failure aborts this target)
//! 2. run the status transition
//! 3. persist status, last-checked time and response time
//! 4. publish a [`StatusUpdate`]
//! 5. alert the owner when the transition requires it
//!
//! Ticks are themselves spawned, so a slow probe never delays the next
//! tick. A target whose probe is still running is skipped by later ticks,
//! and so is a target whose probe finished after the tick loaded its state.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use upwatch_core::alert::{AlertTarget, DOWN_ALERT_MESSAGE};
use upwatch_core::history::NewCheckRecord;
use upwatch_core::repository::{HistorySink, OwnerDirectory, RuntimeState, TargetStore};
use upwatch_core::status::{transition, TargetStatus};
use upwatch_core::target::Target;
use upwatch_core::types::{DbId, Timestamp};
use upwatch_events::{AlertDispatcher, EventBus, StatusUpdate};

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::prober::Prober;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Storage collaborators, usually one object implementing all three traits.
#[derive(Clone)]
pub struct MonitorStores {
    pub targets: Arc<dyn TargetStore>,
    pub history: Arc<dyn HistorySink>,
    pub owners: Arc<dyn OwnerDirectory>,
}

impl MonitorStores {
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: TargetStore + HistorySink + OwnerDirectory + 'static,
    {
        Self {
            targets: store.clone(),
            history: store.clone(),
            owners: store,
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Counters for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Active targets whose interval had elapsed.
    pub due: usize,
    /// Due targets skipped because an earlier check is running or finished
    /// after this tick loaded its targets.
    pub skipped_in_flight: usize,
    /// Targets whose result was fully applied.
    pub applied: usize,
    /// Targets whose processing failed.
    pub failed: usize,
    /// Alerts dispatched.
    pub alerts: usize,
}

/// What applying one probe result did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedResult {
    pub status: TargetStatus,
    pub alerted: bool,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    stores: MonitorStores,
    dispatcher: Arc<AlertDispatcher>,
    bus: Arc<EventBus>,
    prober: Prober,
    config: MonitorConfig,
    permits: Arc<Semaphore>,
    in_flight: SharedInFlight,
}

impl Scheduler {
    pub fn new(
        stores: MonitorStores,
        dispatcher: Arc<AlertDispatcher>,
        bus: Arc<EventBus>,
        prober: Prober,
        config: MonitorConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_probes.max(1)));
        Self {
            stores,
            dispatcher,
            bus,
            prober,
            config,
            permits,
            in_flight: Arc::default(),
        }
    }

    /// Run the tick loop until `cancel` is triggered.
    ///
    /// The first tick fires immediately. On cancellation the loop waits for
    /// running ticks, which are bounded by the probe timeouts.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = JoinSet::new();

        tracing::info!(
            tick_secs = self.config.tick_interval.as_secs(),
            max_concurrent_probes = self.config.max_concurrent_probes,
            "Monitor scheduler started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Monitor scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    while ticks.try_join_next().is_some() {}
                    let this = Arc::clone(&self);
                    ticks.spawn(async move { this.run_tick(Utc::now()).await });
                }
            }
        }

        while ticks.join_next().await.is_some() {}
        tracing::info!("Monitor scheduler stopped");
    }

    /// Evaluate the due set at `now` and process every due target.
    ///
    /// Returns once every target spawned by this tick has finished.
    pub async fn run_tick(self: &Arc<Self>, now: Timestamp) -> TickReport {
        let mut report = TickReport::default();

        let loaded_at = completions_so_far(&self.in_flight);
        let targets = match self.stores.targets.find_active_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load active targets");
                return report;
            }
        };

        let grace = chrono::Duration::from_std(self.config.due_grace)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let mut tasks = JoinSet::new();

        for target in targets {
            if !target.is_due_with_grace(now, grace) {
                continue;
            }
            report.due += 1;

            let Some(guard) = InFlightGuard::claim(&self.in_flight, target.id, loaded_at) else {
                tracing::debug!(target_id = target.id, "Probe running or state stale, skipping");
                report.skipped_in_flight += 1;
                continue;
            };

            let this = Arc::clone(self);
            tasks.spawn(async move {
                let _guard = guard;
                let id = target.id;
                (id, this.check_target(target, now).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(applied))) => {
                    report.applied += 1;
                    if applied.alerted {
                        report.alerts += 1;
                    }
                }
                Ok((target_id, Err(e))) => {
                    report.failed += 1;
                    tracing::error!(target_id, error = %e, "Failed to process target");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(error = %e, "Target task aborted");
                }
            }
        }

        if report.due > 0 {
            tracing::info!(
                due = report.due,
                applied = report.applied,
                failed = report.failed,
                skipped = report.skipped_in_flight,
                alerts = report.alerts,
                "Monitor tick complete",
            );
        } else {
            tracing::debug!("Monitor tick: nothing due");
        }
        report
    }

    /// Probe one target and apply the outcome.
    async fn check_target(
        &self,
        target: Target,
        now: Timestamp,
    ) -> Result<AppliedResult, MonitorError> {
        let timeout = target.probe_timeout(
            self.config.probe_timeout_min_secs,
            self.config.probe_timeout_max_secs,
        );

        let outcome = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| MonitorError::PoolClosed)?;
            self.prober.probe(&target.url, timeout).await
        };

        if let Some(failure) = &outcome.failure {
            tracing::debug!(
                target_id = target.id,
                kind = ?failure.kind,
                error = %failure.message,
                "Probe failed",
            );
        }

        self.stores
            .history
            .append_history(&NewCheckRecord::from_outcome(target.id, &outcome))
            .await
            .map_err(|source| MonitorError::History {
                target_id: target.id,
                source,
            })?;

        let next = transition(target.status, &outcome);

        self.stores
            .targets
            .update_runtime_state(
                target.id,
                RuntimeState {
                    status: next.new_status,
                    last_checked: now,
                    response_time_ms: outcome.response_time_ms,
                },
            )
            .await
            .map_err(|source| MonitorError::TargetUpdate {
                target_id: target.id,
                source,
            })?;

        if next.is_change_from(target.status) {
            tracing::info!(
                target_id = target.id,
                from = %target.status,
                to = %next.new_status,
                status_code = outcome.status_code,
                "Target status changed",
            );
        }

        self.bus.publish(StatusUpdate {
            target_id: target.id,
            status: next.new_status,
            response_time_ms: outcome.response_time_ms,
            last_checked: now,
        });

        if next.alert_required {
            self.alert(&target).await;
        }

        Ok(AppliedResult {
            status: next.new_status,
            alerted: next.alert_required,
        })
    }

    /// Resolve the owner and dispatch a down alert. Never fails.
    async fn alert(&self, target: &Target) {
        let owner_email = match self.stores.owners.resolve_owner_email(target).await {
            Ok(email) => email,
            Err(e) => {
                tracing::warn!(target_id = target.id, error = %e, "Owner lookup failed");
                None
            }
        };
        let alert_target = AlertTarget::from_target(target, owner_email);
        self.dispatcher
            .dispatch(&alert_target, DOWN_ALERT_MESSAGE)
            .await;
    }
}

// ---------------------------------------------------------------------------
// In-flight tracking
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct InFlight {
    running: HashSet<DbId>,
    /// Completion counter value at each target's most recent finish.
    finished: HashMap<DbId, u64>,
    completions: u64,
}

type SharedInFlight = Arc<Mutex<InFlight>>;

fn lock(set: &SharedInFlight) -> std::sync::MutexGuard<'_, InFlight> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read before loading targets and handed to [`InFlightGuard::claim`].
fn completions_so_far(set: &SharedInFlight) -> u64 {
    lock(set).completions
}

/// Marks a target as being probed until dropped.
struct InFlightGuard {
    set: SharedInFlight,
    id: DbId,
}

impl InFlightGuard {
    /// Claim `id` for a tick that loaded its targets when the completion
    /// counter read `loaded_at`. Fails while a check of `id` is running
    /// and when one finished after that load, since the loaded row predates
    /// the result it wrote.
    fn claim(set: &SharedInFlight, id: DbId, loaded_at: u64) -> Option<Self> {
        let mut state = lock(set);
        let stale = state.finished.get(&id).is_some_and(|&done| done > loaded_at);
        if stale || !state.running.insert(id) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.set);
        state.completions += 1;
        let done = state.completions;
        state.finished.insert(self.id, done);
        state.running.remove(&self.id);
    }
}
