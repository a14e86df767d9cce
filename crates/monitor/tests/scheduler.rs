//! Scheduler behaviour over an in-memory store and local endpoints.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use common::{harness, spawn_server, target, test_config};
use upwatch_core::status::TargetStatus;
use upwatch_monitor::MonitorConfig;

// ---------------------------------------------------------------------------
// Concrete scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn never_checked_target_is_probed_and_recorded_up() {
    let (addr, _) = spawn_server().await;
    let h = harness(vec![target(1, format!("http://{addr}/status/200"))], test_config());

    let now = Utc::now();
    let report = h.scheduler.run_tick(now).await;

    assert_eq!(report.due, 1);
    assert_eq!(report.applied, 1);
    assert_eq!(report.alerts, 0);

    let history = h.store.history_for(1);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TargetStatus::Up);
    assert_eq!(history[0].status_code, 200);
    assert!(history[0].response_time_ms.is_some());

    let stored = h.store.target(1);
    assert_eq!(stored.status, TargetStatus::Up);
    assert_eq!(stored.last_checked, Some(now));
    assert_eq!(stored.response_time_ms, history[0].response_time_ms);
    assert_eq!(h.email.count(), 0);
}

#[tokio::test]
async fn up_to_down_alerts_by_email_and_webhook() {
    let (addr, state) = spawn_server().await;
    let mut t = target(2, format!("http://{addr}/status/503"));
    t.status = TargetStatus::Up;
    t.alerts.webhook_url = Some(format!("http://{addr}/hook"));
    let h = harness(vec![t], test_config());

    let report = h.scheduler.run_tick(Utc::now()).await;

    assert_eq!(report.alerts, 1);
    assert_eq!(h.store.target(2).status, TargetStatus::Down);
    assert_eq!(h.email.count(), 1);
    let (to, email) = h.email.sent.lock().unwrap()[0].clone();
    assert_eq!(to, "owner102@example.com");
    assert!(email.text.starts_with("Website is down!"));

    let hooks = state.webhooks.lock().unwrap().clone();
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0]["target"], "target-2");
}

#[tokio::test]
async fn repeated_down_does_not_realert() {
    let (addr, state) = spawn_server().await;
    let mut t = target(3, format!("http://{addr}/status/500"));
    t.status = TargetStatus::Down;
    t.alerts.webhook_url = Some(format!("http://{addr}/hook"));
    let h = harness(vec![t], test_config());

    let report = h.scheduler.run_tick(Utc::now()).await;

    assert_eq!(report.applied, 1);
    assert_eq!(report.alerts, 0);
    assert_eq!(h.store.target(3).status, TargetStatus::Down);
    assert_eq!(h.email.count(), 0);
    assert!(state.webhooks.lock().unwrap().is_empty());
}

#[tokio::test]
async fn timeout_moves_up_target_to_unknown_without_alert() {
    let (addr, _) = spawn_server().await;
    let mut t = target(4, format!("http://{addr}/slow/3000"));
    t.status = TargetStatus::Up;
    t.timeout_secs = 1;
    let h = harness(vec![t], test_config());

    let report = h.scheduler.run_tick(Utc::now()).await;

    assert_eq!(report.alerts, 0);
    assert_eq!(h.store.target(4).status, TargetStatus::Unknown);
    let history = h.store.history_for(4);
    assert_eq!(history[0].status, TargetStatus::Unknown);
    assert_eq!(history[0].status_code, 0);
    assert_eq!(h.email.count(), 0);
}

#[tokio::test]
async fn only_short_interval_target_is_due_on_second_tick() {
    let (addr, _) = spawn_server().await;
    let mut fast = target(5, format!("http://{addr}/status/200"));
    let mut slow = target(6, format!("http://{addr}/status/200"));
    fast.check_interval_mins = 1;
    slow.check_interval_mins = 60;
    let h = harness(vec![fast, slow], test_config());

    let first = Utc::now();
    assert_eq!(h.scheduler.run_tick(first).await.due, 2);

    let second = first + chrono::Duration::minutes(1);
    let report = h.scheduler.run_tick(second).await;
    assert_eq!(report.due, 1);

    assert_eq!(h.store.target(5).last_checked, Some(second));
    assert_eq!(h.store.target(6).last_checked, Some(first));
    assert_eq!(h.store.history_for(5).len(), 2);
    assert_eq!(h.store.history_for(6).len(), 1);
}

#[tokio::test]
async fn grace_window_keeps_cadence_despite_jitter() {
    let (addr, _) = spawn_server().await;
    let mut t = target(7, format!("http://{addr}/status/200"));
    t.check_interval_mins = 1;
    let h = harness(vec![t], test_config());

    let first = Utc::now();
    h.scheduler.run_tick(first).await;
    let early = first + chrono::Duration::seconds(59);
    assert_eq!(h.scheduler.run_tick(early).await.due, 1);
}

// ---------------------------------------------------------------------------
// Recording and isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_due_tick_is_recorded() {
    let (addr, _) = spawn_server().await;
    let mut ok = target(8, format!("http://{addr}/status/200"));
    let mut broken = target(9, format!("http://{addr}/status/500"));
    ok.check_interval_mins = 1;
    broken.check_interval_mins = 2;
    let h = harness(vec![ok, broken], test_config());

    let start = Utc::now();
    let mut due_ticks = [0usize; 2];
    for minute in 0..6 {
        let now = start + chrono::Duration::minutes(minute);
        let before = [h.store.history_for(8).len(), h.store.history_for(9).len()];
        h.scheduler.run_tick(now).await;
        due_ticks[0] += 1;
        if minute % 2 == 0 {
            due_ticks[1] += 1;
        }
        assert_eq!(h.store.history_for(8).len(), before[0] + 1);
    }

    assert_eq!(h.store.history_for(8).len(), due_ticks[0]);
    assert_eq!(h.store.history_for(9).len(), due_ticks[1]);
}

#[tokio::test]
async fn history_failure_skips_update_and_alert_for_that_target_only() {
    let (addr, _) = spawn_server().await;
    let mut failing = target(10, format!("http://{addr}/status/503"));
    failing.status = TargetStatus::Up;
    let healthy = target(11, format!("http://{addr}/status/200"));
    let h = harness(vec![failing, healthy], test_config());
    h.store.fail_history_for.lock().unwrap().insert(10);

    let report = h.scheduler.run_tick(Utc::now()).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.applied, 1);
    let stored = h.store.target(10);
    assert_eq!(stored.status, TargetStatus::Up);
    assert!(stored.last_checked.is_none(), "stays due for the next tick");
    assert_eq!(h.email.count(), 0);
    assert_eq!(h.store.target(11).status, TargetStatus::Up);
}

#[tokio::test]
async fn update_failure_keeps_history_and_isolates_target() {
    let (addr, _) = spawn_server().await;
    let a = target(12, format!("http://{addr}/status/200"));
    let b = target(13, format!("http://{addr}/status/200"));
    let h = harness(vec![a, b], test_config());
    h.store.fail_update_for.lock().unwrap().insert(12);

    let report = h.scheduler.run_tick(Utc::now()).await;

    assert_eq!(report.failed, 1);
    assert_eq!(h.store.history_for(12).len(), 1);
    assert!(h.store.target(12).last_checked.is_none());
    assert!(h.store.target(13).last_checked.is_some());
}

#[tokio::test]
async fn owner_lookup_failure_still_attempts_webhook() {
    let (addr, state) = spawn_server().await;
    let mut t = target(14, format!("http://{addr}/status/404"));
    t.alerts.webhook_url = Some(format!("http://{addr}/hook"));
    let h = harness(vec![t], test_config());
    h.store.fail_owner_lookup.store(true, Ordering::SeqCst);

    let report = h.scheduler.run_tick(Utc::now()).await;

    assert_eq!(report.alerts, 1);
    assert_eq!(h.email.count(), 0);
    assert_eq!(state.webhooks.lock().unwrap().len(), 1);
    assert_eq!(h.store.target(14).status, TargetStatus::Down);
}

#[tokio::test]
async fn inactive_targets_are_ignored() {
    let (addr, state) = spawn_server().await;
    let mut t = target(15, format!("http://{addr}/status/200"));
    t.is_active = false;
    let h = harness(vec![t], test_config());

    let report = h.scheduler.run_tick(Utc::now()).await;
    assert_eq!(report.due, 0);
    assert_eq!(state.hits.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slow_probe_does_not_delay_other_targets() {
    let (addr, _) = spawn_server().await;
    let slow = target(16, format!("http://{addr}/slow/1500"));
    let fast = target(17, format!("http://{addr}/status/200"));
    let h = harness(vec![slow, fast], test_config());

    let scheduler = h.scheduler.clone();
    let tick = tokio::spawn(async move { scheduler.run_tick(Utc::now()).await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(h.store.target(17).last_checked.is_some());
    assert!(h.store.target(16).last_checked.is_none());

    let report = tick.await.unwrap();
    assert_eq!(report.applied, 2);
}

#[tokio::test]
async fn target_still_in_flight_is_skipped_by_next_tick() {
    let (addr, state) = spawn_server().await;
    let mut slow = target(18, format!("http://{addr}/slow/1500"));
    slow.check_interval_mins = 1;
    let h = harness(vec![slow], test_config());

    let first_now = Utc::now();
    let scheduler = h.scheduler.clone();
    let first = tokio::spawn(async move { scheduler.run_tick(first_now).await });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let second = h
        .scheduler
        .run_tick(first_now + chrono::Duration::minutes(1))
        .await;
    assert_eq!(second.due, 1);
    assert_eq!(second.skipped_in_flight, 1);

    first.await.unwrap();
    assert_eq!(state.hits.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.history_for(18).len(), 1);
}

#[tokio::test]
async fn check_finishing_during_target_load_is_not_repeated() {
    let (addr, state) = spawn_server().await;
    let mut slow = target(19, format!("http://{addr}/slow/400"));
    slow.check_interval_mins = 1;
    let h = harness(vec![slow], test_config());

    let first_now = Utc::now();
    let scheduler = h.scheduler.clone();
    let first = tokio::spawn(async move { scheduler.run_tick(first_now).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The second tick reads the never-checked row, then the first check
    // finishes before the read returns.
    h.store.load_delay_ms.store(1_000, Ordering::SeqCst);
    let second = h
        .scheduler
        .run_tick(first_now + chrono::Duration::seconds(30))
        .await;
    assert_eq!(second.due, 1);
    assert_eq!(second.skipped_in_flight, 1);
    assert_eq!(second.applied, 0);

    assert_eq!(first.await.unwrap().applied, 1);
    assert_eq!(state.hits.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.history_for(19).len(), 1);
}

#[tokio::test]
async fn fan_out_respects_concurrency_cap() {
    let (addr, state) = spawn_server().await;
    let targets = (20..24)
        .map(|id| target(id, format!("http://{addr}/slow/200")))
        .collect();
    let config = MonitorConfig {
        max_concurrent_probes: 2,
        ..test_config()
    };
    let h = harness(targets, config);

    let report = h.scheduler.run_tick(Utc::now()).await;

    assert_eq!(report.applied, 4);
    assert!(state.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(state.hits.load(Ordering::SeqCst), 4);
}

// ---------------------------------------------------------------------------
// Live updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_update_is_published_per_applied_result() {
    let (addr, _) = spawn_server().await;
    let h = harness(vec![target(30, format!("http://{addr}/status/500"))], test_config());
    let mut rx = h.bus.subscribe();

    let now = Utc::now();
    h.scheduler.run_tick(now).await;

    let update = rx.recv().await.unwrap();
    assert_eq!(update.target_id, 30);
    assert_eq!(update.status, TargetStatus::Down);
    assert_eq!(update.last_checked, now);
    assert!(rx.try_recv().is_err());
}
