//! Tests for the leader-elected daemon
//!
//! **Property 6: Leader Exclusivity**
//! **Property 7: Lock Failure Exit**
//!
//! Every test runs with paused time so interval ticks, lease TTLs and
//! simulated latencies advance deterministically.

use logstore_core::{DirectoryError, LockError, LockSpec, RetryPolicy};
use logstore_schema::constants::DEFAULT_LOCK_KEY;
use logstore_schema::{DaemonExit, ReconcilerConfig, SchemaManager};
use logstore_storage::LockProvider;
use logstore_test_utils::assertions::{assert_tenant_missing, assert_tenant_provisioned};
use logstore_test_utils::fixtures::{fast_config, Harness};
use logstore_test_utils::ConcurrencyProbe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

const TICK: Duration = Duration::from_secs(1);

/// Config whose lease is renewed every second.
fn short_lease_config() -> ReconcilerConfig {
    ReconcilerConfig {
        lock: LockSpec::new(DEFAULT_LOCK_KEY, Duration::from_secs(3)),
        ..fast_config()
    }
}

/// Records the level of every event emitted on this thread while installed.
#[derive(Clone, Default)]
struct LevelLog(Arc<Mutex<Vec<Level>>>);

impl LevelLog {
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    fn levels(&self) -> Vec<Level> {
        self.0.lock().unwrap().clone()
    }
}

impl<S: Subscriber> Layer<S> for LevelLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.0.lock().unwrap().push(*event.metadata().level());
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[tokio::test(start_paused = true)]
async fn first_pass_runs_immediately_then_every_tick() {
    let h = Harness::new(&["acme"]);
    let reconciler = h.reconciler(fast_config()).await.unwrap();
    assert_eq!(reconciler.name(), "schema with Cassandra");
    let metrics = reconciler.metrics();

    let (tx, rx) = watch::channel(false);
    let daemon = tokio::spawn(reconciler.run_daemon(Some(TICK), h.locks(), rx));

    sleep(Duration::from_millis(10)).await;
    assert_eq!(metrics.snapshot().passes, 1);
    assert_tenant_provisioned(&h.store, "acme");
    assert!(h.locks.holder(DEFAULT_LOCK_KEY).is_some());

    sleep(Duration::from_millis(2_500)).await;
    assert_eq!(metrics.snapshot().passes, 3);
    assert_eq!(metrics.snapshot().passes_unchanged, 2);

    tx.send(true).unwrap();
    assert_eq!(daemon.await.unwrap(), DaemonExit::Shutdown);
    assert_eq!(h.locks.holder(DEFAULT_LOCK_KEY), None);
    assert_eq!(h.locks.releases(), 1);
    assert_eq!(metrics.snapshot().leadership_terms, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_passes_do_not_stop_the_loop() {
    let h = Harness::new(&["acme"]);
    h.directory.fail_with(DirectoryError::Unavailable {
        reason: "503".to_string(),
    });
    let reconciler = h.reconciler(fast_config()).await.unwrap();
    let metrics = reconciler.metrics();

    let (tx, rx) = watch::channel(false);
    let daemon = tokio::spawn(reconciler.run_daemon(Some(TICK), h.locks(), rx));

    sleep(Duration::from_millis(2_500)).await;
    assert_eq!(metrics.snapshot().passes_failed, 3);
    assert_tenant_missing(&h.store, "acme");

    h.directory.clear_failure();
    sleep(TICK).await;
    assert_tenant_provisioned(&h.store, "acme");

    tx.send(true).unwrap();
    assert_eq!(daemon.await.unwrap(), DaemonExit::Shutdown);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_pass() {
    let h = Harness::new(&["acme"]);
    h.directory.set_latency(Duration::from_secs(2));
    let reconciler = h.reconciler(fast_config()).await.unwrap();

    let (tx, rx) = watch::channel(false);
    let daemon = tokio::spawn(reconciler.run_daemon(Some(TICK), h.locks(), rx));

    sleep(Duration::from_millis(500)).await;
    tx.send(true).unwrap();
    assert_eq!(daemon.await.unwrap(), DaemonExit::Shutdown);

    // The pass that was fetching when shutdown arrived still provisioned.
    assert_tenant_provisioned(&h.store, "acme");
    assert_eq!(h.directory.calls(), 1);
    assert_eq!(h.locks.holder(DEFAULT_LOCK_KEY), None);
}

#[tokio::test(start_paused = true)]
async fn configured_interval_applies_without_override() {
    let h = Harness::new(&["acme"]);
    let reconciler = h.reconciler(fast_config()).await.unwrap();
    let metrics = reconciler.metrics();

    let (tx, rx) = watch::channel(false);
    let daemon = tokio::spawn(reconciler.run_daemon(None, h.locks(), rx));

    sleep(Duration::from_millis(2_500)).await;
    assert_eq!(metrics.snapshot().passes, 3);

    tx.send(true).unwrap();
    assert_eq!(daemon.await.unwrap(), DaemonExit::Shutdown);
}

#[tokio::test(start_paused = true)]
async fn tiny_interval_is_clamped() {
    let h = Harness::new(&["acme"]);
    let reconciler = h.reconciler(fast_config()).await.unwrap();
    let metrics = reconciler.metrics();

    let (tx, rx) = watch::channel(false);
    let daemon = tokio::spawn(reconciler.run_daemon(Some(Duration::ZERO), h.locks(), rx));

    sleep(Duration::from_millis(1_050)).await;
    // One immediate pass plus one per 100ms.
    assert_eq!(metrics.snapshot().passes, 11);

    tx.send(true).unwrap();
    assert_eq!(daemon.await.unwrap(), DaemonExit::Shutdown);
}

// ============================================================================
// PROPERTY 6: LEADER EXCLUSIVITY
// ============================================================================

#[tokio::test(start_paused = true)]
async fn only_one_instance_reconciles_at_a_time() {
    let h = Harness::new(&["a", "b"]);
    let probe = ConcurrencyProbe::new(Arc::new(h.directory.clone()))
        .with_hold(Duration::from_millis(200));
    let first_probe = probe.instance();
    let second_probe = probe.instance();

    let first = h
        .reconciler_with(Arc::new(first_probe.clone()), fast_config())
        .await
        .unwrap();
    let second = h
        .reconciler_with(Arc::new(second_probe.clone()), fast_config())
        .await
        .unwrap();
    let first_metrics = first.metrics();
    let second_metrics = second.metrics();

    let (first_tx, first_rx) = watch::channel(false);
    let (second_tx, second_rx) = watch::channel(false);
    let first_daemon = tokio::spawn(first.run_daemon(Some(TICK), h.locks(), first_rx));
    sleep(Duration::from_millis(10)).await;
    let second_daemon = tokio::spawn(second.run_daemon(Some(TICK), h.locks(), second_rx));

    sleep(Duration::from_secs(5)).await;
    assert!(first_probe.calls() >= 5);
    assert_eq!(second_probe.calls(), 0);
    assert_eq!(second_metrics.snapshot().passes, 0);
    assert_eq!(second_metrics.snapshot().leadership_terms, 0);

    // Leadership moves once the leader steps down.
    first_tx.send(true).unwrap();
    assert_eq!(first_daemon.await.unwrap(), DaemonExit::Shutdown);
    let first_calls = first_probe.calls();

    sleep(Duration::from_secs(3)).await;
    assert!(second_probe.calls() > 0);
    assert_eq!(first_probe.calls(), first_calls);
    assert_eq!(second_metrics.snapshot().leadership_terms, 1);

    second_tx.send(true).unwrap();
    assert_eq!(second_daemon.await.unwrap(), DaemonExit::Shutdown);

    assert_eq!(probe.max_in_flight(), 1);
    assert_eq!(h.locks.acquisitions(), 2);
    assert_eq!(first_metrics.snapshot().leadership_terms, 1);
}

#[tokio::test(start_paused = true)]
async fn leader_keeps_lease_beyond_its_ttl() {
    let h = Harness::new(&["acme"]);
    let leader = h.reconciler(short_lease_config()).await.unwrap();
    let follower = h.reconciler(short_lease_config()).await.unwrap();
    let follower_metrics = follower.metrics();

    let (leader_tx, leader_rx) = watch::channel(false);
    let (follower_tx, follower_rx) = watch::channel(false);
    let leader_daemon = tokio::spawn(leader.run_daemon(Some(TICK), h.locks(), leader_rx));
    sleep(Duration::from_millis(10)).await;
    let follower_daemon = tokio::spawn(follower.run_daemon(Some(TICK), h.locks(), follower_rx));

    // Several TTLs pass; renewal keeps the follower out.
    sleep(Duration::from_secs(10)).await;
    assert_eq!(follower_metrics.snapshot().leadership_terms, 0);
    assert_eq!(h.locks.acquisitions(), 1);
    assert_eq!(h.locks.takeovers(), 0);

    leader_tx.send(true).unwrap();
    assert_eq!(leader_daemon.await.unwrap(), DaemonExit::Shutdown);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(follower_metrics.snapshot().leadership_terms, 1);

    follower_tx.send(true).unwrap();
    assert_eq!(follower_daemon.await.unwrap(), DaemonExit::Shutdown);
    assert_eq!(h.locks.takeovers(), 0);
}

#[tokio::test(start_paused = true)]
async fn revoked_lease_ends_leadership() {
    let h = Harness::new(&["acme"]);
    let reconciler = h.reconciler(short_lease_config()).await.unwrap();
    let metrics = reconciler.metrics();

    let (_tx, rx) = watch::channel(false);
    let daemon = tokio::spawn(reconciler.run_daemon(Some(TICK), h.locks(), rx));

    sleep(Duration::from_millis(1_500)).await;
    assert!(h.locks.revoke(DEFAULT_LOCK_KEY).is_some());

    let exit = tokio::time::timeout(Duration::from_secs(5), daemon)
        .await
        .expect("daemon must notice the lost lease")
        .unwrap();
    assert_eq!(exit, DaemonExit::LeadershipLost);
    let passes = metrics.snapshot().passes;

    sleep(Duration::from_secs(3)).await;
    assert_eq!(metrics.snapshot().passes, passes);
    assert_eq!(h.locks.holder(DEFAULT_LOCK_KEY), None);
}

#[tokio::test(start_paused = true)]
async fn lock_wait_is_cancelled_by_shutdown() {
    let logs = LevelLog::default();
    let _guard = logs.install();
    let h = Harness::new(&["acme"]);
    let holder = h
        .locks
        .new_handle(&LockSpec::new(DEFAULT_LOCK_KEY, Duration::from_secs(30)))
        .await
        .unwrap();
    holder.lock().await.unwrap();

    let reconciler = h.reconciler(fast_config()).await.unwrap();
    let (tx, rx) = watch::channel(false);
    let daemon = tokio::spawn(reconciler.run_daemon(Some(TICK), h.locks(), rx));

    sleep(Duration::from_secs(3)).await;
    assert_eq!(h.directory.calls(), 0);

    tx.send(true).unwrap();
    assert_eq!(daemon.await.unwrap(), DaemonExit::Cancelled);
    assert!(h.locks.holder(DEFAULT_LOCK_KEY).is_some());
    assert_eq!(h.directory.calls(), 0);

    let levels = logs.levels();
    assert!(levels.contains(&Level::INFO));
    assert!(!levels.contains(&Level::ERROR), "cancellation logged as an error");
}

// ============================================================================
// PROPERTY 7: LOCK FAILURE EXIT
// ============================================================================

#[tokio::test(start_paused = true)]
async fn lock_failure_exits_without_a_pass() {
    let logs = LevelLog::default();
    let _guard = logs.install();
    let h = Harness::new(&["acme"]);
    h.locks.fail_lock(LockError::Backend {
        key: DEFAULT_LOCK_KEY.to_string(),
        reason: "etcd unreachable".to_string(),
    });
    let reconciler = h.reconciler(fast_config()).await.unwrap();
    let metrics = reconciler.metrics();

    let (_tx, rx) = watch::channel(false);
    let exit = reconciler.run_daemon(Some(TICK), h.locks(), rx).await;

    assert_eq!(exit, DaemonExit::LockUnavailable);
    assert_eq!(h.directory.calls(), 0);
    assert_eq!(metrics.snapshot().passes, 0);
    assert_eq!(metrics.snapshot().leadership_terms, 0);
    assert_tenant_missing(&h.store, "acme");
    assert!(logs.levels().contains(&Level::ERROR));
}

#[tokio::test(start_paused = true)]
async fn handle_creation_failure_exits_without_a_pass() {
    let h = Harness::new(&["acme"]);
    h.locks.fail_new_handle(LockError::Backend {
        key: DEFAULT_LOCK_KEY.to_string(),
        reason: "session expired".to_string(),
    });
    let reconciler = h.reconciler(fast_config()).await.unwrap();

    let (_tx, rx) = watch::channel(false);
    let exit = reconciler.run_daemon(Some(TICK), h.locks(), rx).await;

    assert_eq!(exit, DaemonExit::LockUnavailable);
    assert_eq!(h.directory.calls(), 0);
    assert_eq!(h.locks.acquisitions(), 0);
}

#[tokio::test(start_paused = true)]
async fn backend_cancellation_is_not_a_failure() {
    let logs = LevelLog::default();
    let _guard = logs.install();
    let h = Harness::new(&["acme"]);
    h.locks.fail_lock(LockError::Cancelled);
    let reconciler = h.reconciler(fast_config()).await.unwrap();

    let (_tx, rx) = watch::channel(false);
    let exit = reconciler.run_daemon(Some(TICK), h.locks(), rx).await;

    assert_eq!(exit, DaemonExit::Cancelled);
    assert_eq!(h.directory.calls(), 0);
    assert!(!logs.levels().contains(&Level::ERROR));
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_start_never_contends() {
    let h = Harness::new(&["acme"]);
    let reconciler = h.reconciler(fast_config()).await.unwrap();

    let (tx, rx) = watch::channel(true);
    let exit = reconciler.run_daemon(Some(TICK), h.locks(), rx).await;
    drop(tx);

    assert_eq!(exit, DaemonExit::Cancelled);
    assert_eq!(h.locks.acquisitions(), 0);
    assert_eq!(h.directory.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn lock_retry_policy_rides_out_transient_failure() {
    let h = Harness::new(&["acme"]);
    h.locks.fail_lock(LockError::Backend {
        key: DEFAULT_LOCK_KEY.to_string(),
        reason: "leader election in progress".to_string(),
    });
    let config = ReconcilerConfig {
        lock_retry: RetryPolicy::exponential(3),
        ..fast_config()
    };
    let reconciler = h.reconciler(config).await.unwrap();

    let locks = h.locks.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(50)).await;
        locks.clear_failures();
    });

    let (tx, rx) = watch::channel(false);
    let daemon = tokio::spawn(reconciler.run_daemon(Some(TICK), h.locks(), rx));

    sleep(Duration::from_millis(500)).await;
    assert_tenant_provisioned(&h.store, "acme");

    tx.send(true).unwrap();
    assert_eq!(daemon.await.unwrap(), DaemonExit::Shutdown);
}
