//! Lookup behaviour against a scripted upstream.

use std::sync::Arc;
use std::time::Duration;

use telemon_monitor::{Lookup, MonitorError, UsageMonitor};
use telemon_session::{CacheConfig, UserCache};
use telemon_token::{FileTokenStore, InMemoryTokenStore, LoginThrottle, SharedTokenStore, TokenStore};
use telemon_types::{Credentials, ManualClock, ResultKind, UsageData};
use telemon_upstream::{MockUpstream, UpstreamError, sample_important_data};

struct Harness {
    monitor: UsageMonitor,
    upstream: Arc<MockUpstream>,
    store: Arc<InMemoryTokenStore>,
    clock: Arc<ManualClock>,
}

fn build(
    store: SharedTokenStore,
    upstream: Arc<MockUpstream>,
    clock: Arc<ManualClock>,
    ttl: u64,
    interval: u64,
) -> UsageMonitor {
    let cache = UserCache::new(CacheConfig::new().with_ttl(Duration::from_secs(ttl))).unwrap();
    let throttle = LoginThrottle::new(store, Duration::from_secs(interval));
    UsageMonitor::new(cache, throttle, upstream, clock)
}

fn harness_with(upstream: MockUpstream, ttl: u64, interval: u64) -> Harness {
    let upstream = Arc::new(upstream);
    let store = Arc::new(InMemoryTokenStore::new());
    let clock = Arc::new(ManualClock::new(0));
    let monitor = build(store.clone(), upstream.clone(), clock.clone(), ttl, interval);
    Harness {
        monitor,
        upstream,
        store,
        clock,
    }
}

fn harness(ttl: u64, interval: u64) -> Harness {
    harness_with(MockUpstream::new(), ttl, interval)
}

fn alice() -> Credentials {
    Credentials::new("alice", "pw")
}

fn flow_use(lookup: &Lookup) -> i64 {
    match &lookup.data {
        UsageData::Summary(s) => s.flow_use,
        other => panic!("expected summary, got {other:?}"),
    }
}

#[tokio::test]
async fn fresh_value_needs_no_upstream_call() {
    let h = harness(180, 600);
    let first = h.monitor.summary(&alice()).await.unwrap();
    let calls = h.upstream.call_count();

    h.clock.set(179);
    let second = h.monitor.summary(&alice()).await.unwrap();

    assert_eq!(first, second);
    assert!(!second.stale);
    assert_eq!(h.upstream.call_count(), calls);
}

#[tokio::test]
async fn end_to_end_alice() {
    let h = harness_with(
        MockUpstream::new().with_important_data(sample_important_data("alice", 500)),
        180,
        100,
    );

    let t0 = h.monitor.summary(&alice()).await.unwrap();
    assert_eq!(flow_use(&t0), 500 * 1024);
    assert_eq!(h.upstream.login_count(), 1);

    h.clock.set(30);
    let calls = h.upstream.call_count();
    let t30 = h.monitor.summary(&alice()).await.unwrap();
    assert_eq!(t30, t0);
    assert_eq!(h.upstream.call_count(), calls);

    h.upstream
        .set_important_data(sample_important_data("alice", 520));
    h.clock.set(200);
    let t200 = h.monitor.summary(&alice()).await.unwrap();
    assert_eq!(flow_use(&t200), 520 * 1024);
    assert!(!t200.stale);
    assert_eq!(t200.refreshed_at, 200);
    assert_eq!(h.upstream.login_count(), 2);
}

#[tokio::test]
async fn concurrent_stale_requests_log_in_once() {
    let h = harness_with(
        MockUpstream::new().with_delay(Duration::from_millis(50)),
        180,
        600,
    );

    let mut handles = Vec::new();
    for _ in 0..10 {
        let monitor = h.monitor.clone();
        handles.push(tokio::spawn(async move { monitor.summary(&alice()).await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(h.upstream.login_count(), 1);
    assert_eq!(h.upstream.fetch_count(), 1);
}

#[tokio::test]
async fn distinct_users_refresh_independently() {
    let h = harness(180, 600);
    h.monitor.summary(&alice()).await.unwrap();
    h.monitor
        .summary(&Credentials::new("bob", "pw"))
        .await
        .unwrap();

    assert_eq!(h.upstream.logins(), vec!["alice".to_string(), "bob".to_string()]);
}

#[tokio::test]
async fn throttle_boundary() {
    let h = harness(10, 600);
    h.monitor.summary(&alice()).await.unwrap();
    assert_eq!(h.upstream.login_count(), 1);

    // The persisted token no longer works, so only a new login could refresh.
    h.upstream.expire_sessions();

    h.clock.set(599);
    let denied = h.monitor.summary(&alice()).await.unwrap();
    assert!(denied.stale);
    assert_eq!(h.upstream.login_count(), 1);

    h.clock.set(600);
    let refreshed = h.monitor.summary(&alice()).await.unwrap();
    assert!(!refreshed.stale);
    assert_eq!(h.upstream.login_count(), 2);
}

#[tokio::test]
async fn throttled_refresh_reuses_persisted_token() {
    let h = harness(10, 600);
    h.monitor.summary(&alice()).await.unwrap();

    h.clock.set(100);
    let lookup = h.monitor.summary(&alice()).await.unwrap();

    assert!(!lookup.stale);
    assert_eq!(lookup.refreshed_at, 100);
    assert_eq!(h.upstream.login_count(), 1);
    assert_eq!(h.upstream.fetch_count(), 2);
}

#[tokio::test]
async fn token_from_earlier_run_needs_a_login_first() {
    let h = harness(180, 600);
    h.store.set("alice", "persisted", 0).await.unwrap();
    h.upstream.accept_token("persisted");

    // Nothing in this process has checked the password yet.
    h.clock.set(60);
    let err = h.monitor.summary(&alice()).await.unwrap_err();
    assert!(err.is_throttled());
    assert_eq!(h.upstream.call_count(), 0);

    h.clock.set(600);
    let lookup = h.monitor.summary(&alice()).await.unwrap();
    assert!(!lookup.stale);
    assert_eq!(h.upstream.login_count(), 1);
}

#[tokio::test]
async fn restart_with_file_store_keeps_cooldown() {
    let temp = tempfile::tempdir().unwrap();
    let upstream = Arc::new(MockUpstream::new());
    let clock = Arc::new(ManualClock::new(1_000));

    let first = build(
        Arc::new(FileTokenStore::new(temp.path())),
        upstream.clone(),
        clock.clone(),
        180,
        600,
    );
    first.summary(&alice()).await.unwrap();
    drop(first);

    // Fresh cache, same token directory.
    clock.set(1_100);
    let second = build(
        Arc::new(FileTokenStore::new(temp.path())),
        upstream.clone(),
        clock.clone(),
        180,
        600,
    );
    let err = second.summary(&alice()).await.unwrap_err();
    match err {
        MonitorError::ThrottleDenied { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(500));
        }
        other => panic!("expected throttle denial, got {other:?}"),
    }
    assert_eq!(upstream.login_count(), 1);

    // Once logged in again, the token on disk serves later refreshes.
    clock.set(1_600);
    second.summary(&alice()).await.unwrap();
    clock.set(1_800);
    let lookup = second.summary(&alice()).await.unwrap();
    assert!(!lookup.stale);
    assert_eq!(upstream.login_count(), 2);
}

#[tokio::test]
async fn login_failure_serves_previous_value() {
    let h = harness(180, 600);
    let before = h.monitor.summary(&alice()).await.unwrap();

    h.clock.set(700);
    h.upstream
        .fail_next_login(UpstreamError::rejected("1001", "bad password"));
    let after = h.monitor.summary(&alice()).await.unwrap();

    assert!(after.stale);
    assert_eq!(after.data, before.data);
    assert_eq!(after.refreshed_at, 0);

    // The failed attempt still started a cooldown.
    assert_eq!(h.store.get("alice").await.unwrap().login_last_time, 700);
    assert!(!h.monitor.throttle().can_attempt_login("alice", 701).await);
}

#[tokio::test]
async fn login_failure_without_cache_is_an_error() {
    let h = harness(180, 600);
    h.upstream.fail_next_login(UpstreamError::Timeout);

    let err = h.monitor.summary(&alice()).await.unwrap_err();
    assert!(matches!(
        err,
        MonitorError::UpstreamLoginFailed(UpstreamError::Timeout)
    ));
}

#[tokio::test]
async fn fetch_failure_without_cache_is_an_error() {
    let h = harness(180, 600);
    h.upstream
        .fail_next_fetch(UpstreamError::Network("reset".to_string()));

    let err = h.monitor.important_data(&alice()).await.unwrap_err();
    assert!(matches!(err, MonitorError::UpstreamFetchFailed(_)));
}

#[tokio::test]
async fn throttled_without_cache_or_token() {
    let h = harness(180, 600);
    h.store.set("alice", "", 0).await.unwrap();

    h.clock.set(100);
    let err = h.monitor.summary(&alice()).await.unwrap_err();
    match err {
        MonitorError::ThrottleDenied { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(500));
        }
        other => panic!("expected throttle denial, got {other:?}"),
    }
    assert_eq!(h.upstream.call_count(), 0);
}

#[tokio::test]
async fn expired_session_invalidates_token_but_keeps_cooldown() {
    let h = harness(10, 600);
    h.clock.set(50);
    h.monitor.summary(&alice()).await.unwrap();
    h.upstream.expire_sessions();

    h.clock.set(100);
    let lookup = h.monitor.summary(&alice()).await.unwrap();
    assert!(lookup.stale);

    let session = h.store.get("alice").await.unwrap();
    assert!(!session.has_token());
    assert_eq!(session.login_last_time, 50);
}

#[tokio::test]
async fn persistence_failure_does_not_fail_lookup() {
    let h = harness(180, 600);
    h.store.set_fail_writes(true);

    let lookup = h.monitor.summary(&alice()).await.unwrap();
    assert!(!lookup.stale);
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn summary_refresh_also_caches_detail() {
    let h = harness(180, 600);
    h.monitor.summary(&alice()).await.unwrap();
    let detail = h.monitor.important_data(&alice()).await.unwrap();

    assert!(matches!(detail.data, UsageData::Detail(_)));
    assert_eq!(h.upstream.fetch_count(), 1);
}

#[tokio::test]
async fn flux_package_is_cached_separately() {
    let h = harness(180, 600);
    let lookup = h.monitor.flux_package(&alice()).await.unwrap();
    assert_eq!(lookup.data.kind(), ResultKind::FluxPackage);

    h.monitor.flux_package(&alice()).await.unwrap();
    assert_eq!(h.upstream.fetch_count(), 1);
}

#[tokio::test]
async fn invalid_username_never_reaches_upstream() {
    let h = harness(180, 600);
    let err = h
        .monitor
        .summary(&Credentials::new("../etc/passwd", "pw"))
        .await
        .unwrap_err();

    assert!(matches!(err, MonitorError::InvalidUsername));
    assert_eq!(h.upstream.call_count(), 0);
    assert!(h.monitor.cache().is_empty().await);
}

#[tokio::test]
async fn dropped_caller_does_not_cancel_refresh() {
    let h = harness_with(
        MockUpstream::new().with_delay(Duration::from_millis(100)),
        180,
        600,
    );

    let monitor = h.monitor.clone();
    let caller = tokio::spawn(async move { monitor.summary(&alice()).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    caller.abort();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(
        h.monitor
            .cache()
            .get_if_fresh("alice", ResultKind::Summary, 0)
            .await
            .is_some()
    );
    assert!(h.store.get("alice").await.unwrap().has_token());
    assert_eq!(h.upstream.login_count(), 1);
}

#[tokio::test]
async fn logout_forgets_user() {
    let h = harness(180, 600);
    h.monitor.summary(&alice()).await.unwrap();

    h.monitor.logout("alice").await.unwrap();

    let session = h.store.get("alice").await.unwrap();
    assert!(!session.has_token());
    assert_eq!(session.login_last_time, 0);
    assert!(!h.monitor.cache().contains_user("alice").await);
    assert_eq!(h.monitor.cache_stats().await.users, 0);
}

#[tokio::test]
async fn logout_does_not_reset_cooldown() {
    let h = harness(180, 600);
    h.monitor.summary(&alice()).await.unwrap();
    h.monitor.logout("alice").await.unwrap();

    h.clock.set(1);
    let err = h.monitor.summary(&alice()).await.unwrap_err();
    assert!(err.is_throttled());
    assert_eq!(h.upstream.login_count(), 1);

    h.clock.set(600);
    h.monitor.summary(&alice()).await.unwrap();
    assert_eq!(h.upstream.login_count(), 2);
}

#[tokio::test]
async fn wrong_password_is_not_served_from_cache() {
    let h = harness(180, 600);
    h.monitor.summary(&alice()).await.unwrap();

    h.clock.set(10);
    let err = h
        .monitor
        .summary(&Credentials::new("alice", "wrong"))
        .await
        .unwrap_err();

    assert!(err.is_throttled());
    assert_eq!(h.upstream.login_count(), 1);
    assert_eq!(h.upstream.fetch_count(), 1);

    // The owner is still served.
    let lookup = h.monitor.summary(&alice()).await.unwrap();
    assert!(!lookup.stale);
    assert_eq!(lookup.refreshed_at, 0);
}

#[tokio::test]
async fn wrong_password_gets_neither_token_nor_stale_value() {
    let h = harness(10, 600);
    h.monitor.summary(&alice()).await.unwrap();

    h.clock.set(100);
    let err = h
        .monitor
        .summary(&Credentials::new("alice", "wrong"))
        .await
        .unwrap_err();

    assert!(err.is_throttled());
    assert_eq!(h.upstream.fetch_count(), 1);

    let lookup = h.monitor.summary(&alice()).await.unwrap();
    assert!(!lookup.stale);
    assert_eq!(lookup.refreshed_at, 100);
    assert_eq!(h.upstream.login_count(), 1);
}

#[tokio::test]
async fn wrong_password_logs_in_when_allowed() {
    let h = harness(1_000, 600);
    h.monitor.summary(&alice()).await.unwrap();

    h.clock.set(700);
    h.upstream
        .fail_next_login(UpstreamError::rejected("1001", "bad password"));
    let err = h
        .monitor
        .summary(&Credentials::new("alice", "wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, MonitorError::UpstreamLoginFailed(_)));
    assert_eq!(h.upstream.login_count(), 2);

    let lookup = h.monitor.summary(&alice()).await.unwrap();
    assert_eq!(lookup.refreshed_at, 0);
    assert_eq!(h.upstream.login_count(), 2);
}

#[tokio::test]
async fn changed_password_replaces_the_old_one() {
    let h = harness(1_000, 600);
    h.monitor.summary(&alice()).await.unwrap();

    h.clock.set(700);
    let renewed = Credentials::new("alice", "pw2");
    let lookup = h.monitor.summary(&renewed).await.unwrap();
    assert_eq!(lookup.refreshed_at, 700);

    h.clock.set(710);
    assert!(h.monitor.summary(&alice()).await.unwrap_err().is_throttled());
    assert!(h.monitor.summary(&renewed).await.is_ok());
    assert_eq!(h.upstream.login_count(), 2);
}
