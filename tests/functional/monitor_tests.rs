//! Background monitor tests, driven with paused time.

use std::sync::Arc;
use std::time::Duration;

use rook_ceph_harness::{CephCommands, Error, HealthMonitor};
use tokio::time::sleep;

use crate::mock_toolbox::{MockToolbox, init_logging};

const INTERVAL: Duration = Duration::from_secs(5);

fn shared_commands(entries: &[(&str, &[&str])]) -> Arc<CephCommands<MockToolbox>> {
    Arc::new(CephCommands::new(MockToolbox::new(entries)))
}

#[tokio::test(start_paused = true)]
async fn test_monitor_stays_quiet_while_healthy() {
    init_logging();
    let commands = shared_commands(&[("ceph health detail", &["HEALTH_OK"])]);
    let handle = HealthMonitor::start(Arc::clone(&commands), INTERVAL);

    sleep(INTERVAL * 4).await;
    assert_eq!(handle.latest().as_deref(), Some("HEALTH_OK"));
    assert!(handle.error_snapshot().is_none());
    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_monitor_captures_error_snapshot() {
    init_logging();
    let commands = shared_commands(&[
        (
            "ceph health detail",
            &["HEALTH_OK", "HEALTH_ERR 1 full osd(s)\nosd.2 is full"],
        ),
        ("ceph status", &["  cluster:\n    health: HEALTH_ERR\n  ..."]),
    ]);
    let handle = HealthMonitor::start(Arc::clone(&commands), INTERVAL);

    sleep(INTERVAL * 3).await;
    let snapshot = handle.error_snapshot().expect("snapshot captured");
    assert!(snapshot.contains("HEALTH_ERR"));

    match handle.stop().await {
        Err(Error::HealthCheckFailed { status, .. }) => {
            assert!(status.contains("HEALTH_ERR"));
        }
        other => panic!("expected health-check failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_monitor_warn_is_not_an_error() {
    let commands = shared_commands(&[(
        "ceph health detail",
        &["HEALTH_WARN 1 osds down\nosd.1 is down"],
    )]);
    let handle = HealthMonitor::start(Arc::clone(&commands), INTERVAL);

    sleep(INTERVAL * 4).await;
    assert!(handle.error_snapshot().is_none());
    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_monitor_skips_failed_samples() {
    // "ceph status" scripted, health detail is not: every sample errors.
    let commands = shared_commands(&[("ceph status", &["unused"])]);
    let handle = HealthMonitor::start(Arc::clone(&commands), INTERVAL);

    sleep(INTERVAL * 3).await;
    assert!(handle.latest().is_none());
    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_monitor_stops_sampling_after_capture() {
    let commands = shared_commands(&[
        ("ceph health detail", &["HEALTH_ERR everything is on fire"]),
        ("ceph status", &["health: HEALTH_ERR"]),
    ]);
    let handle = HealthMonitor::start(Arc::clone(&commands), INTERVAL);

    sleep(INTERVAL * 10).await;
    let issued = commands.runner().issued();
    let samples = issued
        .iter()
        .filter(|c| c.starts_with("ceph health detail"))
        .count();
    assert_eq!(samples, 1);
    assert!(handle.stop().await.is_err());
}
