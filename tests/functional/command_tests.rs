//! Command-surface tests over canned toolbox output.

use std::time::Duration;

use rook_ceph_harness::CephCommands;
use rook_ceph_harness::cluster::validation::{validate_osd_utilization, validate_pg_balancer};

use crate::mock_toolbox::{CEPH_DF, MockToolbox, OSD_DF, STATUS_CLEAN, STATUS_REBALANCING};

fn commands(entries: &[(&str, &[&str])]) -> CephCommands<MockToolbox> {
    CephCommands::new(MockToolbox::new(entries))
}

#[tokio::test]
async fn test_health_detail_passthrough() {
    let commands = commands(&[
        ("ceph health detail", &["HEALTH_WARN 1 osds down\nosd.2 is down"]),
        ("ceph health", &["HEALTH_WARN"]),
    ]);
    let detail = commands.get_ceph_health(true).await.unwrap();
    assert!(detail.starts_with("HEALTH_WARN 1 osds down"));
    assert_eq!(commands.get_ceph_health(false).await.unwrap(), "HEALTH_WARN");
}

#[tokio::test]
async fn test_ceph_df_total_bytes() {
    let commands = commands(&[("ceph df", &[CEPH_DF])]);
    let df = commands.ceph_df().await.unwrap();
    assert_eq!(df.stats.total_bytes, 1_649_267_441_664);
}

#[tokio::test]
async fn test_iops_sums_read_and_write() {
    let status = "  io:\n    client:   1.5k op/s rd, 550 op/s wr\n";
    let commands = commands(&[("ceph status", &[status])]);
    let iops = commands.get_ceph_cluster_iops().await.unwrap();
    assert!((iops - 2050.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_throughput_normalized_to_mib() {
    let status = "  io:\n    client:   255 MiB/s rd, 512 KiB/s wr, 100 op/s rd\n";
    let commands = commands(&[("ceph status", &[status])]);
    let throughput = commands.get_cluster_throughput().await.unwrap();
    assert!((throughput - 255.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_rebalance_status_mixed_buckets_incomplete() {
    let commands = commands(&[("ceph status -f json", &[STATUS_REBALANCING, STATUS_CLEAN])]);
    assert!(!commands.get_rebalance_status().await.unwrap());
    assert!(commands.get_rebalance_status().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_rebalance_timing_uses_json_format() {
    let commands = commands(&[(
        "ceph status -f json",
        &[STATUS_REBALANCING, STATUS_REBALANCING, STATUS_CLEAN],
    )]);
    let minutes = commands
        .time_taken_to_complete_rebalance(Duration::from_secs(1800))
        .await
        .unwrap();
    assert!(minutes >= 0.0);
    let issued = commands.runner().issued();
    assert!(issued.iter().all(|c| c.starts_with("ceph status -f json")));
}

#[tokio::test]
async fn test_osd_utilization_against_threshold() {
    let commands = commands(&[("ceph osd df", &[OSD_DF])]);
    assert!(validate_osd_utilization(&commands, 50.0).await.unwrap());
    assert!(!validate_osd_utilization(&commands, 55.0).await.unwrap());
}

#[tokio::test]
async fn test_pg_balancer_inactive_gives_no_judgement() {
    let commands = commands(&[(
        "ceph balancer status",
        &[r#"{"active": false, "mode": "none"}"#],
    )]);
    assert_eq!(validate_pg_balancer(&commands).await.unwrap(), None);
}

#[tokio::test]
async fn test_pg_balancer_upmap_judged_balanced() {
    let commands = commands(&[
        ("ceph balancer status", &[r#"{"active": true, "mode": "upmap"}"#]),
        ("ceph balancer eval", &["current cluster score 0.013057 (lower is better)"]),
        ("ceph osd df", &[OSD_DF]),
    ]);
    assert_eq!(validate_pg_balancer(&commands).await.unwrap(), Some(true));
}

#[tokio::test]
async fn test_pg_balancer_bad_eval_judged_unbalanced() {
    let commands = commands(&[
        ("ceph balancer status", &[r#"{"active": true, "mode": "upmap"}"#]),
        ("ceph balancer eval", &["current cluster score 0.102874 (lower is better)"]),
        ("ceph osd df", &[OSD_DF]),
    ]);
    assert_eq!(validate_pg_balancer(&commands).await.unwrap(), Some(false));
}

#[tokio::test]
async fn test_user_key_lifecycle() {
    let commands = commands(&[
        ("ceph auth add", &["added key for client.harness"]),
        ("ceph auth get-key", &[r#"{"key": "AQBSdDlokq=="}"#]),
    ]);
    let key = commands
        .create_user("client.harness", "mon 'allow r' osd 'allow rw'")
        .await
        .unwrap();
    assert!(key.is_some());
}

#[tokio::test]
async fn test_missing_user_key_is_none_not_error() {
    let commands = commands(&[(
        "ceph auth get-key",
        &["Error ENOENT: failed to find client.ghost in keyring"],
    )]);
    assert_eq!(commands.get_user_key("client.ghost").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_pool_used_space_waits_for_agreement() {
    let growing = r#"{"pools": [{"name": "rbd", "size_bytes": 3221225472}]}"#;
    let settled = r#"{"pools": [{"name": "rbd", "size_bytes": 4294967296}]}"#;
    let commands = commands(&[("rados df -p rbd", &[growing, settled, settled])]);
    let gib = commands.check_ceph_pool_used_space("rbd").await.unwrap();
    assert!((gib - 4.0).abs() < 1e-9);
}
