//! Parsers for Ceph command output.
//!
//! Two kinds of input show up here:
//! - structured `--format json` output, deserialized into thin serde rows
//! - the human-readable `ceph status` report, whose `client:` line is the
//!   only source for live IOPS/throughput
//!
//! The `client:` line scrape is format-fragile by nature: it anchors on the
//! `op/s`/`IOPS` and byte-rate unit tokens of the current report format and
//! will miss values if that wording changes. A structured source should be
//! preferred if Ceph ever exposes these rates in the json status.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

/// Number preceding an operations-rate token, with optional `k` suffix.
static IOPS_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9]*\.?[0-9]+)\s*(k?)\s*(?:op/s|IOPS)").ok());

/// Number preceding a byte-rate unit token.
static THROUGHPUT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9]*\.?[0-9]+)\s*(KiB/s|MiB/s|B/s)").ok());

/// Balancer eval score, e.g. `current cluster score 0.013005 (lower is better)`.
static BALANCER_SCORE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"score\s+([0-9]*\.?[0-9]+)").ok());

/// Extract the `client:` IO line from a plain `ceph status` report.
pub fn client_io_line(status: &str) -> Option<&str> {
    status
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("client"))
}

/// Sum the read/write operation rates on the `client:` line, in ops/s.
///
/// Returns `None` when the report has no client line or the line carries no
/// operation-rate tokens (an idle cluster omits them).
pub fn parse_client_iops(status: &str) -> Option<f64> {
    let line = client_io_line(status)?;
    let re = IOPS_RE.as_ref()?;

    let mut total = 0.0;
    let mut seen = false;
    for caps in re.captures_iter(line) {
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        let scale = if caps.get(2).is_some_and(|m| m.as_str() == "k") {
            1000.0
        } else {
            1.0
        };
        total += value * scale;
        seen = true;
    }
    seen.then_some(total)
}

/// Sum the read/write byte rates on the `client:` line, normalized to MiB/s.
pub fn parse_client_throughput(status: &str) -> Option<f64> {
    let line = client_io_line(status)?;
    let re = THROUGHPUT_RE.as_ref()?;

    let mut total = 0.0;
    let mut seen = false;
    for caps in re.captures_iter(line) {
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        let to_mib = match caps.get(2)?.as_str() {
            "B/s" => 1.0 / (1024.0 * 1024.0),
            "KiB/s" => 1.0 / 1024.0,
            _ => 1.0,
        };
        total += value * to_mib;
        seen = true;
    }
    seen.then_some(total)
}

/// Parse the balancer eval score out of `ceph balancer eval` output.
pub fn parse_balancer_eval(output: &str) -> Option<f64> {
    let re = BALANCER_SCORE_RE.as_ref()?;
    re.captures(output)?.get(1)?.as_str().parse().ok()
}

/// Measured IOPS as a percentage of the theoretical OSD ceiling.
pub fn iops_percentage(iops: f64, osd_count: i32, osd_size_tib: f64, iops_per_tib: f64) -> f64 {
    let limit = osd_size_tib * iops_per_tib * f64::from(osd_count);
    (iops / limit) * 100.0
}

/// Measured throughput as a percentage of the fixed cluster ceiling.
pub fn throughput_percentage(throughput_mib: f64, limit_mib: f64) -> f64 {
    (throughput_mib / limit_mib) * 100.0
}

/// `ceph df` output (the fields the harness reads).
#[derive(Debug, Clone, Deserialize)]
pub struct CephDf {
    pub stats: CephDfStats,
}

/// The `stats` block of `ceph df`.
#[derive(Debug, Clone, Deserialize)]
pub struct CephDfStats {
    pub total_bytes: u64,
}

/// `rados df -p <pool>` output.
#[derive(Debug, Clone, Deserialize)]
pub struct RadosDf {
    pub pools: Vec<RadosPool>,
}

/// One pool row of `rados df`.
#[derive(Debug, Clone, Deserialize)]
pub struct RadosPool {
    pub name: String,
    pub size_bytes: u64,
}

/// `ceph osd df` output.
#[derive(Debug, Clone, Deserialize)]
pub struct OsdDf {
    pub nodes: Vec<OsdDfNode>,
}

/// One OSD row of `ceph osd df`.
#[derive(Debug, Clone, Deserialize)]
pub struct OsdDfNode {
    pub name: String,
    pub utilization: f64,
    pub pgs: i64,
}

impl OsdDf {
    /// OSD name to utilization percentage.
    pub fn utilization_by_osd(&self) -> HashMap<String, f64> {
        self.nodes
            .iter()
            .map(|n| (n.name.clone(), n.utilization))
            .collect()
    }

    /// OSD name to placement-group count.
    pub fn pgs_by_osd(&self) -> HashMap<String, i64> {
        self.nodes.iter().map(|n| (n.name.clone(), n.pgs)).collect()
    }
}

/// `ceph balancer status` output.
#[derive(Debug, Clone, Deserialize)]
pub struct BalancerStatus {
    pub active: bool,
    pub mode: String,
}

/// `ceph auth get-key` output.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthKey {
    pub key: String,
}

/// `ceph status -f json` output (the fields the rebalance check reads).
#[derive(Debug, Clone, Deserialize)]
pub struct CephStatus {
    pub health: CephStatusHealth,
    pub pgmap: PgMap,
}

/// The `health` block of the json status.
#[derive(Debug, Clone, Deserialize)]
pub struct CephStatusHealth {
    pub status: String,
}

/// The `pgmap` block of the json status.
#[derive(Debug, Clone, Deserialize)]
pub struct PgMap {
    pub num_pgs: i64,
    #[serde(default)]
    pub pgs_by_state: Vec<PgStateBucket>,
}

/// One placement-group state bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct PgStateBucket {
    pub state_name: String,
    pub count: i64,
}

impl CephStatus {
    /// Whether rebalance is complete: every placement group sits in a single
    /// `active+clean` bucket. Mixed buckets (some degraded, some clean)
    /// report not-complete.
    pub fn rebalance_complete(&self) -> bool {
        match self.pgmap.pgs_by_state.as_slice() {
            [bucket] => bucket.state_name == "active+clean" && bucket.count == self.pgmap.num_pgs,
            _ => false,
        }
    }
}
