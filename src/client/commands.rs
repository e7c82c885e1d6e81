//! Typed Ceph command surface.
//!
//! [`CephCommands`] wraps a [`CommandRunner`] and exposes the health,
//! capacity, credential and balancer queries the engine and the validation
//! helpers are built on. Structured queries append `--format json` and
//! deserialize; status/health pass-throughs return the raw text.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::client::parsing::{
    self, AuthKey, BalancerStatus, CephDf, CephStatus, OsdDf, RadosDf,
};
use crate::client::toolbox::CommandRunner;
use crate::config::{ENOENT, GIB};
use crate::error::{Error, Result};
use crate::retry::{DEFAULT_STABILITY_ATTEMPTS, DEFAULT_STABILITY_DELAY, retry_until_stable};
use crate::wait::{REBALANCE_POLL_INTERVAL, poll_until};

/// Ceph admin command surface over a [`CommandRunner`].
pub struct CephCommands<R> {
    runner: R,
}

impl<R: CommandRunner> CephCommands<R> {
    /// Wrap a command runner.
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// The underlying transport.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run a command and return its raw output.
    pub async fn run_raw(&self, command: &str) -> Result<String> {
        self.runner.run(command).await
    }

    /// Run a command with `--format json` and deserialize the output.
    pub async fn run_json<T: DeserializeOwned>(&self, command: &str) -> Result<T> {
        let out = self.runner.run(&format!("{} --format json", command)).await?;
        Ok(serde_json::from_str(&out)?)
    }

    /// `ceph health`, optionally with `detail`.
    #[instrument(skip(self))]
    pub async fn get_ceph_health(&self, detail: bool) -> Result<String> {
        let cmd = if detail { "ceph health detail" } else { "ceph health" };
        self.run_raw(cmd).await
    }

    /// `ceph status`, optionally with an output format (`json`, `json-pretty`, `plain`).
    #[instrument(skip(self))]
    pub async fn get_ceph_status(&self, format: Option<&str>) -> Result<String> {
        let cmd = match format {
            Some(f) => format!("ceph status -f {}", f),
            None => "ceph status".to_string(),
        };
        self.run_raw(&cmd).await
    }

    /// Structured `ceph status` for the rebalance check.
    pub async fn get_ceph_status_json(&self) -> Result<CephStatus> {
        let out = self.get_ceph_status(Some("json")).await?;
        Ok(serde_json::from_str(&out)?)
    }

    /// `ceph df`.
    pub async fn ceph_df(&self) -> Result<CephDf> {
        self.run_json("ceph df").await
    }

    /// `ceph osd df`: per-OSD utilization and placement-group counts.
    pub async fn osd_df(&self) -> Result<OsdDf> {
        self.run_json("ceph osd df").await
    }

    /// Per-OSD utilization percentages.
    pub async fn get_osd_utilization(&self) -> Result<HashMap<String, f64>> {
        Ok(self.osd_df().await?.utilization_by_osd())
    }

    /// Per-OSD placement-group counts.
    pub async fn get_pgs_per_osd(&self) -> Result<HashMap<String, i64>> {
        Ok(self.osd_df().await?.pgs_by_osd())
    }

    /// `ceph balancer status`.
    pub async fn balancer_status(&self) -> Result<BalancerStatus> {
        self.run_json("ceph balancer status").await
    }

    /// `ceph balancer eval` score.
    pub async fn balancer_eval(&self) -> Result<f64> {
        let out = self.run_raw("ceph balancer eval").await?;
        parsing::parse_balancer_eval(&out)
            .ok_or_else(|| Error::AdminCommand(format!("no eval score in '{}'", out.trim())))
    }

    /// Base64-encoded key of `client.admin`.
    pub async fn get_admin_key(&self) -> Result<Option<String>> {
        self.get_user_key("client.admin").await
    }

    /// Base64-encoded key of `user`, or `None` when the entity does not
    /// exist (`ENOENT` in the output is a negative result, not an error).
    #[instrument(skip(self))]
    pub async fn get_user_key(&self, user: &str) -> Result<Option<String>> {
        let out = self
            .run_raw(&format!("ceph auth get-key {} --format json", user))
            .await?;
        if out.contains(ENOENT) {
            debug!(user, "No such auth entity");
            return Ok(None);
        }
        let auth: AuthKey = serde_json::from_str(&out)
            .map_err(|e| Error::AdminCommand(format!("unparsable auth output: {}", e)))?;
        Ok(Some(BASE64.encode(auth.key.as_bytes())))
    }

    /// Create a Ceph user with the given caps and return its key.
    #[instrument(skip(self, caps))]
    pub async fn create_user(&self, username: &str, caps: &str) -> Result<Option<String>> {
        // ceph auth add reports through stderr; the runner folds that in.
        let out = self
            .run_raw(&format!("ceph auth add {} {}", username, caps))
            .await?;
        debug!(username, output = %out.trim(), "Created ceph user");
        self.get_user_key(username).await
    }

    /// Used space of `pool` in GiB, accepted only once two consecutive
    /// `rados df` samples agree exactly. Up to 20 attempts, 10 s apart, no
    /// backoff.
    #[instrument(skip(self))]
    pub async fn check_ceph_pool_used_space(&self, pool: &str) -> Result<f64> {
        let used_bytes = retry_until_stable(
            &format!("pool '{}' used space", pool),
            DEFAULT_STABILITY_ATTEMPTS,
            DEFAULT_STABILITY_DELAY,
            || async {
                let df: RadosDf = self.run_json(&format!("rados df -p {}", pool)).await?;
                let first = df
                    .pools
                    .first()
                    .ok_or_else(|| Error::MissingField("rados df pools".to_string()))?;
                Ok(first.size_bytes)
            },
        )
        .await?;
        Ok(used_bytes as f64 / GIB)
    }

    /// Total client IOPS scraped from the status report's `client:` line.
    pub async fn get_ceph_cluster_iops(&self) -> Result<f64> {
        let status = self.get_ceph_status(None).await?;
        let iops = parsing::parse_client_iops(&status)
            .ok_or_else(|| Error::AdminCommand("no client IO line in ceph status".to_string()))?;
        info!(iops, "IOPS in the cluster");
        Ok(iops)
    }

    /// Total client throughput in MiB/s scraped from the `client:` line.
    pub async fn get_cluster_throughput(&self) -> Result<f64> {
        let status = self.get_ceph_status(None).await?;
        let throughput = parsing::parse_client_throughput(&status)
            .ok_or_else(|| Error::AdminCommand("no client IO line in ceph status".to_string()))?;
        info!(throughput_mib_s = throughput, "Cluster throughput");
        Ok(throughput)
    }

    /// Whether placement-group rebalance has completed.
    pub async fn get_rebalance_status(&self) -> Result<bool> {
        let status = self.get_ceph_status_json().await?;
        debug!(health = %status.health.status, pgs = status.pgmap.num_pgs, "Rebalance check");
        Ok(status.rebalance_complete())
    }

    /// Poll rebalance completion every 10 s; returns elapsed minutes.
    #[instrument(skip(self))]
    pub async fn time_taken_to_complete_rebalance(&self, timeout: Duration) -> Result<f64> {
        let start = tokio::time::Instant::now();
        poll_until("rebalance completion", timeout, REBALANCE_POLL_INTERVAL, || async {
            self.get_rebalance_status().await
        })
        .await?;
        let minutes = start.elapsed().as_secs_f64() / 60.0;
        info!(minutes, "Rebalance is completed");
        Ok(minutes)
    }
}
