//! Health and capacity operations over a scanned cluster.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use rand::seq::SliceRandom;
use serde_json::json;
use tokio::time::{Instant, sleep};
use tracing::{error, info, instrument, warn};

use crate::client::{CephCommands, CommandRunner, Toolbox, parsing};
use crate::cluster::topology::ClusterTopology;
use crate::config::{
    GIB, HarnessConfig, IOPS_FOR_1TIB_OSD, MDS_APP_LABEL, MON_APP_LABEL, NOOBAA_APP_LABEL,
    NOOBAA_CORE_POD_LABEL, THROUGHPUT_LIMIT_OSD,
};
use crate::crd::{CephCluster, CephFilesystem, StorageCluster};
use crate::error::{Error, HealthFailureReason, Result};
use crate::wait::{HEALTH_POLL_INTERVAL, wait_for_pods_running};

/// Per-pod contribution to the overall health-check timeout.
const TIMEOUT_PER_POD: Duration = Duration::from_secs(10);

/// Orchestrates health checks, count changes, and capacity derivations.
///
/// Generic over the command runner so the admin-command surface can be
/// exercised against a scripted runner in tests; production callers get a
/// toolbox-backed engine from [`bootstrap`](Self::bootstrap).
pub struct HealthEngine<R: CommandRunner> {
    topology: ClusterTopology,
    commands: Arc<CephCommands<R>>,
    config: HarnessConfig,
    pods: Api<Pod>,
    clusters: Api<CephCluster>,
    filesystems: Api<CephFilesystem>,
    storage_clusters: Api<StorageCluster>,
    deployments: Api<Deployment>,
}

impl HealthEngine<Toolbox> {
    /// Discover the toolbox pod and take an initial topology scan.
    #[instrument(skip(client, config), fields(namespace = %config.namespace))]
    pub async fn bootstrap(client: Client, config: HarnessConfig) -> Result<Self> {
        let toolbox = Toolbox::discover(client.clone(), &config.namespace).await?;
        let commands = Arc::new(CephCommands::new(toolbox));
        Self::with_commands(client, config, commands).await
    }
}

impl<R: CommandRunner> HealthEngine<R> {
    /// Build an engine around an existing command surface.
    pub async fn with_commands(
        client: Client,
        config: HarnessConfig,
        commands: Arc<CephCommands<R>>,
    ) -> Result<Self> {
        let namespace = config.namespace.clone();
        let topology = ClusterTopology::discover(client.clone(), &config).await?;
        Ok(Self {
            topology,
            commands,
            pods: Api::namespaced(client.clone(), &namespace),
            clusters: Api::namespaced(client.clone(), &namespace),
            filesystems: Api::namespaced(client.clone(), &namespace),
            storage_clusters: Api::namespaced(client.clone(), &namespace),
            deployments: Api::namespaced(client, &namespace),
            config,
        })
    }

    /// The current topology snapshot.
    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    /// The admin-command surface backing this engine.
    pub fn commands(&self) -> &Arc<CephCommands<R>> {
        &self.commands
    }

    /// Refresh the topology snapshot.
    pub async fn scan(&mut self) -> Result<()> {
        self.topology.scan().await
    }

    fn default_timeout(&self) -> Duration {
        TIMEOUT_PER_POD * self.topology.pods.len().max(1) as u32
    }

    /// Whether the CephCluster resource currently reports `HEALTH_OK`.
    ///
    /// Reloads the resource first; the comparison is exact and
    /// case-sensitive, so degraded states like `HEALTH_WARN` never pass.
    pub async fn is_health_ok(&mut self) -> Result<bool> {
        self.topology.reload_cluster().await?;
        Ok(self.topology.cluster.is_health_ok())
    }

    async fn health_detail_for_report(&self) -> String {
        match self.commands.get_ceph_health(true).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!(error = %e, "Could not fetch health detail for failure report");
                "<health detail unavailable>".to_string()
            }
        }
    }

    /// Aggregate health check: poll for `HEALTH_OK`, then verify mon and
    /// mds pod counts against the values cached before the check.
    ///
    /// The default timeout scales with cluster size at ten seconds per pod.
    /// Failures carry the failing sub-check and the last observed health
    /// detail.
    #[instrument(skip(self))]
    pub async fn cluster_health_check(&mut self, timeout: Option<Duration>) -> Result<()> {
        let timeout = timeout.unwrap_or_else(|| self.default_timeout());
        let expected_mons = self.topology.mon_count;
        let expected_mdss = self.topology.mds_count;

        let deadline = Instant::now() + timeout;
        loop {
            if self.is_health_ok().await? {
                break;
            }
            if Instant::now() >= deadline {
                let status = self.health_detail_for_report().await;
                error!(%status, "Cluster did not reach HEALTH_OK");
                return Err(Error::HealthCheckFailed {
                    reason: HealthFailureReason::CephHealth,
                    status,
                });
            }
            sleep(HEALTH_POLL_INTERVAL).await;
        }

        self.topology.scan().await?;

        if let Err(e) = self.mon_health_check(expected_mons).await {
            error!(error = %e, "Mon count check failed");
            let status = self.health_detail_for_report().await;
            return Err(Error::HealthCheckFailed {
                reason: HealthFailureReason::MonCount,
                status,
            });
        }

        if expected_mdss > 0
            && let Err(e) = self.mds_health_check(expected_mdss).await
        {
            error!(error = %e, "Mds count check failed");
            let status = self.health_detail_for_report().await;
            return Err(Error::HealthCheckFailed {
                reason: HealthFailureReason::MdsCount,
                status,
            });
        }

        self.noobaa_health_check().await?;

        info!("Cluster HEALTH_OK, all daemon counts satisfied");
        self.topology.scan().await
    }

    /// Wait for exactly `count` Running mon pods, then re-verify each pod's
    /// phase with an individual status lookup.
    #[instrument(skip(self))]
    pub async fn mon_health_check(&self, count: usize) -> Result<()> {
        let timeout = self.default_timeout();
        wait_for_pods_running(
            &self.pods,
            MON_APP_LABEL,
            Some(count),
            timeout,
            HEALTH_POLL_INTERVAL,
        )
        .await
        .map_err(|e| match e {
            Error::Timeout { .. } => Error::RoleCountMismatch {
                role: "mon",
                expected: count,
                actual: self.topology.mon_count,
            },
            other => other,
        })?;

        // Label-selected listing can report stale entries (BZ1748325);
        // confirm with per-pod lookups.
        let listed = self
            .pods
            .list(&ListParams::default().labels(MON_APP_LABEL))
            .await?
            .items
            .iter()
            .map(super::topology::DaemonPod::from_pod)
            .collect::<Vec<_>>();
        let running = self.topology.filter_running(listed).await?;
        if running.len() != count {
            return Err(Error::RoleCountMismatch {
                role: "mon",
                expected: count,
                actual: running.len(),
            });
        }
        info!(count, "Mon count verified");
        Ok(())
    }

    /// Wait for exactly `count` Running mds pods.
    #[instrument(skip(self))]
    pub async fn mds_health_check(&self, count: usize) -> Result<()> {
        let timeout = self.default_timeout();
        wait_for_pods_running(
            &self.pods,
            MDS_APP_LABEL,
            Some(count),
            timeout,
            HEALTH_POLL_INTERVAL,
        )
        .await
        .map_err(|e| match e {
            Error::Timeout { .. } => Error::RoleCountMismatch {
                role: "mds",
                expected: count,
                actual: self.topology.mds_count,
            },
            other => other,
        })?;
        info!(count, "Mds count verified");
        Ok(())
    }

    /// Wait for the gateway operator and core pods to be Running.
    ///
    /// Runs unwrapped inside the aggregate check: a gateway failure
    /// propagates as its own error rather than a health-check failure.
    #[instrument(skip(self))]
    pub async fn noobaa_health_check(&self) -> Result<()> {
        let timeout = self.default_timeout();
        wait_for_pods_running(&self.pods, NOOBAA_APP_LABEL, None, timeout, HEALTH_POLL_INTERVAL)
            .await?;
        wait_for_pods_running(
            &self.pods,
            NOOBAA_CORE_POD_LABEL,
            None,
            timeout,
            HEALTH_POLL_INTERVAL,
        )
        .await?;
        Ok(())
    }

    /// Patch the CephCluster's desired mon count, record the new expected
    /// value, and run the aggregate health check against it.
    #[instrument(skip(self))]
    pub async fn mon_change_count(&mut self, new_count: usize) -> Result<()> {
        self.topology.reload_cluster().await?;
        let patch = json!({"spec": {"mon": {"count": new_count}}});
        self.clusters
            .patch(
                self.topology.cluster_name(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await?;
        info!(new_count, "Patched mon count");

        self.topology.mon_count = new_count;
        self.cluster_health_check(None).await?;
        self.topology.reload_cluster().await
    }

    /// Patch the CephFilesystem's active mds count and health-check against
    /// the derived expected pod count (doubled when standby is enabled).
    #[instrument(skip(self))]
    pub async fn mds_change_count(&mut self, new_active_count: usize) -> Result<()> {
        let filesystem = self
            .topology
            .filesystem
            .as_ref()
            .ok_or_else(|| Error::ResourceNotFound("CephFilesystem".to_string()))?;
        let name = filesystem.name_any();
        let expected_pods = filesystem.expected_mds_pods(new_active_count as i32) as usize;

        let patch = json!({"spec": {"metadataServer": {"activeCount": new_active_count}}});
        self.filesystems
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        info!(new_active_count, expected_pods, "Patched mds active count");

        self.topology.mds_count = expected_pods;
        self.cluster_health_check(None).await?;
        self.topology.reload_filesystem().await
    }

    /// Usable capacity in GiB: raw total divided by the replica factor.
    pub async fn get_ceph_capacity(&self) -> Result<f64> {
        let storage_cluster = self
            .storage_clusters
            .get(&self.config.storage_cluster_name)
            .await?;
        let replica = storage_cluster.replica_factor()?.max(1) as f64;
        let df = self.commands.ceph_df().await?;
        Ok(df.stats.total_bytes as f64 / replica / GIB)
    }

    /// Cluster IOPS as a percentage of the configured per-OSD budget.
    pub async fn get_iops_percentage(&self, osd_size_tib: f64) -> Result<f64> {
        let storage_cluster = self
            .storage_clusters
            .get(&self.config.storage_cluster_name)
            .await?;
        let osd_count = storage_cluster.osd_count()?;
        let iops = self.commands.get_ceph_cluster_iops().await?;
        let pct = parsing::iops_percentage(iops, osd_count, osd_size_tib, IOPS_FOR_1TIB_OSD);
        info!(iops, pct, "Cluster IOPS utilization");
        Ok(pct)
    }

    /// Cluster throughput as a percentage of the fixed throughput ceiling.
    pub async fn get_throughput_percentage(&self) -> Result<f64> {
        let throughput = self.commands.get_cluster_throughput().await?;
        let pct = parsing::throughput_percentage(throughput, THROUGHPUT_LIMIT_OSD);
        info!(throughput, pct, "Cluster throughput utilization");
        Ok(pct)
    }

    /// Names of the mon deployments currently in the cluster.
    pub async fn get_mons_from_cluster(&self) -> Result<Vec<String>> {
        let deployments = self
            .deployments
            .list(&ListParams::default().labels(MON_APP_LABEL))
            .await?;
        Ok(deployments.items.iter().map(ResourceExt::name_any).collect())
    }

    /// Delete one randomly chosen mon deployment and wait for the remaining
    /// mons to settle at the reduced count.
    #[instrument(skip(self))]
    pub async fn remove_mon_from_cluster(&mut self) -> Result<String> {
        let mons = self.get_mons_from_cluster().await?;
        let victim = mons
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| Error::ResourceNotFound("mon deployment".to_string()))?;
        info!(mon = %victim, "Removing mon deployment");

        self.deployments
            .delete(&victim, &DeleteParams::default())
            .await?;

        let remaining = mons.len().saturating_sub(1);
        wait_for_pods_running(
            &self.pods,
            MON_APP_LABEL,
            Some(remaining),
            self.default_timeout(),
            HEALTH_POLL_INTERVAL,
        )
        .await?;
        self.topology.mon_count = remaining;
        Ok(victim)
    }

    /// `ceph health`, optionally with `detail`.
    pub async fn get_ceph_health(&self, detail: bool) -> Result<String> {
        self.commands.get_ceph_health(detail).await
    }

    /// `ceph status` in the requested output format.
    pub async fn get_ceph_status(&self, format: Option<&str>) -> Result<String> {
        self.commands.get_ceph_status(format).await
    }

    /// Base64-encoded key of `client.admin`.
    pub async fn get_admin_key(&self) -> Result<Option<String>> {
        self.commands.get_admin_key().await
    }

    /// Base64-encoded key of an arbitrary auth entity; `None` if absent.
    pub async fn get_user_key(&self, user: &str) -> Result<Option<String>> {
        self.commands.get_user_key(user).await
    }

    /// Create an auth entity with the given caps and return its key.
    pub async fn create_user(&self, username: &str, caps: &str) -> Result<Option<String>> {
        self.commands.create_user(username, caps).await
    }

    /// Stabilized used space of `pool` in GiB.
    pub async fn check_ceph_pool_used_space(&self, pool: &str) -> Result<f64> {
        self.commands.check_ceph_pool_used_space(pool).await
    }

    /// Total client IOPS currently reported by the cluster.
    pub async fn get_ceph_cluster_iops(&self) -> Result<f64> {
        self.commands.get_ceph_cluster_iops().await
    }

    /// Total client throughput in MiB/s currently reported by the cluster.
    pub async fn get_cluster_throughput(&self) -> Result<f64> {
        self.commands.get_cluster_throughput().await
    }

    /// Whether placement-group rebalance has completed.
    pub async fn get_rebalance_status(&self) -> Result<bool> {
        self.commands.get_rebalance_status().await
    }

    /// Wait for rebalance to complete, returning the elapsed minutes.
    pub async fn time_taken_to_complete_rebalance(&self, timeout: Duration) -> Result<f64> {
        self.commands.time_taken_to_complete_rebalance(timeout).await
    }

    /// Poll pod readiness directly, outside the aggregate check.
    pub async fn wait_for_pods(
        &self,
        selector: &str,
        resource_count: Option<usize>,
        timeout: Duration,
    ) -> Result<()> {
        wait_for_pods_running(
            &self.pods,
            selector,
            resource_count,
            timeout,
            HEALTH_POLL_INTERVAL,
        )
        .await
    }
}
