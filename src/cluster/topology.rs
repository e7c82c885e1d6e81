//! Cluster topology snapshot.
//!
//! [`ClusterTopology`] holds the per-role pod lists and counts observed at
//! the last scan, plus reloadable views of the CephCluster and
//! CephFilesystem resources. Every scan replaces the lists wholesale; after
//! a successful scan each cached count equals the length of its list.

use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info, instrument, warn};

use crate::config::{
    HarnessConfig, MDS_APP_LABEL, MGR_APP_LABEL, MON_APP_LABEL, NOOBAA_CORE_POD_LABEL,
    OSD_APP_LABEL, STATUS_RUNNING,
};
use crate::crd::{CephCluster, CephFilesystem};
use crate::error::{Error, Result};

/// Typed view of one daemon pod.
///
/// Carries the container port (monitors need it for secret assembly) and the
/// PVC claim names from the pod's volumes, populated at construction.
#[derive(Debug, Clone)]
pub struct DaemonPod {
    /// Pod name.
    pub name: String,
    /// Reported pod phase at scan time.
    pub phase: String,
    /// First container port, if declared.
    pub port: Option<i32>,
    /// Claim names of persistentVolumeClaim-backed volumes.
    pub pvc_claims: Vec<String>,
}

impl DaemonPod {
    /// Build from a Kubernetes pod.
    pub fn from_pod(pod: &Pod) -> Self {
        let port = pod
            .spec
            .as_ref()
            .and_then(|s| s.containers.first())
            .and_then(|c| c.ports.as_ref())
            .and_then(|ports| ports.first())
            .map(|p| p.container_port);

        let pvc_claims = pod
            .spec
            .as_ref()
            .and_then(|s| s.volumes.as_ref())
            .map(|volumes| {
                volumes
                    .iter()
                    .filter_map(|v| {
                        v.persistent_volume_claim
                            .as_ref()
                            .map(|c| c.claim_name.clone())
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: pod.name_any(),
            phase: pod
                .status
                .as_ref()
                .and_then(|s| s.phase.clone())
                .unwrap_or_default(),
            port,
            pvc_claims,
        }
    }

    /// Whether the pod reported Running at scan time.
    pub fn is_running(&self) -> bool {
        self.phase == STATUS_RUNNING
    }
}

/// Snapshot of cluster topology, refreshed in place by [`scan`](Self::scan).
pub struct ClusterTopology {
    pods_api: Api<Pod>,
    clusters_api: Api<CephCluster>,
    filesystems_api: Api<CephFilesystem>,

    cluster_name: String,
    namespace: String,

    /// All pods in the namespace at last scan.
    pub pods: Vec<DaemonPod>,
    /// Monitor pods, filtered to Running by the secondary status check.
    pub mons: Vec<DaemonPod>,
    /// Metadata-server pods.
    pub mdss: Vec<DaemonPod>,
    /// Manager pods.
    pub mgrs: Vec<DaemonPod>,
    /// Object-storage-daemon pods.
    pub osds: Vec<DaemonPod>,
    /// Gateway (noobaa) core pods.
    pub noobaas: Vec<DaemonPod>,

    /// Cached role counts; equal to the list lengths after every scan. The
    /// mon/mds counts double as the expected values captured by the health
    /// check and are overwritten by the count-change operations.
    pub mon_count: usize,
    pub mds_count: usize,
    pub mgr_count: usize,
    pub osd_count: usize,
    pub noobaa_count: usize,

    /// The CephCluster resource, reloaded in place on every scan.
    pub cluster: CephCluster,
    /// The CephFilesystem resource; absent until first provisioned.
    pub filesystem: Option<CephFilesystem>,
}

impl ClusterTopology {
    /// Discover the CephCluster in the configured namespace and take an
    /// initial scan. Assumes the cluster is already deployed and reachable.
    #[instrument(skip(client, config), fields(namespace = %config.namespace))]
    pub async fn discover(client: Client, config: &HarnessConfig) -> Result<Self> {
        let namespace = config.namespace.clone();
        let pods_api: Api<Pod> = Api::namespaced(client.clone(), &namespace);
        let clusters_api: Api<CephCluster> = Api::namespaced(client.clone(), &namespace);
        let filesystems_api: Api<CephFilesystem> = Api::namespaced(client, &namespace);

        let cluster = clusters_api
            .list(&ListParams::default())
            .await?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::ResourceNotFound("CephCluster".to_string()))?;
        let cluster_name = cluster.name_any();

        let filesystem = Self::probe_filesystem(&filesystems_api).await;

        let mut topology = Self {
            pods_api,
            clusters_api,
            filesystems_api,
            cluster_name,
            namespace,
            pods: Vec::new(),
            mons: Vec::new(),
            mdss: Vec::new(),
            mgrs: Vec::new(),
            osds: Vec::new(),
            noobaas: Vec::new(),
            mon_count: 0,
            mds_count: 0,
            mgr_count: 0,
            osd_count: 0,
            noobaa_count: 0,
            cluster,
            filesystem,
        };
        topology.scan().await?;
        info!(
            mons = topology.mon_count,
            mdss = topology.mds_count,
            "Initial topology scan done"
        );
        Ok(topology)
    }

    /// Name of the CephCluster resource.
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Namespace the cluster lives in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn probe_filesystem(api: &Api<CephFilesystem>) -> Option<CephFilesystem> {
        match api.list(&ListParams::default()).await {
            Ok(list) if !list.items.is_empty() => list.items.into_iter().next(),
            Ok(_) => {
                warn!("No CephFilesystem found");
                None
            }
            Err(e) => {
                warn!(error = %e, "No CephFilesystem found");
                None
            }
        }
    }

    /// List pods by label selector as typed records.
    async fn pods_by_label(&self, selector: &str) -> Result<Vec<DaemonPod>> {
        let list = self
            .pods_api
            .list(&ListParams::default().labels(selector))
            .await?;
        Ok(list.items.iter().map(DaemonPod::from_pod).collect())
    }

    /// Re-fetch each pod individually and keep only those reported Running.
    ///
    /// The primary label-selected mon list can transiently include stale or
    /// non-running entries (BZ1748325); the per-pod status lookup filters
    /// them out.
    pub(crate) async fn filter_running(&self, pods: Vec<DaemonPod>) -> Result<Vec<DaemonPod>> {
        let mut running = Vec::with_capacity(pods.len());
        for pod in pods {
            match self.pods_api.get(&pod.name).await {
                Ok(fresh) => {
                    let record = DaemonPod::from_pod(&fresh);
                    if record.is_running() {
                        running.push(record);
                    } else {
                        debug!(pod = %pod.name, phase = %record.phase, "Skipping non-running mon");
                    }
                }
                Err(kube::Error::Api(e)) if e.code == 404 => {
                    debug!(pod = %pod.name, "Mon pod disappeared between list and get");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(running)
    }

    /// Full refresh: all pods, per-role lists, counts, and resource reloads.
    ///
    /// Tolerates the CephFilesystem being absent; it is re-probed on every
    /// scan until it first appears, then only reloaded.
    #[instrument(skip(self))]
    pub async fn scan(&mut self) -> Result<()> {
        let all = self.pods_api.list(&ListParams::default()).await?;
        self.pods = all.items.iter().map(DaemonPod::from_pod).collect();

        let mons = self.pods_by_label(MON_APP_LABEL).await?;
        self.mons = self.filter_running(mons).await?;
        self.mdss = self.pods_by_label(MDS_APP_LABEL).await?;
        self.mgrs = self.pods_by_label(MGR_APP_LABEL).await?;
        self.osds = self.pods_by_label(OSD_APP_LABEL).await?;
        self.noobaas = self.pods_by_label(NOOBAA_CORE_POD_LABEL).await?;

        self.reload_cluster().await?;
        match self.filesystem.as_ref() {
            Some(fs) => {
                let name = fs.name_any();
                self.filesystem = Some(self.filesystems_api.get(&name).await?);
            }
            None => {
                self.filesystem = Self::probe_filesystem(&self.filesystems_api).await;
            }
        }

        self.mon_count = self.mons.len();
        self.mds_count = self.mdss.len();
        self.mgr_count = self.mgrs.len();
        self.osd_count = self.osds.len();
        self.noobaa_count = self.noobaas.len();

        debug!(
            pods = self.pods.len(),
            mons = self.mon_count,
            mdss = self.mds_count,
            mgrs = self.mgr_count,
            osds = self.osd_count,
            noobaas = self.noobaa_count,
            "Topology scan complete"
        );
        Ok(())
    }

    /// Reload the CephCluster resource in place. Identity is preserved;
    /// only the data changes.
    pub async fn reload_cluster(&mut self) -> Result<()> {
        self.cluster = self.clusters_api.get(&self.cluster_name).await?;
        Ok(())
    }

    /// Reload the CephFilesystem resource; errors if it never appeared.
    pub async fn reload_filesystem(&mut self) -> Result<()> {
        let name = self
            .filesystem
            .as_ref()
            .map(|fs| fs.name_any())
            .ok_or_else(|| Error::ResourceNotFound("CephFilesystem".to_string()))?;
        self.filesystem = Some(self.filesystems_api.get(&name).await?);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        Container, ContainerPort, PersistentVolumeClaimVolumeSource, PodSpec, PodStatus, Volume,
    };
    use kube::api::ObjectMeta;

    fn make_pod(name: &str, phase: &str, port: Option<i32>, claim: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "daemon".to_string(),
                    ports: port.map(|p| {
                        vec![ContainerPort {
                            container_port: p,
                            ..Default::default()
                        }]
                    }),
                    ..Default::default()
                }],
                volumes: claim.map(|c| {
                    vec![Volume {
                        name: "data".to_string(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: c.to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]
                }),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_daemon_pod_carries_port() {
        let pod = make_pod("rook-ceph-mon-a", "Running", Some(6789), None);
        let record = DaemonPod::from_pod(&pod);
        assert_eq!(record.port, Some(6789));
        assert!(record.is_running());
    }

    #[test]
    fn test_daemon_pod_collects_claims() {
        let pod = make_pod("rook-ceph-mon-a", "Running", None, Some("rook-ceph-mon-a-pvc"));
        let record = DaemonPod::from_pod(&pod);
        assert_eq!(record.pvc_claims, vec!["rook-ceph-mon-a-pvc".to_string()]);
    }

    #[test]
    fn test_daemon_pod_pending_is_not_running() {
        let pod = make_pod("rook-ceph-osd-0", "Pending", None, None);
        assert!(!DaemonPod::from_pod(&pod).is_running());
    }
}
