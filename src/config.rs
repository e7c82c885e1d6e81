//! Harness configuration.
//!
//! All cluster identity and selector data is carried in an explicit
//! [`HarnessConfig`] handed to the engine at construction, instead of being
//! read from process-wide state.

use serde::{Deserialize, Serialize};

/// Label selector for monitor pods.
pub const MON_APP_LABEL: &str = "app=rook-ceph-mon";
/// Label selector for metadata-server pods.
pub const MDS_APP_LABEL: &str = "app=rook-ceph-mds";
/// Label selector for manager pods.
pub const MGR_APP_LABEL: &str = "app=rook-ceph-mgr";
/// Label selector for object-storage-daemon pods.
pub const OSD_APP_LABEL: &str = "app=rook-ceph-osd";
/// Label selector for the toolbox pod running admin commands.
pub const TOOL_APP_LABEL: &str = "app=rook-ceph-tools";
/// Label selector for the noobaa operator pod.
pub const NOOBAA_APP_LABEL: &str = "app=noobaa";
/// Label selector for the noobaa core pod.
pub const NOOBAA_CORE_POD_LABEL: &str = "noobaa-core=noobaa";

/// Pod phase reported while a pod is running.
pub const STATUS_RUNNING: &str = "Running";
/// Claim phase reported while a PVC is bound.
pub const STATUS_BOUND: &str = "Bound";

/// Sentinel for a healthy cluster in `CephCluster.status.ceph.health`.
pub const HEALTH_OK: &str = "HEALTH_OK";
/// Sentinel present in `ceph health` output on a hard failure.
pub const HEALTH_ERROR: &str = "HEALTH_ERR";
/// Sentinel in `ceph auth` output when the entity does not exist.
pub const ENOENT: &str = "ENOENT";

/// Bytes per GiB, used by capacity and used-space derivations.
pub const GIB: f64 = 1_073_741_824.0;

/// Theoretical IOPS ceiling of a single 1 TiB OSD.
pub const IOPS_FOR_1TIB_OSD: f64 = 500.0;
/// Fixed cluster throughput ceiling in MiB/s.
pub const THROUGHPUT_LIMIT_OSD: f64 = 250.0;

/// Disruption-budget name for metadata servers.
pub const MDS_PDB: &str = "rook-ceph-mds-ocs-storagecluster-cephfilesystem";
/// Disruption-budget name for monitors.
pub const MON_PDB: &str = "rook-ceph-mon-pdb";
/// Disruption-budget name prefix for OSDs, suffixed with the OSD index.
pub const OSD_PDB: &str = "rook-ceph-osd-";

/// Name prefix of device-set PVCs.
pub const DEFAULT_DEVICESET_PVC_NAME: &str = "ocs-deviceset";
/// Name prefix of monitor PVCs.
pub const DEFAULT_MON_PVC_NAME: &str = "rook-ceph-mon";

/// Name pattern of monitor pods.
pub const MON_POD_PATTERN: &str = "rook-ceph-mon";
/// Name pattern of OSD pods (prepare jobs share the prefix).
pub const OSD_POD_PATTERN: &str = "rook-ceph-osd";

/// Configuration for a harness run against one storage cluster.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HarnessConfig {
    /// Namespace the storage cluster lives in.
    pub namespace: String,
    /// Name of the StorageCluster resource driving device sets.
    pub storage_cluster_name: String,
    /// Whether the deployment uses local ephemeral storage. When set, the
    /// PVC-per-pod count check in `validate_cluster_on_pvc` is skipped.
    pub local_storage: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            namespace: "openshift-storage".to_string(),
            storage_cluster_name: "ocs-storagecluster".to_string(),
            local_storage: false,
        }
    }
}

impl HarnessConfig {
    /// Create a configuration for the given namespace and storage cluster.
    pub fn new(namespace: impl Into<String>, storage_cluster_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            storage_cluster_name: storage_cluster_name.into(),
            ..Default::default()
        }
    }

    /// Mark the deployment as using local ephemeral storage.
    pub fn with_local_storage(mut self, local: bool) -> Self {
        self.local_storage = local;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.namespace, "openshift-storage");
        assert!(!config.local_storage);
    }

    #[test]
    fn test_builder() {
        let config = HarnessConfig::new("test-ns", "test-cluster").with_local_storage(true);
        assert_eq!(config.namespace, "test-ns");
        assert_eq!(config.storage_cluster_name, "test-cluster");
        assert!(config.local_storage);
    }

    #[test]
    fn test_config_deserializes_camel_case() {
        let config: HarnessConfig = serde_json::from_str(
            r#"{"namespace":"ns","storageClusterName":"sc","localStorage":true}"#,
        )
        .unwrap();
        assert_eq!(config.storage_cluster_name, "sc");
        assert!(config.local_storage);
    }
}
