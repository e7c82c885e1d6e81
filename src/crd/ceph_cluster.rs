//! CephCluster custom resource (ceph.rook.io/v1).
//!
//! The harness never creates this resource; it reads the reported health
//! from status and merge-patches the desired monitor count into spec.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::HEALTH_OK;

/// CephCluster describes a Rook-managed Ceph cluster.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "ceph.rook.io",
    version = "v1",
    kind = "CephCluster",
    plural = "cephclusters",
    status = "CephClusterStatus",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct CephClusterSpec {
    /// Monitor quorum configuration.
    pub mon: MonSpec,
}

/// Desired monitor topology.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MonSpec {
    /// Desired number of monitors.
    pub count: i32,
    /// Whether multiple monitors may share a node.
    pub allow_multiple_per_node: bool,
}

/// Reported CephCluster status.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CephClusterStatus {
    /// Aggregate cluster state reported by the operator.
    pub state: Option<String>,
    /// Ceph-level status block.
    pub ceph: Option<CephStatusInfo>,
}

/// The nested `status.ceph` block.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CephStatusInfo {
    /// Ceph health sentinel, e.g. `HEALTH_OK` or `HEALTH_WARN`.
    pub health: String,
    /// Time the health value was last checked.
    pub last_checked: Option<String>,
}

impl CephCluster {
    /// Whether the reported health equals the OK sentinel exactly.
    pub fn is_health_ok(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.ceph.as_ref())
            .is_some_and(|c| c.health == HEALTH_OK)
    }

    /// Desired monitor count from spec.
    pub fn mon_count(&self) -> i32 {
        self.spec.mon.count
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn cluster_with_health(health: &str) -> CephCluster {
        let mut cluster = CephCluster::new("rook-ceph", CephClusterSpec::default());
        cluster.status = Some(CephClusterStatus {
            ceph: Some(CephStatusInfo {
                health: health.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
        cluster
    }

    #[test]
    fn test_health_ok_exact_match() {
        assert!(cluster_with_health("HEALTH_OK").is_health_ok());
        assert!(!cluster_with_health("HEALTH_WARN").is_health_ok());
        // Case-sensitive by contract.
        assert!(!cluster_with_health("health_ok").is_health_ok());
    }

    #[test]
    fn test_health_missing_status_is_not_ok() {
        let cluster = CephCluster::new("rook-ceph", CephClusterSpec::default());
        assert!(!cluster.is_health_ok());
    }

    #[test]
    fn test_spec_deserializes_camel_case() {
        let spec: CephClusterSpec =
            serde_json::from_str(r#"{"mon":{"count":3,"allowMultiplePerNode":false}}"#).unwrap();
        assert_eq!(spec.mon.count, 3);
    }
}
