//! CephFilesystem custom resource (ceph.rook.io/v1).
//!
//! May not exist on clusters deployed without shared-filesystem support; the
//! topology scan treats its absence as non-fatal and re-probes until it
//! appears.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CephFilesystem describes a Rook-managed CephFS instance.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "ceph.rook.io",
    version = "v1",
    kind = "CephFilesystem",
    plural = "cephfilesystems",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct CephFilesystemSpec {
    /// Metadata-server topology.
    pub metadata_server: MetadataServerSpec,
}

/// Desired metadata-server topology.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataServerSpec {
    /// Number of active metadata servers.
    pub active_count: i32,
    /// Whether each active server gets a hot standby. When set, the expected
    /// mds pod count is double the active count.
    pub active_standby: bool,
}

impl CephFilesystem {
    /// Expected mds pod count for the given active count under this spec.
    pub fn expected_mds_pods(&self, active_count: i32) -> i32 {
        if self.spec.metadata_server.active_standby {
            active_count * 2
        } else {
            active_count
        }
    }
}
