//! StorageCluster custom resource (ocs.openshift.io/v1).
//!
//! Read-only source for device-set sizing: OSD count and replica factor.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// StorageCluster describes the OCS-managed storage deployment.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "ocs.openshift.io",
    version = "v1",
    kind = "StorageCluster",
    plural = "storageclusters",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageClusterSpec {
    /// Device sets backing the OSDs.
    pub storage_device_sets: Vec<StorageDeviceSet>,
}

/// One device set: `count` sets of `replica` devices each.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageDeviceSet {
    /// Device-set name.
    pub name: String,
    /// Number of device sets.
    pub count: i32,
    /// Replica factor within each set.
    pub replica: i32,
}

impl StorageCluster {
    /// The first device set, which drives OSD sizing.
    pub fn primary_device_set(&self) -> Result<&StorageDeviceSet> {
        self.spec
            .storage_device_sets
            .first()
            .ok_or_else(|| Error::MissingField("spec.storageDeviceSets".to_string()))
    }

    /// Replica factor of the first device set.
    pub fn replica_factor(&self) -> Result<i32> {
        Ok(self.primary_device_set()?.replica)
    }

    /// Number of OSDs implied by the first device set: `count x replica`.
    pub fn osd_count(&self) -> Result<i32> {
        let set = self.primary_device_set()?;
        Ok(set.count * set.replica)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn storage_cluster(count: i32, replica: i32) -> StorageCluster {
        StorageCluster::new(
            "ocs-storagecluster",
            StorageClusterSpec {
                storage_device_sets: vec![StorageDeviceSet {
                    name: "ocs-deviceset".to_string(),
                    count,
                    replica,
                }],
            },
        )
    }

    #[test]
    fn test_osd_count() {
        assert_eq!(storage_cluster(1, 3).osd_count().unwrap(), 3);
        assert_eq!(storage_cluster(2, 3).osd_count().unwrap(), 6);
    }

    #[test]
    fn test_missing_device_sets() {
        let sc = StorageCluster::new("empty", StorageClusterSpec::default());
        assert!(matches!(sc.osd_count(), Err(Error::MissingField(_))));
    }
}
