//! Partial typed views of the external custom resources the harness reads
//! and patches. Only the fields the harness consumes are modeled; everything
//! else is left to the server because count changes are applied as merge
//! patches.

pub mod ceph_cluster;
pub mod ceph_filesystem;
pub mod storage_cluster;

pub use ceph_cluster::{CephCluster, CephClusterSpec, CephClusterStatus, MonSpec};
pub use ceph_filesystem::{CephFilesystem, CephFilesystemSpec, MetadataServerSpec};
pub use storage_cluster::{StorageCluster, StorageClusterSpec, StorageDeviceSet};
