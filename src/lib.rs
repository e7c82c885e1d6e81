//! rook-ceph-harness library crate
//!
//! Health, topology, and capacity primitives for driving a Rook/Ceph
//! cluster from end-to-end test suites: a typed Ceph command surface run
//! through the toolbox pod, a scanned topology model, an aggregate health
//! check, a background health monitor, and stateless validation helpers.

pub mod client;
pub mod cluster;
pub mod config;
pub mod crd;
pub mod error;
pub mod retry;
pub mod wait;

pub use client::{CephCommands, CommandRunner, Toolbox};
pub use cluster::{ClusterTopology, DaemonPod, HealthEngine, HealthMonitor, HealthMonitorHandle};
pub use config::HarnessConfig;
pub use error::{Error, HealthFailureReason, Result};
