//! Cluster topology, health orchestration, and validation.

pub mod engine;
pub mod monitor;
pub mod topology;
pub mod validation;

pub use engine::HealthEngine;
pub use monitor::{HealthMonitor, HealthMonitorHandle};
pub use topology::{ClusterTopology, DaemonPod};
