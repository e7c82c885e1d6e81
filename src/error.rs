//! Error types for the harness.
//!
//! Low-level timeout and count errors are caught at the health-check boundary
//! and re-surfaced as the aggregate [`Error::HealthCheckFailed`] kind. The
//! aggregate carries a [`HealthFailureReason`] so callers can still tell
//! which cluster entity failed, plus the last observed status text for
//! diagnosis.

use std::time::Duration;
use thiserror::Error;

/// Which sub-check caused an aggregate health failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthFailureReason {
    /// Cluster health never reached HEALTH_OK.
    CephHealth,
    /// Monitor count did not converge.
    MonCount,
    /// Metadata-server count did not converge.
    MdsCount,
}

impl std::fmt::Display for HealthFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthFailureReason::CephHealth => write!(f, "ceph health"),
            HealthFailureReason::MonCount => write!(f, "mon count"),
            HealthFailureReason::MdsCount => write!(f, "mds count"),
        }
    }
}

/// Error type for harness operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Structured command output could not be deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote command transport failure (pod exec)
    #[error("Command execution error: {0}")]
    Exec(String),

    /// A bounded wait ran out of time
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Aggregate cluster health failure
    #[error("Cluster health is NOT OK ({reason}): {status}")]
    HealthCheckFailed {
        reason: HealthFailureReason,
        status: String,
    },

    /// A role's pod count did not converge to the expected value
    #[error("Failed to achieve desired {role} count {expected}, got {actual}")]
    RoleCountMismatch {
        role: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A sampled metric kept varying across the bounded retry
    #[error("Metric '{metric}' kept varying across {attempts} samples")]
    UnstableMetricReading { metric: String, attempts: usize },

    /// An expected resource does not exist (yet)
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Admin tool output was malformed (ENOENT itself is a negative result, not this)
    #[error("Admin command output unusable: {0}")]
    AdminCommand(String),

    /// Missing required field in a resource
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Validation failure
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Check if this error indicates a not-found condition.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::ResourceNotFound(_) => true,
            Error::Kube(kube::Error::Api(e)) => e.code == 404,
            _ => false,
        }
    }
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;
