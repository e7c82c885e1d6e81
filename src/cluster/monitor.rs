//! Background health sampling.
//!
//! [`HealthMonitor::start`] spawns a task that samples `ceph health detail`
//! on a fixed interval. The first sample containing the `HEALTH_ERR`
//! sentinel triggers a one-time capture of the full `ceph status` output,
//! after which sampling stops on its own. [`stop`](HealthMonitorHandle::stop)
//! disables the sampler and surfaces the captured snapshot as an error, so a
//! caller wrapping a disruptive operation propagates cluster breakage with
//! `?`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::client::{CephCommands, CommandRunner};
use crate::config::HEALTH_ERROR;
use crate::error::{Error, HealthFailureReason, Result};

/// Default sampling interval.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Whether a health-detail line reports an error-level state.
fn is_error_status(status: &str) -> bool {
    status.contains(HEALTH_ERROR)
}

/// Factory for background health monitoring runs.
pub struct HealthMonitor;

impl HealthMonitor {
    /// Spawn a sampling task at the default interval.
    pub fn start_default<R>(commands: Arc<CephCommands<R>>) -> HealthMonitorHandle
    where
        R: CommandRunner + 'static,
    {
        Self::start(commands, DEFAULT_MONITOR_INTERVAL)
    }

    /// Spawn a sampling task against the given command surface.
    ///
    /// Transport failures while sampling are logged and skipped; only an
    /// actual `HEALTH_ERR` report ends the run early.
    #[instrument(skip(commands))]
    pub fn start<R>(commands: Arc<CephCommands<R>>, interval: Duration) -> HealthMonitorHandle
    where
        R: CommandRunner + 'static,
    {
        let enabled = Arc::new(AtomicBool::new(true));
        let latest = Arc::new(Mutex::new(None));
        let snapshot = Arc::new(OnceLock::new());

        let task_enabled = Arc::clone(&enabled);
        let task_latest = Arc::clone(&latest);
        let task_snapshot = Arc::clone(&snapshot);
        let task = tokio::spawn(async move {
            info!(interval = ?interval, "Health monitor started");
            while task_enabled.load(Ordering::Relaxed) && task_snapshot.get().is_none() {
                sleep(interval).await;
                let status = match commands.get_ceph_health(true).await {
                    Ok(status) => status,
                    Err(e) => {
                        warn!(error = %e, "Health sample failed");
                        continue;
                    }
                };
                debug!(%status, "Health sample");
                if let Ok(mut latest) = task_latest.lock() {
                    *latest = Some(status.clone());
                }
                if is_error_status(&status) {
                    error!(%status, "Cluster entered HEALTH_ERR, capturing status");
                    let full = match commands.get_ceph_status(None).await {
                        Ok(full) => full,
                        Err(e) => {
                            warn!(error = %e, "Could not capture full status");
                            status
                        }
                    };
                    let _ = task_snapshot.set(full);
                }
            }
            info!("Health monitor stopped");
        });

        HealthMonitorHandle {
            enabled,
            latest,
            snapshot,
            task,
        }
    }
}

/// Handle to a running monitor. Dropping it without calling
/// [`stop`](Self::stop) aborts the sampling task.
pub struct HealthMonitorHandle {
    enabled: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<String>>>,
    snapshot: Arc<OnceLock<String>>,
    task: JoinHandle<()>,
}

impl HealthMonitorHandle {
    /// Disable the sampler, wait for it to drain, and report the outcome.
    ///
    /// Returns the captured `ceph status` snapshot as a health-check
    /// failure if the cluster hit `HEALTH_ERR` at any point during the run.
    pub async fn stop(mut self) -> Result<()> {
        self.enabled.store(false, Ordering::Relaxed);
        if let Err(e) = (&mut self.task).await
            && !e.is_cancelled()
        {
            warn!(error = %e, "Health monitor task ended abnormally");
        }
        match self.snapshot.get() {
            Some(status) => Err(Error::HealthCheckFailed {
                reason: HealthFailureReason::CephHealth,
                status: status.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Most recent health-detail sample, if any.
    pub fn latest(&self) -> Option<String> {
        self.latest.lock().ok().and_then(|l| l.clone())
    }

    /// The captured error snapshot, if the cluster has hit `HEALTH_ERR`.
    pub fn error_snapshot(&self) -> Option<String> {
        self.snapshot.get().cloned()
    }
}

impl Drop for HealthMonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_error_sentinel_detection() {
        assert!(is_error_status("HEALTH_ERR 1 full osd(s)"));
        assert!(is_error_status(
            "HEALTH_ERR [ERR] OSD_FULL: 1 full osd(s)\nosd.2 is full"
        ));
        assert!(!is_error_status("HEALTH_OK"));
        assert!(!is_error_status("HEALTH_WARN 1 osds down"));
    }
}
