//! Bounded polling loops.
//!
//! All "wait for N pods in state" operations block the calling task for up to
//! a bounded timeout, polling at a fixed sleep interval. There is no
//! event-driven notification and no proactive cancellation: a timed-out wait
//! simply stops polling and returns [`Error::Timeout`], leaving any in-flight
//! remote call to complete on its own.

use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::ListParams;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::STATUS_RUNNING;
use crate::error::{Error, Result};

/// Poll interval used by the health and role-count checks.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Poll interval used by the rebalance-completion wait.
pub const REBALANCE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Poll `check` every `interval` until it returns true or `timeout` elapses.
///
/// Errors from `check` are logged and treated as "not yet"; only the timeout
/// itself is surfaced, named after `operation`.
pub async fn poll_until<F, Fut>(
    operation: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Timeout {
                operation: operation.to_string(),
                duration: timeout,
            });
        }

        match check().await {
            Ok(true) => return Ok(()),
            Ok(false) => {
                debug!(operation, "Condition not yet met");
            }
            Err(e) => {
                warn!(operation, error = %e, "Error while polling condition");
            }
        }

        tokio::time::sleep(interval).await;
    }
}

/// Count pods matching `selector` whose reported phase is Running.
pub async fn count_running_pods(pods: &Api<Pod>, selector: &str) -> Result<usize> {
    let list = pods
        .list(&ListParams::default().labels(selector))
        .await?;
    Ok(list
        .items
        .iter()
        .filter(|p| {
            p.status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .is_some_and(|phase| phase == STATUS_RUNNING)
        })
        .count())
}

/// Wait until pods selected by `selector` are Running.
///
/// With `resource_count = Some(n)` exactly `n` Running pods are required;
/// with `None` at least one suffices. Mirrors the generic wait-for-resource
/// primitive the role checks are built on.
pub async fn wait_for_pods_running(
    pods: &Api<Pod>,
    selector: &str,
    resource_count: Option<usize>,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    let operation = match resource_count {
        Some(n) => format!("{} Running pods for '{}'", n, selector),
        None => format!("Running pods for '{}'", selector),
    };

    poll_until(&operation, timeout, interval, || async {
        let running = count_running_pods(pods, selector).await?;
        Ok(match resource_count {
            Some(expected) => running == expected,
            None => running > 0,
        })
    })
    .await
}
