//! Bounded retry for noisy metric reads.
//!
//! Some Ceph metrics (pool used-space in particular) report varying values
//! while the cluster is converging. Instead of raising an exception to
//! trigger a retry wrapper, [`retry_until_stable`] samples a fallible async
//! function at a fixed delay and accepts a reading only once two consecutive
//! samples agree exactly. Exhausting the attempt budget yields
//! [`Error::UnstableMetricReading`].

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Default attempt budget for metric stability retries.
pub const DEFAULT_STABILITY_ATTEMPTS: usize = 20;
/// Default delay between metric samples. No backoff multiplier is applied.
pub const DEFAULT_STABILITY_DELAY: Duration = Duration::from_secs(10);

/// Sample `sample` up to `attempts` times, `delay` apart, until two
/// consecutive samples compare equal. Returns the stabilized value.
///
/// Sampling errors are terminal and propagate immediately; only a value that
/// differs from its predecessor counts as a retryable condition.
pub async fn retry_until_stable<T, F, Fut>(
    metric: &str,
    attempts: usize,
    delay: Duration,
    mut sample: F,
) -> Result<T>
where
    T: PartialEq + Clone + std::fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut previous: Option<T> = None;

    for attempt in 1..=attempts {
        let current = sample().await?;
        if let Some(prev) = previous.as_ref()
            && *prev == current
        {
            debug!(metric, attempt, value = ?current, "Metric reading stabilized");
            return Ok(current);
        }
        warn!(metric, attempt, value = ?current, "Metric reading is varying, retrying");
        previous = Some(current);
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(Error::UnstableMetricReading {
        metric: metric.to_string(),
        attempts,
    })
}
