use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

use fluvio_future::timer::sleep;

use interoperator_metadata::constants::ERROR_THRESHOLD;

/// bounded retry of a single operation.
///
/// `retries` counts the calls made after the first one, so an operation is
/// run at most `retries + 1` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: ERROR_THRESHOLD,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// total number of calls allowed
    pub fn calls(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// run operation until it succeeds or retries are exhausted,
/// the error of the last call is returned
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, name: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut retried = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if retried < policy.retries => {
                retried += 1;
                debug!(name, retried, %err, "retrying");
                sleep(policy.delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
