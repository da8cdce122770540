//! Bounded retry with exponential backoff
//!
//! The policy knows nothing about what it retries: the caller supplies the
//! operation and a predicate deciding whether an error is worth another
//! attempt. The database backend retries connection exceptions, the file
//! backend retries every failed file open.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Number of additional attempts after the first one
const MAX_RETRIES: u32 = 3;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

const MAX_BACKOFF: Duration = Duration::from_secs(2);

const BACKOFF_MULTIPLIER: u32 = 2;

/// Retry configuration
///
/// With the defaults an operation is attempted at most four times, sleeping
/// 1s, 2s and 2s between the attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
            multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Same shape as the default policy, scaled to a different base unit
    pub fn with_unit(unit: Duration) -> Self {
        Self {
            initial_backoff: unit,
            max_backoff: unit * BACKOFF_MULTIPLIER,
            ..Self::default()
        }
    }

    /// Run `operation`, retrying while `is_retriable` accepts the error
    ///
    /// The last error is returned unchanged once the retries are exhausted.
    pub async fn run<T, E, F, Fut, P>(&self, mut operation: F, is_retriable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if retries < self.max_retries && is_retriable(&err) => {
                    retries += 1;
                    warn!(
                        "attempt {} failed, retrying in {:?}: {}",
                        retries, backoff, err
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * self.multiplier).min(self.max_backoff);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Run `operation` with the default policy
pub async fn with_retry<T, E, F, Fut, P>(operation: F, is_retriable: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    RetryPolicy::default().run(operation, is_retriable).await
}
