//! Setup Retry
//!
//! Fixed-attempt, fixed-delay retry for idempotent schema statements issued
//! while a provider starts up. Data-plane operations are never retried here:
//! the driver retries transient RPC failures and hosts may re-issue.
//!
//! ```text
//! attempt 1 ──err──► sleep 1s ──► attempt 2 ──err──► ... ──► attempt 5 ──err──► Err
//!     └──ok──► Ok
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use appstorage_core::Result;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: usize,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Run `operation` until it succeeds or `policy.attempts` are used up.
///
/// The last error is returned unchanged.
pub async fn retry<F, Fut, T>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(what, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < attempts => {
                warn!(
                    what,
                    attempt,
                    attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "Setup statement failed, retrying"
                );
                appstorage_observability::metrics::SETUP_RETRIES_TOTAL.inc();
                sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(what, attempts, error = %e, "Setup statement failed, giving up");
                return Err(e);
            }
        }
    }
}
