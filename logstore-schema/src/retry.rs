//! Retry loop for calls that cross to an external system.

use logstore_core::RetryPolicy;
use std::fmt::Display;
use std::future::Future;

/// Run `op` until it succeeds, `retryable` rejects the error, or the policy
/// runs out of retries. The last error is returned.
pub async fn run_with_retry<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    operation: &str,
    retryable: R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && retryable(&err) => {
                let backoff = policy.backoff_for(attempt);
                attempt += 1;
                tracing::warn!(
                    operation,
                    attempt,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Retrying after failure"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}
