//! Small helpers shared across the reconcilers.

use std::future::Future;
use std::time::Duration;

use crate::models::RetryPolicy;
use crate::utils::errors::Error;

/// Run `op` under a [`RetryPolicy`]: up to `max_attempts` tries, a fixed
/// `backoff` between them, retrying only errors the policy and `op`'s
/// result agree are retriable (§5 suspension points).
///
/// Authentication/validation-class errors (`is_retriable() == false`) are
/// returned immediately on first failure, matching §5's "not retried"
/// carve-out.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(val) => return Ok(val),
            Err(err) if err.is_retriable() && attempt < policy.max_attempts => {
                tokio::time::sleep(backoff_for(policy, attempt)).await;
                continue;
            }
            Err(err) => return Err(err),
        }
    }
}

/// The fixed backoff §5 specifies (1-3s); we use the policy's configured
/// duration directly rather than computing an exponential curve.
fn backoff_for(policy: &RetryPolicy, _attempt: u32) -> Duration {
    policy.backoff
}
