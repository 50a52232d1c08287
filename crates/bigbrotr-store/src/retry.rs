use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Configuration for [`with_db_retry`], pinned from `DEFAULT_DB_OPERATION_RETRIES` /
/// `DEFAULT_DB_OPERATION_RETRY_DELAY` in the original implementation's constants module.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

/// Retry `op` with exponential backoff (`base_delay * 2^attempt`) while it fails with a
/// transient error; a permanent error or exhausting `max_attempts` returns immediately.
pub async fn with_db_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.base_delay * 2u32.pow(attempt);
                tracing::warn!(attempt, ?delay, error = %err, "retrying transient store error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
        };
        let result: Result<u32, StoreError> = with_db_retry(policy, || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(StoreError::Transient("not yet".to_string()))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result: Result<u32, StoreError> = with_db_retry(policy, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Permanent("nope".to_string()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
