//! Deadline wrapper for store calls.

use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Run a store call under `limit`. On expiry the call's future is dropped,
/// which cancels it; anything it already committed stays committed.
pub(crate) async fn within<T>(
    limit: Duration,
    operation: &'static str,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    let result = match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            operation,
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    };
    if let Err(ref e) = result {
        tracing::error!(operation, error = %e, "store call failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_results() {
        let ok = within(Duration::from_secs(1), "get", async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out() {
        let result = within(Duration::from_millis(50), "list", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, StoreError>(())
        })
        .await;
        assert_eq!(
            result,
            Err(StoreError::Timeout {
                operation: "list",
                after_ms: 50
            })
        );
    }
}
