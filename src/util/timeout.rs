//! Timeout helper.

use std::future::Future;
use std::time::Duration;

/// Wrap a fallible future with a timeout, mapping expiry into the caller's error type.
pub async fn with_timeout<T, E>(
    duration: Duration,
    future: impl Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expired_future_maps_to_caller_error() {
        let result: Result<(), String> = with_timeout(
            Duration::from_millis(50),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            |d| format!("timed out after {}ms", d.as_millis()),
        )
        .await;
        assert_eq!(result.unwrap_err(), "timed out after 50ms");
    }

    #[tokio::test]
    async fn completed_future_passes_through() {
        let result: Result<u8, String> =
            with_timeout(Duration::from_secs(1), async { Ok(7) }, |_| "late".into()).await;
        assert_eq!(result.unwrap(), 7);
    }
}
