//! Caller-specified deadlines for kernel operations.

use nbkernel_domain::KernelError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Await `op`, failing with [`KernelError::KernelPromiseTimeout`] once
/// `timeout` expires.
///
/// Expiry only stops the wait; whatever the kernel is doing continues.
pub async fn with_deadline<T>(
    operation: &'static str,
    timeout: Duration,
    op: impl Future<Output = Result<T, KernelError>>,
) -> Result<T, KernelError> {
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} timed out after {:?}", operation, timeout);
            Err(KernelError::KernelPromiseTimeout {
                operation,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expiry_is_a_kernel_promise_timeout() {
        let result: Result<(), _> = with_deadline(
            "interrupt",
            Duration::from_millis(5000),
            std::future::pending(),
        )
        .await;
        assert_eq!(
            result,
            Err(KernelError::KernelPromiseTimeout {
                operation: "interrupt",
                timeout_ms: 5000,
            })
        );
    }

    #[tokio::test]
    async fn completed_operations_pass_through() {
        let result = with_deadline("restart", Duration::from_secs(1), async {
            Err::<(), _>(KernelError::Disconnected)
        })
        .await;
        assert_eq!(result, Err(KernelError::Disconnected));
    }
}
