//! Bounded collaborator calls.
//!
//! Every call to an external collaborator runs under `tokio::time::timeout`.
//! A timeout (ours or one reported by the collaborator) is retried exactly
//! once after `retry_backoff_ms`; any other error is returned immediately.

use std::future::Future;
use std::time::Duration;

use accrue_core::error::ProviderError;
use accrue_core::params::UpstreamParams;
use tracing::{debug, warn};

pub(crate) async fn call<T, F, Fut>(
    service: &'static str,
    policy: &UpstreamParams,
    mut f: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let limit = Duration::from_millis(policy.timeout_ms);
    for attempt in 1..=2u32 {
        match tokio::time::timeout(limit, f()).await {
            Ok(Err(ProviderError::Timeout { .. })) | Err(_) => {
                warn!(service, attempt, timeout_ms = policy.timeout_ms, "upstream: call timed out");
                if attempt == 1 {
                    tokio::time::sleep(Duration::from_millis(policy.retry_backoff_ms)).await;
                }
            }
            Ok(result) => {
                if attempt > 1 {
                    debug!(service, "upstream: succeeded on retry");
                }
                return result;
            }
        }
    }
    Err(ProviderError::Timeout { service, after_ms: policy.timeout_ms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> UpstreamParams {
        UpstreamParams { timeout_ms: 20, retry_backoff_ms: 1 }
    }

    #[tokio::test]
    async fn passes_through_success() {
        let v = call("svc", &policy(), || async { Ok::<_, ProviderError>(7) }).await;
        assert_eq!(v, Ok(7));
    }

    #[tokio::test]
    async fn retries_once_after_timeout() {
        let calls = AtomicU32::new(0);
        let v = call("svc", &policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Ok::<_, ProviderError>(n)
            }
        })
        .await;
        assert_eq!(v, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_second_timeout() {
        let calls = AtomicU32::new(0);
        let v: Result<(), _> = call("identity", &policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            }
        })
        .await;
        assert_eq!(v, Err(ProviderError::Timeout { service: "identity", after_ms: 20 }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let v: Result<(), _> = call("svc", &policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Unavailable { service: "svc", reason: "down".into() }) }
        })
        .await;
        assert!(matches!(v, Err(ProviderError::Unavailable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
