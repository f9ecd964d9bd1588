//! Role dispatch over the text-synthesis port.
//!
//! Every role agent in the phase pipelines is a function `(instructions,
//! context) -> text` over the shared [`TextSynthesis`] port. This module
//! provides the single call helper all of them go through: it applies the
//! per-call timeout and retries once with identical input when the failure
//! is transient.

use std::time::Duration;

use tracing::warn;

use crate::error::SynthesisError;
use crate::ports::synthesis::{SynthesisRequest, TextSynthesis};

/// Calls the synthesis port with a timeout and a single retry on transient
/// failure.
///
/// A timeout counts as transient. Non-transient failures and second
/// consecutive transient failures surface to the caller, which treats them
/// as a section-level failure.
///
/// # Errors
///
/// Returns the final `SynthesisError` after the retry budget is spent.
pub async fn synthesize(
    port: &dyn TextSynthesis,
    request: SynthesisRequest,
    timeout: Duration,
) -> Result<String, SynthesisError> {
    match generate_once(port, request.clone(), timeout).await {
        Ok(text) => Ok(text),
        Err(err) if err.is_transient() => {
            warn!(
                role = %request.role,
                error = %err,
                "transient synthesis failure, retrying once with identical input"
            );
            generate_once(port, request, timeout).await
        }
        Err(err) => Err(err),
    }
}

async fn generate_once(
    port: &dyn TextSynthesis,
    request: SynthesisRequest,
    timeout: Duration,
) -> Result<String, SynthesisError> {
    let seconds = timeout.as_secs();
    match tokio::time::timeout(timeout, port.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(SynthesisError::Timeout { seconds }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::synthesis::Role;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with a transient error a fixed number of times, then succeeds.
    struct FlakySynthesis {
        failures: AtomicU32,
    }

    #[async_trait]
    impl TextSynthesis for FlakySynthesis {
        async fn generate(&self, _request: SynthesisRequest) -> Result<String, SynthesisError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(SynthesisError::RequestFailed("connection reset".into()));
            }
            Ok("generated".to_string())
        }
    }

    struct FatalSynthesis;

    #[async_trait]
    impl TextSynthesis for FatalSynthesis {
        async fn generate(&self, _request: SynthesisRequest) -> Result<String, SynthesisError> {
            Err(SynthesisError::ApiError {
                code: 400,
                message: "bad request".into(),
            })
        }
    }

    struct SlowSynthesis;

    #[async_trait]
    impl TextSynthesis for SlowSynthesis {
        async fn generate(&self, _request: SynthesisRequest) -> Result<String, SynthesisError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    fn request() -> SynthesisRequest {
        SynthesisRequest::new(Role::Writer, "write", "context")
    }

    #[tokio::test]
    async fn test_recovers_from_one_transient_failure() {
        let port = FlakySynthesis {
            failures: AtomicU32::new(1),
        };
        let result = synthesize(&port, request(), Duration::from_secs(5)).await;
        assert_eq!(result.unwrap(), "generated");
    }

    #[tokio::test]
    async fn test_two_transient_failures_surface() {
        let port = FlakySynthesis {
            failures: AtomicU32::new(2),
        };
        let result = synthesize(&port, request(), Duration::from_secs(5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let port = FatalSynthesis;
        let result = synthesize(&port, request(), Duration::from_secs(5)).await;
        assert!(matches!(
            result,
            Err(SynthesisError::ApiError { code: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let port = SlowSynthesis;
        let result = synthesize(&port, request(), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(SynthesisError::Timeout { .. })));
    }
}
