//! `dispatch(capability, method, params, timeout)`.

use std::time::Duration;

use osa_core::error::{OsaError, Result};

use crate::registry::SidecarRegistry;

/// Route a capability request to the best available sidecar, consulting
/// its circuit breaker and recording the outcome.
pub async fn dispatch(
    registry: &SidecarRegistry,
    capability: &str,
    method: &str,
    params: serde_json::Value,
    timeout: Duration,
) -> Result<serde_json::Value> {
    let providers = registry.providers(capability).await;
    let Some(name) = providers.into_iter().next() else {
        return Err(OsaError::NoSidecar(capability.to_string()));
    };

    let breaker = registry
        .breaker(&name)
        .await
        .expect("breaker exists for every registered sidecar");

    if !breaker.allow_call() {
        return Err(OsaError::CircuitOpen {
            sidecar: name,
            elapsed_secs: breaker.opened_elapsed_secs().unwrap_or(0),
        });
    }

    let sidecar = registry
        .get(&name)
        .await
        .ok_or_else(|| OsaError::NoSidecar(capability.to_string()))?;

    match tokio::time::timeout(timeout, sidecar.call(method, params, timeout)).await {
        Ok(Ok(value)) => {
            breaker.record_success();
            Ok(value)
        }
        Ok(Err(e)) => {
            breaker.record_failure();
            Err(e)
        }
        Err(_) => {
            breaker.record_failure();
            Err(OsaError::SidecarTimeout {
                sidecar: name,
                timeout_secs: timeout.as_secs(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sidecar, SidecarHealth};
    use futures::future::BoxFuture;
    use std::collections::HashSet;
    use std::sync::Arc;

    struct FlakySidecar {
        fail_times: std::sync::atomic::AtomicUsize,
    }

    impl Sidecar for FlakySidecar {
        fn name(&self) -> &str {
            "flaky"
        }
        fn capabilities(&self) -> HashSet<String> {
            HashSet::from(["git".to_string()])
        }
        fn call(
            &self,
            _method: &str,
            _params: serde_json::Value,
            _timeout: Duration,
        ) -> BoxFuture<'_, Result<serde_json::Value>> {
            let n = self.fail_times.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Box::pin(async move {
                if n < 3 {
                    Err(OsaError::Gateway("boom".into()))
                } else {
                    Ok(serde_json::json!({"ok": true}))
                }
            })
        }
        fn health_check(&self) -> BoxFuture<'_, Result<SidecarHealth>> {
            Box::pin(async { Ok(SidecarHealth::Ready) })
        }
    }

    #[tokio::test]
    async fn no_provider_errors() {
        let registry = SidecarRegistry::new();
        let err = dispatch(&registry, "git", "status", serde_json::json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, OsaError::NoSidecar(_)));
    }

    #[tokio::test]
    async fn circuit_opens_after_three_failures_then_rejects() {
        let registry = SidecarRegistry::new();
        registry
            .register(Arc::new(FlakySidecar {
                fail_times: std::sync::atomic::AtomicUsize::new(0),
            }))
            .await;

        for _ in 0..3 {
            let err = dispatch(&registry, "git", "status", serde_json::json!({}), Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, OsaError::Gateway(_)));
        }

        let err = dispatch(&registry, "git", "status", serde_json::json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, OsaError::CircuitOpen { .. }));
    }
}
