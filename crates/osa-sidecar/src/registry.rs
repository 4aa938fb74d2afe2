//! Sidecar registry and background health poller.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::circuit::CircuitBreaker;
use crate::types::{Sidecar, SidecarHealth, SidecarRegistryEntry};

struct Registered {
    sidecar: Arc<dyn Sidecar>,
    health: SidecarHealth,
    updated_at: chrono::DateTime<Utc>,
    breaker: Arc<CircuitBreaker>,
}

/// Process-wide mapping `name -> {sidecar, health, capabilities, updated_at}`,
/// with one circuit breaker per sidecar (process-lifetime).
pub struct SidecarRegistry {
    entries: RwLock<HashMap<String, Registered>>,
}

impl SidecarRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, sidecar: Arc<dyn Sidecar>) {
        let name = sidecar.name().to_string();
        let mut entries = self.entries.write().await;
        entries.insert(
            name,
            Registered {
                sidecar,
                health: SidecarHealth::Starting,
                updated_at: Utc::now(),
                breaker: Arc::new(CircuitBreaker::new()),
            },
        );
    }

    pub async fn unregister(&self, name: &str) {
        self.entries.write().await.remove(name);
    }

    pub async fn breaker(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.entries.read().await.get(name).map(|e| e.breaker.clone())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Sidecar>> {
        self.entries.read().await.get(name).map(|e| e.sidecar.clone())
    }

    /// Sidecars providing `capability`, ordered `ready > degraded > starting`
    /// (unavailable sidecars are never candidates).
    pub async fn providers(&self, capability: &str) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut candidates: Vec<(&String, SidecarHealth)> = entries
            .iter()
            .filter(|(_, e)| e.sidecar.capabilities().contains(capability))
            .filter(|(_, e)| e.health != SidecarHealth::Unavailable)
            .map(|(name, e)| (name, e.health))
            .collect();
        candidates.sort_by_key(|(_, health)| health.priority_rank());
        candidates.into_iter().map(|(name, _)| name.clone()).collect()
    }

    pub async fn snapshot(&self) -> Vec<SidecarRegistryEntry> {
        let entries = self.entries.read().await;
        entries
            .values()
            .map(|e| SidecarRegistryEntry {
                name: e.sidecar.name().to_string(),
                health: e.health,
                capabilities: e.sidecar.capabilities().into_iter().collect(),
                updated_at: e.updated_at,
            })
            .collect()
    }

    /// Poll every registered sidecar's `health_check` once, updating the
    /// registry. Called by the background poller on a fixed interval.
    pub async fn poll_once(&self) {
        let names: Vec<String> = {
            let entries = self.entries.read().await;
            entries.keys().cloned().collect()
        };

        for name in names {
            let sidecar = {
                let entries = self.entries.read().await;
                entries.get(&name).map(|e| e.sidecar.clone())
            };
            let Some(sidecar) = sidecar else { continue };

            let health = match sidecar.health_check().await {
                Ok(h) => h,
                Err(e) => {
                    warn!(sidecar = %name, error = %e, "health check failed");
                    SidecarHealth::Unavailable
                }
            };

            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(&name) {
                entry.health = health;
                entry.updated_at = Utc::now();
            }
            debug!(sidecar = %name, ?health, "sidecar health updated");
        }
    }
}

impl Default for SidecarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns a background task that calls `poll_once` every `interval`. The
/// returned handle aborts the task on drop.
pub fn spawn_health_poller(
    registry: Arc<SidecarRegistry>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            registry.poll_once().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use osa_core::error::Result;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSidecar {
        name: String,
        caps: HashSet<String>,
        health: SidecarHealth,
        calls: AtomicUsize,
    }

    impl Sidecar for FakeSidecar {
        fn name(&self) -> &str {
            &self.name
        }
        fn capabilities(&self) -> HashSet<String> {
            self.caps.clone()
        }
        fn call(
            &self,
            _method: &str,
            _params: serde_json::Value,
            _timeout: std::time::Duration,
        ) -> BoxFuture<'_, Result<serde_json::Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(serde_json::json!({"ok": true})) })
        }
        fn health_check(&self) -> BoxFuture<'_, Result<SidecarHealth>> {
            let health = self.health;
            Box::pin(async move { Ok(health) })
        }
    }

    #[tokio::test]
    async fn providers_prefer_ready_over_degraded() {
        let registry = SidecarRegistry::new();
        registry
            .register(Arc::new(FakeSidecar {
                name: "tokenizer-a".into(),
                caps: HashSet::from(["tokenize".to_string()]),
                health: SidecarHealth::Degraded,
                calls: AtomicUsize::new(0),
            }))
            .await;
        registry
            .register(Arc::new(FakeSidecar {
                name: "tokenizer-b".into(),
                caps: HashSet::from(["tokenize".to_string()]),
                health: SidecarHealth::Ready,
                calls: AtomicUsize::new(0),
            }))
            .await;

        let providers = registry.providers("tokenize").await;
        assert_eq!(providers[0], "tokenizer-b");
    }

    #[tokio::test]
    async fn unavailable_sidecar_is_excluded() {
        let registry = SidecarRegistry::new();
        registry
            .register(Arc::new(FakeSidecar {
                name: "git".into(),
                caps: HashSet::from(["git".to_string()]),
                health: SidecarHealth::Unavailable,
                calls: AtomicUsize::new(0),
            }))
            .await;
        assert!(registry.providers("git").await.is_empty());
    }

    #[tokio::test]
    async fn poll_once_updates_health() {
        let registry = SidecarRegistry::new();
        registry
            .register(Arc::new(FakeSidecar {
                name: "embeddings".into(),
                caps: HashSet::from(["embeddings".to_string()]),
                health: SidecarHealth::Ready,
                calls: AtomicUsize::new(0),
            }))
            .await;
        registry.poll_once().await;
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot[0].health, SidecarHealth::Ready);
    }
}
