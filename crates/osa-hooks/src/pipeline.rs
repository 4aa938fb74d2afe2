//! The pipeline: runs an event's handler chain in priority order, applying
//! blocking semantics and crash isolation.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{error, warn};

use crate::metrics::{EventMetrics, HookMetrics};
use crate::registry::HookRegistry;
use crate::types::{ChainOutcome, HookEvent, HookHandler, HookOutcome, HookPayload};

/// Priority-ordered, per-event middleware pipeline.
///
/// `run` executes the chain synchronously (from the caller's point of
/// view) and respects blocking semantics. `run_async` fires post_* events
/// without waiting for completion; results are discarded.
pub struct HookPipeline {
    registry: Arc<HookRegistry>,
    metrics: Arc<HookMetrics>,
    /// Wall-clock budget for the whole chain.
    chain_timeout: std::time::Duration,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(HookRegistry::new()),
            metrics: Arc::new(HookMetrics::new()),
            chain_timeout: std::time::Duration::from_secs(10),
        }
    }

    pub fn registry(&self) -> Arc<HookRegistry> {
        self.registry.clone()
    }

    pub fn metrics(&self, event: HookEvent) -> EventMetrics {
        self.metrics.snapshot(event)
    }

    /// Register a handler built with `HookHandler::new`, at the priority
    /// baked into the handler.
    pub fn register_handler(&self, event: HookEvent, handler: HookHandler) {
        self.registry.register(event, handler);
    }

    /// Run the handler chain for `event` against `payload`, in priority
    /// order. A handler that panics is caught, logged, and the chain
    /// continues with the payload as of the prior handler (crash isolation).
    /// A `Block` halts the chain — only valid on
    /// `pre_tool_use` / `pre_response`; a non-blocking event's handler that
    /// returns `Block` is treated as `Skip` with a warning, since nothing
    /// downstream honors it.
    pub async fn run(&self, event: HookEvent, payload: HookPayload) -> ChainOutcome {
        let result = tokio::time::timeout(self.chain_timeout, self.run_inner(event, payload.clone()))
            .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(event = event.as_str(), "hook chain timed out");
                ChainOutcome::Completed(payload)
            }
        }
    }

    async fn run_inner(&self, event: HookEvent, payload: HookPayload) -> ChainOutcome {
        let mut current = payload;

        let names = self.registry.names_in_order(event);
        for name in names {
            let start = Instant::now();
            let outcome = self
                .registry
                .with_handlers(event, |entries| {
                    entries.iter().find(|h| h.name == name).map(|h| (h.handler)(current.clone()))
                });

            let Some(fut) = outcome else { continue };

            let caught = AssertUnwindSafe(fut).catch_unwind().await;
            let elapsed_us = start.elapsed().as_micros() as u64;

            let handler_outcome = match caught {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(&panic);
                    error!(event = event.as_str(), hook = %name, error = %message, "hook handler panicked; continuing chain");
                    self.metrics.record_call(event, elapsed_us, false);
                    continue;
                }
            };

            match handler_outcome {
                HookOutcome::Ok(updated) => {
                    current = updated;
                    self.metrics.record_call(event, elapsed_us, false);
                }
                HookOutcome::Skip => {
                    self.metrics.record_call(event, elapsed_us, false);
                }
                HookOutcome::Block(reason) => {
                    self.metrics.record_call(event, elapsed_us, true);
                    if !event.may_block() {
                        warn!(
                            event = event.as_str(),
                            hook = %name,
                            "handler returned Block on a non-blocking event; ignoring"
                        );
                        continue;
                    }
                    return ChainOutcome::Blocked { hook: name, reason };
                }
            }
        }

        ChainOutcome::Completed(current)
    }

    /// Fire-and-forget dispatch for post_* events. Spawns a task; the
    /// result (including any block decision) is discarded since nothing
    /// downstream waits on it.
    pub fn run_async(self: &Arc<Self>, event: HookEvent, payload: HookPayload) {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let _ = pipeline.run(event, payload).await;
        });
    }
}

impl Default for HookPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn chain_runs_in_priority_order_and_threads_payload() {
        let pipeline = HookPipeline::new();
        pipeline.register_handler(
            HookEvent::PreToolUse,
            HookHandler::new("add_a", 10, |p| async move {
                let mut p = p;
                p["order"].as_array_mut().unwrap().push(json!("a"));
                HookOutcome::Ok(p)
            }),
        );
        pipeline.register_handler(
            HookEvent::PreToolUse,
            HookHandler::new("add_b", 20, |p| async move {
                let mut p = p;
                p["order"].as_array_mut().unwrap().push(json!("b"));
                HookOutcome::Ok(p)
            }),
        );

        let outcome = pipeline
            .run(HookEvent::PreToolUse, json!({"order": []}))
            .await;
        match outcome {
            ChainOutcome::Completed(payload) => {
                assert_eq!(payload["order"], json!(["a", "b"]));
            }
            _ => panic!("expected completed chain"),
        }
    }

    #[tokio::test]
    async fn block_halts_chain_on_blocking_event() {
        let pipeline = HookPipeline::new();
        pipeline.register_handler(
            HookEvent::PreToolUse,
            HookHandler::new("security_check", 10, |_p| async move {
                HookOutcome::Block("dangerous command".into())
            }),
        );
        pipeline.register_handler(
            HookEvent::PreToolUse,
            HookHandler::new("never_runs", 20, |_p| async move {
                panic!("should not execute after a block");
            }),
        );

        let outcome = pipeline.run(HookEvent::PreToolUse, json!({})).await;
        match outcome {
            ChainOutcome::Blocked { hook, reason } => {
                assert_eq!(hook, "security_check");
                assert_eq!(reason, "dangerous command");
            }
            _ => panic!("expected blocked chain"),
        }
    }

    #[tokio::test]
    async fn crash_isolation_continues_chain_with_prior_payload() {
        let pipeline = HookPipeline::new();
        pipeline.register_handler(
            HookEvent::PostToolUse,
            HookHandler::new("sets_marker", 10, |p| async move {
                let mut p = p;
                p["marker"] = json!("set");
                HookOutcome::Ok(p)
            }),
        );
        pipeline.register_handler(
            HookEvent::PostToolUse,
            HookHandler::new("crashes", 20, |_p| async move {
                panic!("boom");
            }),
        );
        pipeline.register_handler(
            HookEvent::PostToolUse,
            HookHandler::new("runs_after_crash", 30, |p| async move {
                let mut p = p;
                p["ran_after_crash"] = json!(true);
                HookOutcome::Ok(p)
            }),
        );

        let outcome = pipeline.run(HookEvent::PostToolUse, json!({})).await;
        match outcome {
            ChainOutcome::Completed(payload) => {
                assert_eq!(payload["marker"], json!("set"));
                assert_eq!(payload["ran_after_crash"], json!(true));
            }
            _ => panic!("expected completed chain"),
        }
    }

    #[tokio::test]
    async fn block_on_non_blocking_event_is_ignored() {
        let pipeline = HookPipeline::new();
        pipeline.register_handler(
            HookEvent::PostToolUse,
            HookHandler::new("tries_to_block", 10, |_p| async move {
                HookOutcome::Block("nope".into())
            }),
        );
        pipeline.register_handler(
            HookEvent::PostToolUse,
            HookHandler::new("still_runs", 20, |p| async move {
                let mut p = p;
                p["ran"] = json!(true);
                HookOutcome::Ok(p)
            }),
        );

        let outcome = pipeline.run(HookEvent::PostToolUse, json!({})).await;
        assert!(matches!(outcome, ChainOutcome::Completed(p) if p["ran"] == json!(true)));
    }

    #[tokio::test]
    async fn metrics_track_calls_and_blocks() {
        let pipeline = HookPipeline::new();
        pipeline.register_handler(
            HookEvent::PreResponse,
            HookHandler::new("quality_check", 50, |p| async move { HookOutcome::Ok(p) }),
        );
        pipeline.run(HookEvent::PreResponse, json!({})).await;
        pipeline.run(HookEvent::PreResponse, json!({})).await;
        let m = pipeline.metrics(HookEvent::PreResponse);
        assert_eq!(m.call_count, 2);
        assert_eq!(m.block_count, 0);
    }
}
