//! Built-in named hooks. Each is a thin adapter over an
//! existing policy object (security patterns, budget tracker) so the
//! pipeline stays the single seam that tool dispatch and response emission
//! run through, without duplicating the policy logic itself.

use std::sync::Arc;

use osa_budget::BudgetTracker;
use osa_core::security::DangerousPatternMatcher;
use serde_json::json;

use crate::pipeline::HookPipeline;
use crate::types::{HookEvent, HookHandler, HookOutcome};

/// `pre_tool_use`, priority 10 — blocks shell commands matching a
/// dangerous pattern (recursive delete, force push, etc).
pub fn security_check(matcher: Arc<DangerousPatternMatcher>) -> HookHandler {
    HookHandler::new("security_check", 10, move |payload| {
        let matcher = matcher.clone();
        async move {
            let command = payload
                .get("command")
                .and_then(|v| v.as_str())
                .or_else(|| payload.get("arguments").and_then(|a| a.get("command")).and_then(|v| v.as_str()));

            if let Some(command) = command {
                if let Some(label) = matcher.is_dangerous(command) {
                    return HookOutcome::Block(format!("dangerous command ({label})"));
                }
            }
            HookOutcome::Ok(payload)
        }
    })
}

/// `pre_tool_use`, priority 8 — runs before `security_check` so an
/// exhausted budget short-circuits before any policy evaluation work.
pub fn spend_guard(budget: BudgetTracker) -> HookHandler {
    HookHandler::new("spend_guard", 8, move |payload| {
        let budget = budget.clone();
        async move {
            match budget.check_limits() {
                Ok(_) => HookOutcome::Ok(payload),
                Err(e) => HookOutcome::Block(format!("budget exceeded: {e}")),
            }
        }
    })
}

/// `pre_tool_use`, priority 20 — records running totals into the payload
/// for downstream observers; never blocks (spend_guard already gated).
pub fn budget_tracker(budget: BudgetTracker) -> HookHandler {
    HookHandler::new("budget_tracker", 20, move |payload| {
        let budget = budget.clone();
        async move {
            let snapshot = budget.snapshot();
            let mut payload = payload;
            payload["budget_snapshot"] = json!({
                "daily_usd": snapshot.daily_usd,
                "monthly_usd": snapshot.monthly_usd,
            });
            HookOutcome::Ok(payload)
        }
    })
}

/// `post_tool_use`, priority 50 — appends the tool invocation to an
/// in-memory episodic buffer for the learning subsystem to flush.
pub fn learning_capture(sink: Arc<dyn Fn(serde_json::Value) + Send + Sync>) -> HookHandler {
    HookHandler::new("learning_capture", 50, move |payload| {
        let sink = sink.clone();
        async move {
            sink(payload.clone());
            HookOutcome::Ok(payload)
        }
    })
}

/// `post_tool_use`, priority 30 — when a tool errored, annotates the
/// payload with a remedy suggestion so the agent loop can surface it.
pub fn error_recovery() -> HookHandler {
    HookHandler::new("error_recovery", 30, |payload| async move {
        let mut payload = payload;
        let is_error = payload
            .get("result")
            .and_then(|r| r.get("is_error"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if is_error {
            payload["remedy_hint"] =
                json!("Re-check tool arguments against its schema before retrying.");
        }
        HookOutcome::Ok(payload)
    })
}

/// Catch-all observability hook, priority 90 — fires on any event, logs a
/// debug line. Never blocks, never mutates.
pub fn telemetry() -> HookHandler {
    HookHandler::new("telemetry", 90, |payload| async move {
        tracing::debug!(?payload, "hook telemetry");
        HookOutcome::Ok(payload)
    })
}

/// `pre_response`, priority 50 — rejects empty or whitespace-only final
/// responses before they reach the user.
pub fn quality_check() -> HookHandler {
    HookHandler::new("quality_check", 50, |payload| async move {
        let text = payload.get("text").and_then(|v| v.as_str()).unwrap_or("");
        if text.trim().is_empty() {
            return HookOutcome::Block("response was empty".to_string());
        }
        HookOutcome::Ok(payload)
    })
}

/// `post_tool_use`, priority 85 — suggests running a formatter after an
/// edit/write tool touched source files. Advisory only.
pub fn auto_format_suggestion() -> HookHandler {
    HookHandler::new("auto_format", 85, |payload| async move {
        let mut payload = payload;
        let tool_name = payload.get("tool_name").and_then(|v| v.as_str()).unwrap_or("");
        if matches!(tool_name, "write" | "edit" | "apply_patch") {
            payload["suggestion"] = json!("consider running the project formatter");
        }
        HookOutcome::Ok(payload)
    })
}

/// `pre_compact`, priority 95 — emits a marker the caller can surface as
/// `context_pressure`; the actual compaction is driven by the Compactor,
/// not the hook itself.
pub fn hierarchical_compaction() -> HookHandler {
    HookHandler::new("hierarchical_compaction", 95, |payload| async move {
        let mut payload = payload;
        payload["compaction_hook_ran"] = json!(true);
        HookOutcome::Ok(payload)
    })
}

/// `session_end`, priority 80 — marks the session for background pattern
/// consolidation; the long-term memory store performs the actual merge.
pub fn pattern_consolidation() -> HookHandler {
    HookHandler::new("pattern_consolidation", 80, |payload| async move {
        let mut payload = payload;
        payload["consolidation_requested"] = json!(true);
        HookOutcome::Ok(payload)
    })
}

/// Register every built-in hook onto `pipeline` at its fixed priority.
pub fn register_all(
    pipeline: &HookPipeline,
    matcher: Arc<DangerousPatternMatcher>,
    budget: BudgetTracker,
    learning_sink: Arc<dyn Fn(serde_json::Value) + Send + Sync>,
) {
    pipeline.register_handler(HookEvent::PreToolUse, spend_guard(budget.clone()));
    pipeline.register_handler(HookEvent::PreToolUse, security_check(matcher));
    pipeline.register_handler(HookEvent::PreToolUse, budget_tracker(budget));
    pipeline.register_handler(HookEvent::PostToolUse, error_recovery());
    pipeline.register_handler(HookEvent::PostToolUse, learning_capture(learning_sink));
    pipeline.register_handler(HookEvent::PostToolUse, auto_format_suggestion());
    pipeline.register_handler(HookEvent::PreResponse, quality_check());
    pipeline.register_handler(HookEvent::PreCompact, hierarchical_compaction());
    pipeline.register_handler(HookEvent::SessionEnd, pattern_consolidation());

    for event in [
        HookEvent::PreToolUse,
        HookEvent::PostToolUse,
        HookEvent::PreCompact,
        HookEvent::SessionStart,
        HookEvent::SessionEnd,
        HookEvent::PreResponse,
        HookEvent::PostResponse,
    ] {
        pipeline.register_handler(event, telemetry());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn security_check_blocks_dangerous_command() {
        let matcher = Arc::new(DangerousPatternMatcher::new(
            &osa_core::security::SecurityPolicy::default_patterns(),
        ));
        let pipeline = HookPipeline::new();
        pipeline.register_handler(HookEvent::PreToolUse, security_check(matcher));

        let outcome = pipeline
            .run(
                HookEvent::PreToolUse,
                json!({"tool_name": "bash", "command": "rm -rf /"}),
            )
            .await;
        assert!(matches!(outcome, crate::types::ChainOutcome::Blocked { .. }));
    }

    #[tokio::test]
    async fn quality_check_blocks_empty_response() {
        let pipeline = HookPipeline::new();
        pipeline.register_handler(HookEvent::PreResponse, quality_check());
        let outcome = pipeline
            .run(HookEvent::PreResponse, json!({"text": "   "}))
            .await;
        assert!(matches!(outcome, crate::types::ChainOutcome::Blocked { .. }));
    }
}
