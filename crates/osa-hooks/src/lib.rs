//! Priority-ordered lifecycle hook pipeline.
//!
//! Seven events — `pre_tool_use`, `post_tool_use`, `pre_compact`,
//! `session_start`, `session_end`, `pre_response`, `post_response` — each
//! with its own priority-ordered handler chain. Only `pre_tool_use` and
//! `pre_response` may block. A crashing handler is caught and logged; the
//! chain continues with the payload as of the prior handler.

mod builtins;
mod metrics;
mod pipeline;
mod registry;
mod types;

pub use builtins::{
    auto_format_suggestion, budget_tracker, error_recovery, hierarchical_compaction,
    learning_capture, pattern_consolidation, quality_check, register_all, security_check,
    spend_guard, telemetry,
};
pub use metrics::{EventMetrics, HookMetrics};
pub use pipeline::HookPipeline;
pub use registry::HookRegistry;
pub use types::{ChainOutcome, HandlerFuture, HookEvent, HookHandler, HookOutcome, HookPayload};
