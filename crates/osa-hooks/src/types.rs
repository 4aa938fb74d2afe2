//! Core types for the lifecycle hook pipeline.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// The seven lifecycle events hooks can register against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    PreCompact,
    SessionStart,
    SessionEnd,
    PreResponse,
    PostResponse,
}

impl HookEvent {
    /// Only these two events may halt the chain with a block decision.
    pub fn may_block(self) -> bool {
        matches!(self, HookEvent::PreToolUse | HookEvent::PreResponse)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookEvent::PreToolUse => "pre_tool_use",
            HookEvent::PostToolUse => "post_tool_use",
            HookEvent::PreCompact => "pre_compact",
            HookEvent::SessionStart => "session_start",
            HookEvent::SessionEnd => "session_end",
            HookEvent::PreResponse => "pre_response",
            HookEvent::PostResponse => "post_response",
        }
    }
}

/// What a handler returns for a single invocation.
#[derive(Debug, Clone)]
pub enum HookOutcome {
    /// Continue the chain with (possibly modified) payload.
    Ok(serde_json::Value),
    /// Halt the chain. Only valid from handlers on a blocking event.
    Block(String),
    /// Pass through unchanged without contributing a decision.
    Skip,
}

/// The untyped payload passed between handlers. Keeping this JSON (rather
/// than a typed enum per event) mirrors the source's "payload is whatever
/// the caller built" looseness while staying serializable for logging.
pub type HookPayload = serde_json::Value;

/// A single priority-ordered handler registration.
pub struct HookHandler {
    pub name: String,
    pub priority: i32,
    pub handler: Box<dyn Fn(HookPayload) -> HandlerFuture + Send + Sync>,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = HookOutcome> + Send>>;

impl HookHandler {
    pub fn new<F, Fut>(name: impl Into<String>, priority: i32, handler: F) -> Self
    where
        F: Fn(HookPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookOutcome> + Send + 'static,
    {
        Self {
            name: name.into(),
            priority,
            handler: Box::new(move |payload| Box::pin(handler(payload))),
        }
    }
}

/// Outcome of running a full chain for one event.
#[derive(Debug, Clone)]
pub enum ChainOutcome {
    /// Every handler ran (or skipped); final payload attached.
    Completed(HookPayload),
    /// A handler blocked the chain.
    Blocked { hook: String, reason: String },
}
