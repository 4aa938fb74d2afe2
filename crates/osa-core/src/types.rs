use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::goal::GoalEvaluation;
use crate::security::{ApprovalRequest, SecurityTier};

/// Unique session identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single content block in a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },

    #[serde(rename = "thinking")]
    Thinking { thinking: String },
}

/// A chat message in the conversation. Append-only within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Estimated or exact token count of this message, set when appended.
    #[serde(default)]
    pub token_count: u64,
    /// Signal classification of the originating inbound message, if any.
    /// Only ever set on the user message that produced it; never mutated
    /// afterward.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signal: Option<Signal>,
    /// Cost/latency/provider bookkeeping, set on assistant messages.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<MessageMetadata>,
    /// Transient lifecycle tag (e.g. `"memory_flush"`) used to strip
    /// scaffolding messages out of the working copy before persistence.
    /// Never written to the session store.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub phase: Option<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        let text = text.into();
        let token_count = crate::tokenest::estimate_tokens(&text);
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text }],
            timestamp: Some(Utc::now()),
            token_count,
            signal: None,
            metadata: None,
            phase: None,
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let token_count = crate::tokenest::estimate_tokens(&text);
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text }],
            timestamp: Some(Utc::now()),
            token_count,
            signal: None,
            metadata: None,
            phase: None,
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        let content = content.into();
        let token_count = crate::tokenest::estimate_tokens(&content);
        Self {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content,
                is_error,
            }],
            timestamp: Some(Utc::now()),
            token_count,
            signal: None,
            metadata: None,
            phase: None,
        }
    }

    /// Extract all text content from this message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract all tool use blocks from this message.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
                _ => None,
            })
            .collect()
    }

    /// This message's transient lifecycle tag, if any.
    pub fn phase(&self) -> Option<&str> {
        self.phase.as_deref()
    }

    /// Tag this message with a transient lifecycle phase (builder-style).
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// A streaming delta from the LLM.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// A chunk of thinking/reasoning content.
    ThinkingDelta(String),

    /// Start of a tool use block.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },

    /// A chunk of tool use input JSON.
    ToolInputDelta { index: usize, delta: String },

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },

    /// Message ID from the API.
    MessageId(String),
}

/// Result of a tool execution.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Tool definition for sending to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Context passed to tools during execution.
#[derive(Clone)]
pub struct ToolContext {
    pub session_id: SessionId,
    pub working_dir: std::path::PathBuf,
    pub store: Option<Arc<dyn crate::traits::SessionStore>>,
    pub agent_spawner: Option<Arc<dyn AgentSpawner>>,
    pub sandbox_config: Option<crate::config::SandboxConfig>,
    /// Path to the user-config file (`config.json`/TOML), for tools that
    /// read or rewrite scheduling/config state (e.g. `scheduling` builtins).
    pub config_path: Option<std::path::PathBuf>,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("session_id", &self.session_id)
            .field("working_dir", &self.working_dir)
            .field("store", &self.store.is_some())
            .field("agent_spawner", &self.agent_spawner.is_some())
            .field("sandbox_config", &self.sandbox_config)
            .field("config_path", &self.config_path)
            .finish()
    }
}

/// Trait for spawning sub-agents without circular dependencies.
pub trait AgentSpawner: Send + Sync + 'static {
    fn spawn(&self, prompt: String) -> BoxFuture<'_, crate::error::Result<String>>;
}

/// An incoming message from any channel.
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    pub id: String,
    pub session_id: SessionId,
    pub channel: String,
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Content for outgoing messages.
#[derive(Debug, Clone)]
pub enum MessageContent {
    Text(String),
    Streaming { delta: String, done: bool },
}

/// Search result from memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub rank: f64,
}

/// Agent event broadcast to all subscribers.
///
/// Every variant that pertains to a session carries `session_id` so
/// session-scoped subscribers can filter correctly — an unscoped emitter
/// is a bug, not an option (see `osa_core::event`).
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Agent run started.
    RunStarted { session_id: SessionId },
    /// Text streaming from LLM.
    TextDelta { session_id: SessionId, delta: String },
    /// A streamed token chunk, emitted distinctly from `TextDelta` for SSE fan-out.
    StreamingToken { session_id: SessionId, delta: String },
    /// An LLM request is about to be sent.
    LlmRequest { session_id: SessionId, iteration: usize },
    /// An LLM response was received.
    LlmResponse {
        session_id: SessionId,
        iteration: usize,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
    },
    /// Tool execution started.
    ToolCallStart { session_id: SessionId, name: String, input: serde_json::Value },
    /// Tool execution completed.
    ToolCallEnd {
        session_id: SessionId,
        name: String,
        result: ToolResult,
        duration_ms: u64,
    },
    /// Agent turn completed.
    TurnComplete { session_id: SessionId, turn: usize },
    /// Final assistant response for a turn.
    AgentResponse { session_id: SessionId, text: String },
    /// Agent run completed.
    RunComplete {
        session_id: SessionId,
        total_turns: usize,
        input_tokens: u64,
        output_tokens: u64,
    },
    /// Agent run failed.
    RunError { session_id: SessionId, error: String },
    /// Cron job fired.
    CronFired { job_id: String, prompt: String },
    /// Approval requested for a tool call.
    ApprovalRequested { request: ApprovalRequest },
    /// Approval resolved (approved or denied).
    ApprovalResolved { request_id: String, approved: bool },
    /// Tool blocked by security policy.
    ToolBlocked { session_id: SessionId, name: String, tier: SecurityTier, reason: String },
    /// A hook chain halted with a block decision.
    HookBlocked { session_id: SessionId, event: String, hook: String, reason: String },
    /// Guardian detected a stall (no progress for N seconds).
    GuardianStall { session_id: SessionId, turn: usize, elapsed_secs: u64 },
    /// Guardian detected a doom loop (same tool called repeatedly).
    GuardianDoomLoop { session_id: SessionId, tool_name: String, consecutive_calls: usize },
    /// Guardian budget alert (soft warning or hard stop).
    GuardianBudgetAlert { session_id: SessionId, used_tokens: u64, budget_tokens: u64, is_hard_stop: bool },
    /// Guardian injected a corrective hint.
    GuardianHint { session_id: SessionId, message: String },
    /// Token usage update from the agent loop.
    UsageUpdate { session_id: SessionId, input_tokens: u64, output_tokens: u64 },
    /// Maximum ReAct iterations exceeded; best partial result returned.
    MaxIterationsExceeded { session_id: SessionId, iterations: usize },
    /// The agent loop was cancelled mid-turn.
    Cancelled { session_id: SessionId },
    /// A message was classified and its signal cached.
    SignalClassified { session_id: SessionId, signal: Signal },
    /// A message was dropped by the noise filter.
    NoiseDropped { session_id: SessionId, signal: Signal },
    /// Session token utilization crossed a compaction breakpoint.
    ContextPressure { session_id: SessionId, utilization: f64, state: CompactionState },
    /// Multi-agent task wave started.
    WaveStarted { session_id: SessionId, task_group_id: String, wave: u32, task_ids: Vec<String> },
    /// An orchestrator task started.
    TaskStarted { session_id: SessionId, task_id: String, agent_role: String },
    /// An orchestrator task completed (success or upstream_failure).
    TaskCompleted { session_id: SessionId, task_id: String, status: TaskStatus },
    /// A swarm was launched.
    SwarmStarted { session_id: SessionId, swarm_id: String, pattern: String, agent_count: usize },
    /// A swarm worker agent started.
    AgentStarted { session_id: SessionId, swarm_id: String, agent_role: String },
    /// A swarm worker agent reported progress.
    AgentProgress { session_id: SessionId, swarm_id: String, agent_role: String, tool_uses: usize, tokens_used: u64 },
    /// A swarm worker agent completed.
    AgentCompleted { session_id: SessionId, swarm_id: String, agent_role: String },
    /// A swarm worker agent failed.
    AgentFailed { session_id: SessionId, swarm_id: String, agent_role: String, error: String },
    /// A swarm reached a terminal completed state.
    SwarmCompleted { session_id: SessionId, swarm_id: String },
    /// A swarm reached a terminal failed state.
    SwarmFailed { session_id: SessionId, swarm_id: String, error: String },
    /// The Judge evaluated agent output against a goal.
    JudgeVerdict { session_id: SessionId, verdict: Verdict },
    /// Deterministic goal evaluation (emitted alongside `JudgeVerdict::Accept`).
    GoalEvaluated { session_id: SessionId, evaluation: GoalEvaluation },
    /// A tool-call decision was recorded for the self-healing journal.
    DecisionMade { decision: Decision },
    /// A heartbeat check fired.
    HeartbeatFired { timestamp: DateTime<Utc> },
    /// A heartbeat check came back clean (response suppressed).
    HeartbeatOk { session_id: SessionId, response_chars: usize },
    /// A heartbeat check surfaced something needing attention.
    HeartbeatAlert { session_id: SessionId, message: String, target_channel: Option<String> },
}

impl AgentEvent {
    /// The session this event pertains to, if any (a handful of process-wide
    /// events like `CronFired`/`ApprovalRequested`/`ApprovalResolved` carry none).
    pub fn session_id(&self) -> Option<&SessionId> {
        use AgentEvent::*;
        match self {
            RunStarted { session_id }
            | TextDelta { session_id, .. }
            | StreamingToken { session_id, .. }
            | LlmRequest { session_id, .. }
            | LlmResponse { session_id, .. }
            | ToolCallStart { session_id, .. }
            | ToolCallEnd { session_id, .. }
            | TurnComplete { session_id, .. }
            | AgentResponse { session_id, .. }
            | RunComplete { session_id, .. }
            | RunError { session_id, .. }
            | ToolBlocked { session_id, .. }
            | HookBlocked { session_id, .. }
            | GuardianStall { session_id, .. }
            | GuardianDoomLoop { session_id, .. }
            | GuardianBudgetAlert { session_id, .. }
            | GuardianHint { session_id, .. }
            | UsageUpdate { session_id, .. }
            | MaxIterationsExceeded { session_id, .. }
            | Cancelled { session_id }
            | SignalClassified { session_id, .. }
            | NoiseDropped { session_id, .. }
            | ContextPressure { session_id, .. }
            | WaveStarted { session_id, .. }
            | TaskStarted { session_id, .. }
            | TaskCompleted { session_id, .. }
            | SwarmStarted { session_id, .. }
            | AgentStarted { session_id, .. }
            | AgentProgress { session_id, .. }
            | AgentCompleted { session_id, .. }
            | AgentFailed { session_id, .. }
            | SwarmCompleted { session_id, .. }
            | SwarmFailed { session_id, .. }
            | JudgeVerdict { session_id, .. }
            | GoalEvaluated { session_id, .. }
            | HeartbeatOk { session_id, .. }
            | HeartbeatAlert { session_id, .. } => Some(session_id),
            CronFired { .. }
            | ApprovalRequested { .. }
            | ApprovalResolved { .. }
            | DecisionMade { .. }
            | HeartbeatFired { .. } => None,
        }
    }

    /// The SSE event name for this variant, per the external interface's
    /// required event-name set.
    pub fn event_name(&self) -> &'static str {
        use AgentEvent::*;
        match self {
            RunStarted { .. } => "run_started",
            TextDelta { .. } => "text_delta",
            StreamingToken { .. } => "streaming_token",
            LlmRequest { .. } => "llm_request",
            LlmResponse { .. } => "llm_response",
            ToolCallStart { .. } => "tool_call",
            ToolCallEnd { .. } => "tool_result",
            TurnComplete { .. } => "turn_complete",
            AgentResponse { .. } => "agent_response",
            RunComplete { .. } => "run_complete",
            RunError { .. } => "run_error",
            CronFired { .. } => "cron_fired",
            ApprovalRequested { .. } => "approval_requested",
            ApprovalResolved { .. } => "approval_resolved",
            ToolBlocked { .. } => "tool_blocked",
            HookBlocked { .. } => "hook_blocked",
            GuardianStall { .. } => "guardian_stall",
            GuardianDoomLoop { .. } => "guardian_doom_loop",
            GuardianBudgetAlert { .. } => "guardian_budget_alert",
            GuardianHint { .. } => "guardian_hint",
            UsageUpdate { .. } => "usage_update",
            MaxIterationsExceeded { .. } => "max_iterations_exceeded",
            Cancelled { .. } => "cancelled",
            SignalClassified { .. } => "signal_classified",
            NoiseDropped { .. } => "noise_dropped",
            ContextPressure { .. } => "context_pressure",
            WaveStarted { .. } => "wave_started",
            TaskStarted { .. } => "task_started",
            TaskCompleted { .. } => "task_completed",
            SwarmStarted { .. } => "swarm_started",
            AgentStarted { .. } => "agent_started",
            AgentProgress { .. } => "agent_progress",
            AgentCompleted { .. } => "agent_completed",
            AgentFailed { .. } => "agent_failed",
            SwarmCompleted { .. } => "swarm_completed",
            SwarmFailed { .. } => "swarm_failed",
            JudgeVerdict { .. } => "judge_verdict",
            GoalEvaluated { .. } => "goal_evaluated",
            DecisionMade { .. } => "decision_made",
            HeartbeatFired { .. } => "heartbeat_fired",
            HeartbeatOk { .. } => "heartbeat_ok",
            HeartbeatAlert { .. } => "heartbeat_alert",
        }
    }
}

/// Classification mode — broad intent category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalMode {
    Execute,
    Build,
    Analyze,
    Maintain,
    Assist,
}

/// Classification genre — pragmatic force of the message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalGenre {
    Direct,
    Inform,
    Commit,
    Decide,
    Express,
}

/// Classification type — conversational act.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Question,
    Request,
    Issue,
    Scheduling,
    Summary,
    Report,
    General,
}

/// Classification format — derived from channel metadata, never the LLM.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SignalFormat {
    Message,
    Command,
    Document,
    Notification,
}

/// The 5-tuple classification attached to every inbound message.
/// Immutable once produced by the Classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub mode: SignalMode,
    pub genre: SignalGenre,
    pub r#type: SignalType,
    pub format: SignalFormat,
    pub weight: f64,
}

/// Compaction zone state, keyed off session token utilization (§4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompactionState {
    Ok,
    Breakpoint,
    Warning,
    Needed,
    Critical,
}

/// Extra bookkeeping carried alongside a `ChatMessage`: cost, latency, and
/// the provider/model that produced it. Not present on user-authored messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub cost_usd: Option<f64>,
    pub latency_ms: Option<u64>,
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Set on tool-result messages. Carries +0.5 importance in the
    /// Compactor's zone retention scoring (§4.4) rather than being dropped
    /// first when a zone is over budget.
    #[serde(default)]
    pub protected: bool,
}

/// A single recorded cost event, fed into the budget tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub session_id: SessionId,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub timestamp: DateTime<Utc>,
}

/// Category section a long-term memory entry lives under in `MEMORY.md`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    Decision,
    Pattern,
    Solution,
    Context,
    Fact,
}

impl MemoryCategory {
    /// The `# Heading` this category is filed under in `MEMORY.md`.
    pub fn heading(&self) -> &'static str {
        match self {
            MemoryCategory::Decision => "Decisions",
            MemoryCategory::Pattern => "Patterns",
            MemoryCategory::Solution => "Solutions",
            MemoryCategory::Context => "Context",
            MemoryCategory::Fact => "Facts",
        }
    }

    pub fn all() -> [MemoryCategory; 5] {
        [
            MemoryCategory::Decision,
            MemoryCategory::Pattern,
            MemoryCategory::Solution,
            MemoryCategory::Context,
            MemoryCategory::Fact,
        ]
    }

    pub fn from_heading(heading: &str) -> Option<MemoryCategory> {
        match heading {
            "Decisions" => Some(MemoryCategory::Decision),
            "Patterns" => Some(MemoryCategory::Pattern),
            "Solutions" => Some(MemoryCategory::Solution),
            "Context" => Some(MemoryCategory::Context),
            "Facts" => Some(MemoryCategory::Fact),
            _ => None,
        }
    }
}

/// A long-term memory entry persisted in `MEMORY.md` and indexed by the
/// in-memory inverted keyword index (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub category: MemoryCategory,
    pub content: String,
    pub keywords: std::collections::BTreeSet<String>,
    /// In `[0, 1]`.
    pub importance: f64,
    pub created_at: DateTime<Utc>,
}

/// Status of an orchestrator task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Failed without executing because an upstream dependency failed.
    UpstreamFailure,
}

/// An alternative tool call that was considered but not chosen at a
/// decision point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOption {
    pub name: String,
    pub confidence: Option<f64>,
}

/// Execution outcome of a decision, attached once the chosen tool call
/// completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub tokens_used: u64,
    pub latency_ms: u64,
    pub succeeded: bool,
}

/// A record of a tool-call decision made during an agent turn, logged for
/// the self-healing journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub turn: usize,
    pub description: String,
    pub chosen_option: String,
    pub alternatives: Vec<DecisionOption>,
    pub outcome: Option<DecisionOutcome>,
}

/// Verdict returned by the Judge after evaluating agent output against a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Output satisfies the goal's success criteria.
    Accept { confidence: f64 },
    /// Output falls short; retry with a corrective hint.
    Retry { reason: String, hint: String },
    /// Judge cannot determine success; hand off to a human.
    Escalate { reason: String },
    /// No verdict yet, keep going (e.g. tool calls still pending).
    Continue,
}

/// Thinking level for extended thinking / reasoning tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    #[default]
    Off,
    Low,
    Medium,
    High,
}

impl ThinkingLevel {
    /// Budget tokens for Anthropic extended thinking.
    pub fn budget_tokens(&self) -> u32 {
        match self {
            Self::Off => 0,
            Self::Low => 4096,
            Self::Medium => 10240,
            Self::High => 32768,
        }
    }

    /// Reasoning effort string for OpenAI o-series models.
    pub fn reasoning_effort(&self) -> &str {
        match self {
            Self::Off => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}
