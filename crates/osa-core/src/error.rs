use thiserror::Error;

#[derive(Debug, Error)]
pub enum OsaError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    // Agent errors
    #[error("Agent exceeded max turns ({0})")]
    MaxTurnsExceeded(usize),

    #[error("Agent exceeded max duration ({0}s)")]
    MaxDurationExceeded(u64),

    #[error("Agent cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // Channel errors
    #[error("Channel error: {channel}: {message}")]
    Channel { channel: String, message: String },

    // Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    // Security errors
    #[error("Tool blocked by security policy: {tool} (tier {tier})")]
    ToolBlocked { tool: String, tier: String },

    #[error("Approval denied for tool {tool}: {reason}")]
    ApprovalDenied { tool: String, reason: String },

    #[error("Approval timeout for tool: {tool}")]
    ApprovalTimeout { tool: String },

    // MCP errors
    #[error("MCP error: {0}")]
    Mcp(String),

    // Context/compaction errors
    #[error("context overflow: critical tier alone exceeds budget of {budget} tokens")]
    ContextOverflow { budget: u64 },

    // Sidecar errors
    #[error("no sidecar provides capability: {0}")]
    NoSidecar(String),

    #[error("circuit open for sidecar {sidecar} (opened {elapsed_secs}s ago)")]
    CircuitOpen { sidecar: String, elapsed_secs: u64 },

    #[error("sidecar {sidecar} timed out after {timeout_secs}s")]
    SidecarTimeout { sidecar: String, timeout_secs: u64 },

    // Dispatcher/validation errors
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    // Hook pipeline errors
    #[error("blocked by hook {hook} on {event}: {reason}")]
    HookBlocked {
        event: String,
        hook: String,
        reason: String,
    },

    #[error("hook {hook} crashed on {event}: {message}")]
    HookCrash {
        event: String,
        hook: String,
        message: String,
    },

    // Budget errors
    #[error("budget exceeded: {scope} limit of ${limit_usd:.4} reached (spent ${spent_usd:.4})")]
    BudgetExceeded {
        scope: String,
        limit_usd: f64,
        spent_usd: f64,
    },

    // Orchestrator errors
    #[error("task graph contains a cycle")]
    CyclicTaskGraph,

    #[error("task {task} failed: upstream dependency {upstream} failed")]
    UpstreamFailure { task: String, upstream: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OsaError {
    /// Whether this error kind is user-visible per the error taxonomy (§7),
    /// as opposed to an internal condition that is only logged.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, OsaError::HookCrash { .. })
    }
}

pub type Result<T> = std::result::Result<T, OsaError>;
