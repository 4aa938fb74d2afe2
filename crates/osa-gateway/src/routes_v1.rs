//! The HMAC-signed `/api/v1` surface (§6): single-shot orchestration,
//! classification, multi-agent task groups, swarms, direct tool execution,
//! session/stream access, slash-command dispatch, and long-term memory.
//!
//! Every handler here sits behind [`crate::hmac_auth::require_signed_request`]
//! except `health`, mounted outside the `/api/v1` nest.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use osa_agent::{SwarmAgentResult, Task};
use osa_core::security::ApprovalDecision;
use osa_core::types::{MemoryCategory, SessionId, Signal, SignalFormat, TaskStatus};
use osa_signal::ClassificationInput;

use crate::state::{AppState, SwarmRun, TaskGroup};

// GET /health — unsigned, liveness only.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[derive(Deserialize)]
pub struct OrchestrateBody {
    pub input: String,
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct OrchestrateResponse {
    pub session_id: String,
    pub output: String,
    pub signal: Option<Signal>,
    pub tools_used: Vec<String>,
    pub iteration_count: u32,
    pub execution_ms: u64,
}

// POST /api/v1/orchestrate
pub async fn orchestrate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OrchestrateBody>,
) -> Result<Json<OrchestrateResponse>, StatusCode> {
    if body.input.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let session_id = match body.session_id {
        Some(s) => SessionId::from_string(&s),
        None => SessionId::new(),
    };

    let started = Instant::now();
    let input = ClassificationInput {
        channel: "http",
        message: &body.input,
        format: SignalFormat::Message,
        require_high_accuracy: false,
    };
    let outcome = state
        .classifier
        .classify(&input, state.llm.as_ref(), &state.app_config.model)
        .await;

    let output = match state.runtime.run(&session_id, &body.input).await {
        Ok(out) => out,
        Err(e) => return Ok(Json(OrchestrateResponse {
            session_id: session_id.to_string(),
            output: format!("error: {e}"),
            signal: Some(outcome.signal),
            tools_used: vec![],
            iteration_count: 0,
            execution_ms: started.elapsed().as_millis() as u64,
        })),
    };

    Ok(Json(OrchestrateResponse {
        session_id: session_id.to_string(),
        output,
        signal: Some(outcome.signal),
        tools_used: vec![],
        iteration_count: 1,
        execution_ms: started.elapsed().as_millis() as u64,
    }))
}

#[derive(Deserialize)]
pub struct ClassifyBody {
    pub message: String,
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "http".to_string()
}

// POST /api/v1/classify
pub async fn classify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClassifyBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if body.message.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let input = ClassificationInput {
        channel: &body.channel,
        message: &body.message,
        format: SignalFormat::Message,
        require_high_accuracy: false,
    };
    let outcome = state
        .classifier
        .classify(&input, state.llm.as_ref(), &state.app_config.model)
        .await;
    Ok(Json(serde_json::json!({
        "signal": outcome.signal,
        "from_cache": outcome.from_cache,
        "used_tier2": outcome.used_tier2,
        "dropped": outcome.dropped,
    })))
}

#[derive(Deserialize)]
pub struct OrchestrateComplexBody {
    pub task: String,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    pub session_id: Option<String>,
    #[serde(default)]
    pub blocking: bool,
}

fn default_strategy() -> String {
    "research_build_test_review".to_string()
}

/// Splits a `strategy` name into the role sequence it decomposes into.
/// Unknown strategies fall back to a single implementer pass.
fn strategy_roles(strategy: &str) -> Vec<&'static str> {
    match strategy {
        "research_build_test_review" => vec!["researcher", "implementer", "tester", "reviewer"],
        "build_test" => vec!["implementer", "tester"],
        "research_build" => vec!["researcher", "implementer"],
        _ => vec!["implementer"],
    }
}

// POST /api/v1/orchestrate/complex
pub async fn orchestrate_complex(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OrchestrateComplexBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if body.task.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let session_id = match &body.session_id {
        Some(s) => SessionId::from_string(s),
        None => SessionId::new(),
    };
    let task_group_id = Uuid::new_v4().to_string();

    let roles = strategy_roles(&body.strategy);
    let mut tasks: Vec<Task> = Vec::with_capacity(roles.len());
    let mut prev_id: Option<String> = None;
    for (i, role) in roles.iter().enumerate() {
        let id = format!("{task_group_id}-{i}");
        let mut t = Task::new(id.clone(), body.task.clone(), *role);
        if let Some(dep) = &prev_id {
            t = t.depends_on([dep.clone()]);
        }
        tasks.push(t);
        prev_id = Some(id);
    }

    if !body.blocking {
        state
            .task_groups
            .write()
            .await
            .insert(task_group_id.clone(), TaskGroup { tasks: tasks.clone() });
        let executor_state = state.clone();
        let group_id = task_group_id.clone();
        let sid = session_id.clone();
        tokio::spawn(async move {
            if let Ok(done) = executor_state
                .wave_executor
                .execute(&sid, &group_id, tasks)
                .await
            {
                if let Some(group) = executor_state.task_groups.write().await.get_mut(&group_id) {
                    group.tasks = done;
                }
            }
        });
        return Ok(Json(serde_json::json!({
            "task_id": task_group_id,
            "session_id": session_id.to_string(),
            "status": "running",
        })));
    }

    let done = state
        .wave_executor
        .execute(&session_id, &task_group_id, tasks)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    state
        .task_groups
        .write()
        .await
        .insert(task_group_id.clone(), TaskGroup { tasks: done.clone() });
    Ok(Json(serde_json::json!({
        "task_id": task_group_id,
        "session_id": session_id.to_string(),
        "status": "completed",
        "tasks": tasks_to_json(&done),
    })))
}

fn tasks_to_json(tasks: &[Task]) -> Vec<serde_json::Value> {
    tasks
        .iter()
        .map(|t| {
            serde_json::json!({
                "id": t.id,
                "description": t.description,
                "wave": t.wave,
                "agent_role": t.agent_role,
                "status": t.status,
                "result": t.result,
            })
        })
        .collect()
}

// GET /api/v1/orchestrate/:task_id/progress
pub async fn orchestrate_progress(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let groups = state.task_groups.read().await;
    let group = groups.get(&task_id).ok_or(StatusCode::NOT_FOUND)?;
    let total = group.tasks.len();
    let done = group
        .tasks
        .iter()
        .filter(|t| !matches!(t.status, TaskStatus::Pending | TaskStatus::Running))
        .count();
    Ok(Json(serde_json::json!({
        "task_id": task_id,
        "total": total,
        "completed": done,
        "tasks": tasks_to_json(&group.tasks),
    })))
}

#[derive(Deserialize)]
pub struct SwarmLaunchBody {
    pub task: String,
    pub pattern: String,
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    pub session_id: Option<String>,
}

fn default_max_agents() -> usize {
    3
}

const SWARM_ROLE_POOL: &[&str] = &["researcher", "implementer", "tester", "reviewer"];

// POST /api/v1/swarm/launch
pub async fn swarm_launch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SwarmLaunchBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if body.task.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let pattern = osa_agent::SwarmPattern::parse(&body.pattern).ok_or(StatusCode::BAD_REQUEST)?;
    let n = body.max_agents.clamp(1, SWARM_ROLE_POOL.len());
    let roles: Vec<String> = SWARM_ROLE_POOL[..n].iter().map(|s| s.to_string()).collect();

    let session_id = match &body.session_id {
        Some(s) => SessionId::from_string(s),
        None => SessionId::new(),
    };
    let swarm_id = Uuid::new_v4().to_string();

    state.swarms.write().await.insert(
        swarm_id.clone(),
        SwarmRun {
            swarm_id: swarm_id.clone(),
            pattern: pattern.as_str().to_string(),
            status: TaskStatus::Running,
            results: vec![],
        },
    );

    let task = body.task.clone();
    let run_state = state.clone();
    let run_swarm_id = swarm_id.clone();
    let run_session_id = session_id.clone();
    let run = async move {
        let results = run_state
            .swarm_coordinator
            .launch(&run_session_id, &run_swarm_id, &task, pattern, roles)
            .await;
        let succeeded = results.iter().all(|r| r.succeeded);
        if let Some(entry) = run_state.swarms.write().await.get_mut(&run_swarm_id) {
            entry.status = if succeeded {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            };
            entry.results = results;
        }
    };

    match body.timeout_ms {
        Some(ms) => {
            tokio::spawn(async move {
                let _ = tokio::time::timeout(std::time::Duration::from_millis(ms), run).await;
            });
        }
        None => {
            tokio::spawn(run);
        }
    }

    Ok(Json(serde_json::json!({
        "swarm_id": swarm_id,
        "session_id": session_id.to_string(),
        "status": "running",
    })))
}

fn swarm_results_json(results: &[SwarmAgentResult]) -> Vec<serde_json::Value> {
    results
        .iter()
        .map(|r| {
            serde_json::json!({
                "agent_role": r.agent_role,
                "output": r.output,
                "succeeded": r.succeeded,
            })
        })
        .collect()
}

// GET /api/v1/swarm
pub async fn swarm_list(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let swarms = state.swarms.read().await;
    let list: Vec<serde_json::Value> = swarms
        .values()
        .map(|s| {
            serde_json::json!({
                "swarm_id": s.swarm_id,
                "pattern": s.pattern,
                "status": s.status,
            })
        })
        .collect();
    Json(serde_json::json!({ "swarms": list }))
}

// GET /api/v1/swarm/:id
pub async fn swarm_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let swarms = state.swarms.read().await;
    let run = swarms.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(serde_json::json!({
        "swarm_id": run.swarm_id,
        "pattern": run.pattern,
        "status": run.status,
        "results": swarm_results_json(&run.results),
    })))
}

// DELETE /api/v1/swarm/:id
// Best-effort: marks the run failed/cancelled in the registry. In-flight
// worker futures are not forcibly interrupted, matching WaveExecutor and
// SwarmCoordinator's lack of a cancellation hook.
pub async fn swarm_cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut swarms = state.swarms.write().await;
    let run = swarms.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    run.status = TaskStatus::Failed;
    Ok(Json(serde_json::json!({ "swarm_id": id, "status": "cancelled" })))
}

#[derive(Deserialize)]
pub struct ToolExecuteBody {
    pub input: serde_json::Value,
    pub session_id: Option<String>,
}

// POST /api/v1/tools/:name/execute
pub async fn tool_execute(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<ToolExecuteBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let session_id = match &body.session_id {
        Some(s) => SessionId::from_string(s),
        None => SessionId::new(),
    };
    let ctx = osa_core::types::ToolContext {
        session_id,
        working_dir: std::env::current_dir().unwrap_or_default(),
        store: Some(state.store.clone()),
        agent_spawner: None,
        sandbox_config: None,
        config_path: None,
    };
    let tools = state.tools.read().await;
    match tools.execute(&name, body.input, ctx).await {
        Ok(result) => Ok(Json(serde_json::json!({
            "content": result.content,
            "is_error": result.is_error,
        }))),
        Err(osa_core::error::OsaError::ToolNotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(e) => Ok(Json(serde_json::json!({ "content": e.to_string(), "is_error": true }))),
    }
}

// GET /api/v1/sessions
pub async fn sessions_list(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "sessions": state.session_mgr.list() }))
}

// GET /api/v1/sessions/:id
pub async fn sessions_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let session_id = SessionId::from_string(&id);
    let messages = state
        .store
        .load_history(&session_id, 1)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(serde_json::json!({
        "session_id": id,
        "message_count": messages.len(),
    })))
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

// GET /api/v1/sessions/:id/messages
pub async fn sessions_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<MessagesQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let session_id = SessionId::from_string(&id);
    let messages = state
        .store
        .load_history(&session_id, q.limit)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let msgs: Vec<serde_json::Value> = messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role,
                "text": m.text(),
                "timestamp": m.timestamp,
                "signal": m.signal,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "messages": msgs })))
}

// GET /api/v1/stream/:session_id — SSE. Forwards every AgentEvent whose
// session_id matches, named per event_name(), always carrying session_id.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let mut rx = state.event_bus.subscribe();
    let target = session_id.clone();

    let s = stream::unfold((rx, target), move |(mut rx, target)| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sid = event.session_id().map(|s| s.to_string());
                    if sid.as_deref() != Some(target.as_str()) {
                        continue;
                    }
                    let name = event.event_name();
                    let payload = serde_json::json!({
                        "session_id": target,
                        "event": name,
                    });
                    let ev = Event::default().event(name).data(payload.to_string());
                    return Some((Ok(ev), (rx, target)));
                }
                Err(_) => return None,
            }
        }
    });

    Sse::new(s).keep_alive(KeepAlive::default())
}

#[derive(Serialize)]
pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
}

const COMMANDS: &[CommandInfo] = &[
    CommandInfo { name: "status", description: "Show agent status (model, tools, MCP servers)" },
    CommandInfo { name: "usage", description: "Show session token usage" },
    CommandInfo { name: "tools", description: "List available tools" },
    CommandInfo { name: "security", description: "Show security policy and pending approvals" },
    CommandInfo { name: "approve", description: "Approve a pending tool call by request id prefix" },
    CommandInfo { name: "deny", description: "Deny a pending tool call by request id prefix" },
    CommandInfo { name: "help", description: "List available commands" },
];

// GET /api/v1/commands
pub async fn commands_list() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "commands": COMMANDS }))
}

#[derive(Deserialize)]
pub struct CommandExecuteBody {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

// POST /api/v1/commands/execute — JSON counterpart to the REPL's slash
// commands, for the subset that's meaningfully driven over HTTP.
pub async fn commands_execute(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CommandExecuteBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match body.command.as_str() {
        "status" => {
            let tool_list = state.tools.read().await.list().into_iter().map(String::from).collect::<Vec<_>>();
            Ok(Json(serde_json::json!({
                "model": state.app_config.model.model_id,
                "provider": state.app_config.model.provider,
                "tools": tool_list,
            })))
        }
        "tools" => {
            let tool_list = state.tools.read().await.list().into_iter().map(String::from).collect::<Vec<_>>();
            Ok(Json(serde_json::json!({ "tools": tool_list })))
        }
        "security" => {
            let sec = &state.app_config.security;
            let pending = state.broker.pending_requests().await;
            Ok(Json(serde_json::json!({
                "auto_approve_up_to": sec.auto_approve_up_to,
                "deny_above": sec.deny_above,
                "approval_timeout_secs": sec.approval_timeout_secs,
                "pending_approvals": pending.iter().map(|r| serde_json::json!({
                    "id": r.id,
                    "tool_name": r.tool_name,
                    "tier": r.tier.to_string(),
                    "input_summary": r.input_summary,
                })).collect::<Vec<_>>(),
            })))
        }
        "approve" | "deny" => {
            let prefix = body.args.first().ok_or(StatusCode::BAD_REQUEST)?;
            let full_id = state
                .broker
                .find_by_prefix(prefix)
                .await
                .ok_or(StatusCode::NOT_FOUND)?;
            let decision = if body.command == "approve" {
                ApprovalDecision::Approved
            } else {
                let reason = if body.args.len() > 1 {
                    body.args[1..].join(" ")
                } else {
                    "denied by user".to_string()
                };
                ApprovalDecision::Denied { reason }
            };
            let resolved = state.broker.respond(&full_id, decision).await;
            Ok(Json(serde_json::json!({ "request_id": full_id, "resolved": resolved })))
        }
        "help" => Ok(Json(serde_json::json!({ "commands": COMMANDS }))),
        other => {
            let _ = other;
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

#[derive(Deserialize)]
pub struct MemoryWriteBody {
    pub category: String,
    pub content: String,
    #[serde(default = "default_importance")]
    pub importance: f64,
}

fn default_importance() -> f64 {
    0.5
}

fn parse_category(raw: &str) -> Option<MemoryCategory> {
    MemoryCategory::all()
        .into_iter()
        .find(|c| serde_json::to_value(c).ok().and_then(|v| v.as_str().map(str::to_string)).as_deref() == Some(raw))
}

// POST /api/v1/memory
pub async fn memory_write(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MemoryWriteBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let category = parse_category(&body.category).ok_or(StatusCode::BAD_REQUEST)?;
    if body.content.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let long_term = state.long_term.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let id = long_term
        .write(category, &body.content, body.importance)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(serde_json::json!({ "id": id })))
}

#[derive(Deserialize)]
pub struct MemoryRecallQuery {
    pub query: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
}

fn default_max_tokens() -> u64 {
    2_000
}

// GET /api/v1/memory/recall?query=...&max_tokens=...
pub async fn memory_recall(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MemoryRecallQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let long_term = state.long_term.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let entries = long_term.recall(&q.query, q.max_tokens);
    let out: Vec<serde_json::Value> = entries
        .iter()
        .map(|e| {
            serde_json::json!({
                "id": e.id,
                "category": e.category,
                "content": e.content,
                "importance": e.importance,
                "created_at": e.created_at,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "entries": out })))
}
