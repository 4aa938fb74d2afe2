//! Multi-agent task DAG execution and the swarm mailbox (§4.8).
//!
//! Two things live here that the capability-routed [`crate::orchestrator`]
//! does not provide: a topologically-waved task executor (cycle rejection at
//! admission, `upstream_failure` propagation to dependents) and a per-swarm
//! ordered mailbox workers use to exchange peer context, plus the four swarm
//! patterns (parallel/pipeline/debate/review_loop) built on top of both.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use osa_core::error::{OsaError, Result};
use osa_core::security::SecurityPolicy;
use osa_core::types::{AgentEvent, SessionId, TaskStatus};

use crate::gate::SecurityGate;
use crate::orchestrator::OrchestratorBuilder;
use crate::AgentRuntime;

/// A single unit of work in a multi-agent task DAG (§3 `Task`).
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub dependencies: HashSet<String>,
    pub wave: u32,
    pub agent_role: String,
    pub status: TaskStatus,
    pub result: Option<String>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        agent_role: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            dependencies: HashSet::new(),
            wave: 0,
            agent_role: agent_role.into(),
            status: TaskStatus::Pending,
            result: None,
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }
}

/// Computes `wave(t) = 1 + max(wave(d) for d in deps(t))` for every task,
/// rejecting the whole admission if the dependency graph has a cycle or
/// references an unknown task id (§8 properties 4 and 5).
///
/// Returns the highest wave number assigned (0 if `tasks` is empty).
pub fn compute_waves(tasks: &mut [Task]) -> Result<u32> {
    let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    for t in tasks.iter() {
        for dep in &t.dependencies {
            if !ids.contains(dep.as_str()) {
                return Err(OsaError::Config(format!(
                    "task {} depends on unknown task {}",
                    t.id, dep
                )));
            }
        }
    }

    let by_id: HashMap<String, Task> =
        tasks.iter().cloned().map(|t| (t.id.clone(), t)).collect();
    let mut wave_of: HashMap<String, u32> = HashMap::new();
    let mut visiting: HashSet<String> = HashSet::new();

    fn resolve(
        id: &str,
        by_id: &HashMap<String, Task>,
        wave_of: &mut HashMap<String, u32>,
        visiting: &mut HashSet<String>,
    ) -> Result<u32> {
        if let Some(&w) = wave_of.get(id) {
            return Ok(w);
        }
        if !visiting.insert(id.to_string()) {
            return Err(OsaError::CyclicTaskGraph);
        }
        let task = &by_id[id];
        let mut wave = 1u32;
        for dep in &task.dependencies {
            let dep_wave = resolve(dep, by_id, wave_of, visiting)?;
            wave = wave.max(dep_wave + 1);
        }
        visiting.remove(id);
        wave_of.insert(id.to_string(), wave);
        Ok(wave)
    }

    for t in tasks.iter() {
        resolve(&t.id, &by_id, &mut wave_of, &mut visiting)?;
    }

    for t in tasks.iter_mut() {
        t.wave = wave_of[&t.id];
    }

    Ok(wave_of.values().copied().max().unwrap_or(0))
}

/// Runs a task DAG wave-by-wave: all tasks in a wave start concurrently and
/// the executor waits for every one to reach a terminal state before
/// advancing. A failed task marks its dependents `upstream_failure` without
/// ever executing them; independent tasks in the same later wave still run.
pub struct WaveExecutor {
    builder: OrchestratorBuilder,
    default_policy: SecurityPolicy,
}

impl WaveExecutor {
    pub fn new(builder: OrchestratorBuilder, default_policy: SecurityPolicy) -> Self {
        Self {
            builder,
            default_policy,
        }
    }

    /// Admit and execute a task list, stamping every emitted event with
    /// `session_id`. Returns the tasks with `status`/`result` filled in,
    /// ordered by wave then id.
    pub async fn execute(
        &self,
        session_id: &SessionId,
        task_group_id: &str,
        mut tasks: Vec<Task>,
    ) -> Result<Vec<Task>> {
        let max_wave = compute_waves(&mut tasks)?;
        let mut by_id: HashMap<String, Task> =
            tasks.into_iter().map(|t| (t.id.clone(), t)).collect();

        for wave in 1..=max_wave {
            let wave_task_ids: Vec<String> = by_id
                .values()
                .filter(|t| t.wave == wave)
                .map(|t| t.id.clone())
                .collect();
            if wave_task_ids.is_empty() {
                continue;
            }

            self.builder.event_bus.publish(AgentEvent::WaveStarted {
                session_id: session_id.clone(),
                task_group_id: task_group_id.to_string(),
                wave,
                task_ids: wave_task_ids.clone(),
            });

            let mut runnable = Vec::new();
            for id in &wave_task_ids {
                let failed_dep = by_id[id].dependencies.iter().find(|d| {
                    matches!(
                        by_id.get(d.as_str()).map(|t| &t.status),
                        Some(TaskStatus::Failed) | Some(TaskStatus::UpstreamFailure)
                    )
                });
                if let Some(dep) = failed_dep.cloned() {
                    let t = by_id.get_mut(id).unwrap();
                    t.status = TaskStatus::UpstreamFailure;
                    t.result = Some(format!("upstream dependency {dep} failed"));
                    self.builder.event_bus.publish(AgentEvent::TaskCompleted {
                        session_id: session_id.clone(),
                        task_id: id.clone(),
                        status: TaskStatus::UpstreamFailure,
                    });
                } else {
                    runnable.push(id.clone());
                }
            }

            let futs = runnable
                .iter()
                .map(|id| self.run_task(session_id, by_id[id].clone()));
            let results = futures::future::join_all(futs).await;

            for (id, (status, result)) in runnable.iter().zip(results) {
                let t = by_id.get_mut(id).unwrap();
                t.status = status.clone();
                t.result = Some(result);
                self.builder.event_bus.publish(AgentEvent::TaskCompleted {
                    session_id: session_id.clone(),
                    task_id: id.clone(),
                    status,
                });
            }
        }

        let mut out: Vec<Task> = by_id.into_values().collect();
        out.sort_by(|a, b| a.wave.cmp(&b.wave).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn run_task(&self, session_id: &SessionId, task: Task) -> (TaskStatus, String) {
        self.builder.event_bus.publish(AgentEvent::TaskStarted {
            session_id: session_id.clone(),
            task_id: task.id.clone(),
            agent_role: task.agent_role.clone(),
        });

        match self
            .run_role(session_id, &task.agent_role, &task.description)
            .await
        {
            Ok(output) => (TaskStatus::Completed, output),
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "orchestrator task failed");
                (TaskStatus::Failed, e.to_string())
            }
        }
    }

    async fn run_role(&self, session_id: &SessionId, role: &str, prompt: &str) -> Result<String> {
        let gate = Arc::new(SecurityGate::new(
            self.default_policy.clone(),
            self.builder.tools.clone(),
            self.builder.broker.clone(),
            self.builder.event_bus.clone(),
        ));

        let mut config = self.builder.config.clone();
        config.agent.system_prompt = Some(role_system_prompt(role));

        let runtime = AgentRuntime::new_with_gate(
            config,
            self.builder.llm.clone(),
            gate,
            self.builder.store.clone(),
            self.builder.event_bus.clone(),
        );

        runtime.run(session_id, prompt).await
    }
}

/// System prompt fragment for a role-specific worker agent (§4.8: researcher,
/// builder, tester, reviewer, coordinator, implementer, synthesizer).
fn role_system_prompt(role: &str) -> String {
    let blurb = match role {
        "researcher" => {
            "You are a researcher agent. Gather and summarize relevant facts; do not write code."
        }
        "builder" | "implementer" => {
            "You are an implementer agent. Write and modify code to satisfy the task."
        }
        "tester" => "You are a tester agent. Write and run tests, report pass/fail with evidence.",
        "reviewer" => {
            "You are a reviewer agent. Critique the given work for correctness and completeness; \
             do not modify it yourself."
        }
        "coordinator" => {
            "You are a coordinator agent. Break the task into sub-steps and track their status."
        }
        "synthesizer" => {
            "You are a synthesizer agent. Merge the peer agents' outputs into one coherent result."
        }
        other => return format!("You are an agent with the '{other}' role."),
    };
    blurb.to_string()
}

/// A single posted peer-context message in a swarm mailbox (§3 `SwarmMessage`).
#[derive(Debug, Clone)]
pub struct SwarmMessage {
    pub swarm_id: String,
    pub seq: u64,
    pub from_agent: String,
    pub message: String,
    pub posted_at: DateTime<Utc>,
}

struct MailboxInner {
    messages: Vec<SwarmMessage>,
    next_seq: AtomicU64,
}

/// Shared per-swarm ordered channel that worker agents use to exchange peer
/// context. `seq` is dense and starts at 1 (§8 property 6); the mailbox is
/// cleared when its swarm reaches a terminal state.
pub struct SwarmMailbox {
    boxes: RwLock<HashMap<String, MailboxInner>>,
}

impl SwarmMailbox {
    pub fn new() -> Self {
        Self {
            boxes: RwLock::new(HashMap::new()),
        }
    }

    /// Post a message, assigning the next monotonic `seq` for this swarm.
    pub async fn post(&self, swarm_id: &str, from_agent: &str, message: &str) -> u64 {
        let mut boxes = self.boxes.write().await;
        let inner = boxes.entry(swarm_id.to_string()).or_insert_with(|| MailboxInner {
            messages: Vec::new(),
            next_seq: AtomicU64::new(1),
        });
        let seq = inner.next_seq.fetch_add(1, Ordering::SeqCst);
        inner.messages.push(SwarmMessage {
            swarm_id: swarm_id.to_string(),
            seq,
            from_agent: from_agent.to_string(),
            message: message.to_string(),
            posted_at: Utc::now(),
        });
        seq
    }

    /// All messages for a swarm, in `seq` order.
    pub async fn read_all(&self, swarm_id: &str) -> Vec<SwarmMessage> {
        self.boxes
            .read()
            .await
            .get(swarm_id)
            .map(|b| b.messages.clone())
            .unwrap_or_default()
    }

    /// Render the mailbox as a peer-context section for injection into a
    /// worker's prompt.
    pub async fn build_context(&self, swarm_id: &str) -> String {
        let messages = self.read_all(swarm_id).await;
        if messages.is_empty() {
            return String::new();
        }
        let mut out = String::from("## Peer context\n\n");
        for m in &messages {
            out.push_str(&format!("[{}] {}: {}\n", m.seq, m.from_agent, m.message));
        }
        out
    }

    /// Clear a swarm's mailbox. Called when the swarm reaches a terminal
    /// state (§3 lifecycle).
    pub async fn clear(&self, swarm_id: &str) {
        self.boxes.write().await.remove(swarm_id);
    }
}

impl Default for SwarmMailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// One of the four swarm execution patterns (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwarmPattern {
    /// All workers run concurrently with no mid-execution mailbox reads; a
    /// synthesizer merges their outputs afterward.
    Parallel,
    /// Worker N reads the mailbox for worker N-1's output; strictly
    /// sequential.
    Pipeline,
    /// All workers propose in parallel; a critic worker evaluates the set.
    Debate,
    /// builder -> reviewer -> builder, up to K rounds, stopping early on
    /// reviewer approval.
    ReviewLoop,
}

impl SwarmPattern {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "parallel" => Some(Self::Parallel),
            "pipeline" => Some(Self::Pipeline),
            "debate" => Some(Self::Debate),
            "review_loop" => Some(Self::ReviewLoop),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Pipeline => "pipeline",
            Self::Debate => "debate",
            Self::ReviewLoop => "review_loop",
        }
    }
}

/// Outcome of a single worker's contribution to a swarm run.
#[derive(Debug, Clone)]
pub struct SwarmAgentResult {
    pub agent_role: String,
    pub output: String,
    pub succeeded: bool,
}

/// Coordinates a swarm run: spawns role-specific workers, wires them through
/// the mailbox according to the chosen pattern, and emits the
/// `swarm_*`/`agent_*` event sequence.
pub struct SwarmCoordinator {
    builder: OrchestratorBuilder,
    default_policy: SecurityPolicy,
    mailbox: Arc<SwarmMailbox>,
}

const REVIEW_LOOP_MAX_ROUNDS: usize = 3;

impl SwarmCoordinator {
    pub fn new(
        builder: OrchestratorBuilder,
        default_policy: SecurityPolicy,
        mailbox: Arc<SwarmMailbox>,
    ) -> Self {
        Self {
            builder,
            default_policy,
            mailbox,
        }
    }

    /// Launch a swarm for `task` using `pattern`, with one worker per entry
    /// in `roles`. Emits `swarm_started`, per-worker `agent_*` events, and
    /// `swarm_completed`/`swarm_failed`, then clears the mailbox.
    pub async fn launch(
        &self,
        session_id: &SessionId,
        swarm_id: &str,
        task: &str,
        pattern: SwarmPattern,
        roles: Vec<String>,
    ) -> Vec<SwarmAgentResult> {
        self.builder.event_bus.publish(AgentEvent::SwarmStarted {
            session_id: session_id.clone(),
            swarm_id: swarm_id.to_string(),
            pattern: pattern.as_str().to_string(),
            agent_count: roles.len(),
        });

        let results = match pattern {
            SwarmPattern::Parallel => self.run_parallel(session_id, swarm_id, task, &roles).await,
            SwarmPattern::Pipeline => self.run_pipeline(session_id, swarm_id, task, &roles).await,
            SwarmPattern::Debate => self.run_debate(session_id, swarm_id, task, &roles).await,
            SwarmPattern::ReviewLoop => self.run_review_loop(session_id, swarm_id, task).await,
        };

        if results.iter().all(|r| r.succeeded) {
            self.builder.event_bus.publish(AgentEvent::SwarmCompleted {
                session_id: session_id.clone(),
                swarm_id: swarm_id.to_string(),
            });
        } else {
            let failures: Vec<&str> = results
                .iter()
                .filter(|r| !r.succeeded)
                .map(|r| r.agent_role.as_str())
                .collect();
            self.builder.event_bus.publish(AgentEvent::SwarmFailed {
                session_id: session_id.clone(),
                swarm_id: swarm_id.to_string(),
                error: format!("workers failed: {}", failures.join(", ")),
            });
        }

        self.mailbox.clear(swarm_id).await;
        results
    }

    async fn run_worker(
        &self,
        session_id: &SessionId,
        swarm_id: &str,
        role: &str,
        prompt: &str,
    ) -> SwarmAgentResult {
        self.builder.event_bus.publish(AgentEvent::AgentStarted {
            session_id: session_id.clone(),
            swarm_id: swarm_id.to_string(),
            agent_role: role.to_string(),
        });

        let gate = Arc::new(SecurityGate::new(
            self.default_policy.clone(),
            self.builder.tools.clone(),
            self.builder.broker.clone(),
            self.builder.event_bus.clone(),
        ));
        let mut config = self.builder.config.clone();
        config.agent.system_prompt = Some(role_system_prompt(role));
        let runtime = AgentRuntime::new_with_gate(
            config,
            self.builder.llm.clone(),
            gate,
            self.builder.store.clone(),
            self.builder.event_bus.clone(),
        );

        let result = runtime.run(session_id, prompt).await;

        match result {
            Ok(output) => {
                self.builder.event_bus.publish(AgentEvent::AgentCompleted {
                    session_id: session_id.clone(),
                    swarm_id: swarm_id.to_string(),
                    agent_role: role.to_string(),
                });
                SwarmAgentResult {
                    agent_role: role.to_string(),
                    output,
                    succeeded: true,
                }
            }
            Err(e) => {
                self.builder.event_bus.publish(AgentEvent::AgentFailed {
                    session_id: session_id.clone(),
                    swarm_id: swarm_id.to_string(),
                    agent_role: role.to_string(),
                    error: e.to_string(),
                });
                SwarmAgentResult {
                    agent_role: role.to_string(),
                    output: e.to_string(),
                    succeeded: false,
                }
            }
        }
    }

    async fn run_parallel(
        &self,
        session_id: &SessionId,
        swarm_id: &str,
        task: &str,
        roles: &[String],
    ) -> Vec<SwarmAgentResult> {
        let futs = roles
            .iter()
            .map(|role| self.run_worker(session_id, swarm_id, role, task));
        let mut results = futures::future::join_all(futs).await;

        // A synthesizer merges the peer outputs once every worker has
        // finished; it reads the mailbox but none of the parallel workers do.
        for r in &results {
            self.mailbox.post(swarm_id, &r.agent_role, &r.output).await;
        }
        let context = self.mailbox.build_context(swarm_id).await;
        let synth_prompt = format!(
            "Task: {task}\n\n{context}\nSynthesize the above into one final answer."
        );
        let synth = self
            .run_worker(session_id, swarm_id, "synthesizer", &synth_prompt)
            .await;
        results.push(synth);
        results
    }

    async fn run_pipeline(
        &self,
        session_id: &SessionId,
        swarm_id: &str,
        task: &str,
        roles: &[String],
    ) -> Vec<SwarmAgentResult> {
        let mut results = Vec::with_capacity(roles.len());
        for role in roles {
            let context = self.mailbox.build_context(swarm_id).await;
            let prompt = if context.is_empty() {
                task.to_string()
            } else {
                format!("Task: {task}\n\n{context}\nContinue the pipeline from here.")
            };
            let result = self.run_worker(session_id, swarm_id, role, &prompt).await;
            self.mailbox
                .post(swarm_id, &result.agent_role, &result.output)
                .await;
            let failed = !result.succeeded;
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    async fn run_debate(
        &self,
        session_id: &SessionId,
        swarm_id: &str,
        task: &str,
        roles: &[String],
    ) -> Vec<SwarmAgentResult> {
        let futs = roles.iter().map(|role| {
            let prompt = format!("Task: {task}\n\nPropose your independent answer.");
            self.run_worker(session_id, swarm_id, role, &prompt)
        });
        let mut results = futures::future::join_all(futs).await;

        for r in &results {
            self.mailbox.post(swarm_id, &r.agent_role, &r.output).await;
        }
        let context = self.mailbox.build_context(swarm_id).await;
        let critic_prompt = format!(
            "Task: {task}\n\n{context}\nEvaluate the proposals above and pick or combine the best."
        );
        let critic = self
            .run_worker(session_id, swarm_id, "reviewer", &critic_prompt)
            .await;
        results.push(critic);
        results
    }

    async fn run_review_loop(
        &self,
        session_id: &SessionId,
        swarm_id: &str,
        task: &str,
    ) -> Vec<SwarmAgentResult> {
        let mut results = Vec::new();
        let mut current = task.to_string();

        for round in 0..REVIEW_LOOP_MAX_ROUNDS {
            let build_prompt = if round == 0 {
                current.clone()
            } else {
                let context = self.mailbox.build_context(swarm_id).await;
                format!("Task: {task}\n\n{context}\nAddress the reviewer's feedback above.")
            };
            let build = self
                .run_worker(session_id, swarm_id, "builder", &build_prompt)
                .await;
            self.mailbox
                .post(swarm_id, &build.agent_role, &build.output)
                .await;
            let build_failed = !build.succeeded;
            let build_output = build.output.clone();
            results.push(build);
            if build_failed {
                break;
            }

            let review_prompt = format!(
                "Task: {task}\n\nBuilder's latest output:\n---\n{build_output}\n---\n\n\
                 Review it. If it fully satisfies the task, begin your reply with \"APPROVED\"."
            );
            let review = self
                .run_worker(session_id, swarm_id, "reviewer", &review_prompt)
                .await;
            self.mailbox
                .post(swarm_id, &review.agent_role, &review.output)
                .await;
            let approved =
                review.succeeded && review.output.trim_start().to_uppercase().starts_with("APPROVED");
            results.push(review);

            if approved {
                break;
            }
            current = task.to_string();
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wave_computation_linear_chain() {
        let mut tasks = vec![
            Task::new("t1", "first", "builder"),
            Task::new("t2", "second", "builder").depends_on(["t1"]),
            Task::new("t3", "third", "builder").depends_on(["t2"]),
        ];
        let max_wave = compute_waves(&mut tasks).unwrap();
        assert_eq!(max_wave, 3);
        assert_eq!(tasks[0].wave, 1);
        assert_eq!(tasks[1].wave, 2);
        assert_eq!(tasks[2].wave, 3);
    }

    #[test]
    fn wave_computation_diamond() {
        // T1, T2 independent; T3 depends on both -> waves {1: [T1,T2], 2: [T3]}
        let mut tasks = vec![
            Task::new("t1", "a", "researcher"),
            Task::new("t2", "b", "researcher"),
            Task::new("t3", "c", "builder").depends_on(["t1", "t2"]),
        ];
        let max_wave = compute_waves(&mut tasks).unwrap();
        assert_eq!(max_wave, 2);
        let wave_of: HashMap<&str, u32> =
            tasks.iter().map(|t| (t.id.as_str(), t.wave)).collect();
        assert_eq!(wave_of["t1"], 1);
        assert_eq!(wave_of["t2"], 1);
        assert_eq!(wave_of["t3"], 2);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut tasks = vec![
            Task::new("t1", "a", "builder").depends_on(["t2"]),
            Task::new("t2", "b", "builder").depends_on(["t1"]),
        ];
        let err = compute_waves(&mut tasks).unwrap_err();
        assert!(matches!(err, OsaError::CyclicTaskGraph));
    }

    #[test]
    fn unknown_dependency_rejected() {
        let mut tasks = vec![Task::new("t1", "a", "builder").depends_on(["ghost"])];
        assert!(compute_waves(&mut tasks).is_err());
    }

    #[tokio::test]
    async fn mailbox_seq_is_dense_and_ordered() {
        let mailbox = SwarmMailbox::new();
        let s1 = mailbox.post("swarm-1", "researcher", "finding one").await;
        let s2 = mailbox.post("swarm-1", "builder", "built it").await;
        let s3 = mailbox.post("swarm-1", "reviewer", "looks good").await;
        assert_eq!((s1, s2, s3), (1, 2, 3));

        let messages = mailbox.read_all("swarm-1").await;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].seq, 1);
        assert_eq!(messages[2].seq, 3);
    }

    #[tokio::test]
    async fn mailbox_scoped_per_swarm() {
        let mailbox = SwarmMailbox::new();
        mailbox.post("swarm-a", "x", "hi").await;
        mailbox.post("swarm-b", "y", "hello").await;
        assert_eq!(mailbox.read_all("swarm-a").await.len(), 1);
        assert_eq!(mailbox.read_all("swarm-b").await.len(), 1);
    }

    #[tokio::test]
    async fn mailbox_clear_empties_swarm() {
        let mailbox = SwarmMailbox::new();
        mailbox.post("swarm-1", "x", "hi").await;
        mailbox.clear("swarm-1").await;
        assert!(mailbox.read_all("swarm-1").await.is_empty());
        // seq restarts at 1 for a fresh swarm after clearing.
        let seq = mailbox.post("swarm-1", "x", "hi again").await;
        assert_eq!(seq, 1);
    }

    #[tokio::test]
    async fn build_context_formats_peer_messages() {
        let mailbox = SwarmMailbox::new();
        mailbox.post("swarm-1", "researcher", "found X").await;
        let context = mailbox.build_context("swarm-1").await;
        assert!(context.contains("researcher"));
        assert!(context.contains("found X"));
    }

    #[test]
    fn swarm_pattern_parse_round_trips() {
        for s in ["parallel", "pipeline", "debate", "review_loop"] {
            let pattern = SwarmPattern::parse(s).unwrap();
            assert_eq!(pattern.as_str(), s);
        }
        assert!(SwarmPattern::parse("bogus").is_none());
    }
}
