use std::sync::Arc;

use tokio::sync::RwLock;

use osa_agent::{
    AgentRuntime, ApprovalBroker, OrchestratorBuilder, SessionManager, SwarmCoordinator,
    SwarmMailbox, Task, WaveExecutor,
};
use osa_core::config::GatewayConfig;
use osa_core::event::EventBus;
use osa_core::security::SecurityPolicy;
use osa_core::traits::{LlmClient, SessionStore};
use osa_core::types::TaskStatus;
use osa_memory::LongTermStore;
use osa_signal::SignalClassifier;
use osa_tools::ToolRegistry;

use crate::hmac_auth::NonceCache;

/// A single tracked `/api/v1/orchestrate/complex` run, polled via the
/// `:task_id/progress` endpoint.
pub struct TaskGroup {
    pub tasks: Vec<Task>,
}

/// A single tracked `/api/v1/swarm` run, polled/listed/cancelled via the
/// `swarm*` endpoints.
pub struct SwarmRun {
    pub swarm_id: String,
    pub pattern: String,
    pub status: TaskStatus,
    pub results: Vec<osa_agent::SwarmAgentResult>,
}

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub app_config: osa_core::config::AppConfig,
    pub runtime: Arc<AgentRuntime>,
    pub event_bus: Arc<EventBus>,
    pub store: Arc<dyn SessionStore>,
    pub session_mgr: Arc<SessionManager>,
    pub broker: Arc<ApprovalBroker>,
    pub llm: Arc<dyn LlmClient>,
    pub tools: Arc<RwLock<ToolRegistry>>,
    pub classifier: Arc<SignalClassifier>,
    pub long_term: Option<Arc<LongTermStore>>,
    pub default_policy: SecurityPolicy,
    pub wave_executor: WaveExecutor,
    pub swarm_coordinator: SwarmCoordinator,
    pub swarm_mailbox: Arc<SwarmMailbox>,
    pub task_groups: RwLock<std::collections::HashMap<String, TaskGroup>>,
    pub swarms: RwLock<std::collections::HashMap<String, SwarmRun>>,
    pub nonces: NonceCache,
}

impl AppState {
    pub fn orchestrator_builder(&self) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config: self.app_config.clone(),
            llm: self.llm.clone(),
            tools: self.tools.clone(),
            store: self.store.clone(),
            event_bus: self.event_bus.clone(),
            broker: self.broker.clone(),
        }
    }
}
