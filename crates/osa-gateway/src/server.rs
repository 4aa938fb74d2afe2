use std::collections::HashMap;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use osa_agent::{
    AgentRuntime, ApprovalBroker, SessionManager, SwarmCoordinator, SwarmMailbox, WaveExecutor,
};
use osa_core::config::{AppConfig, GatewayConfig};
use osa_core::event::EventBus;
use osa_core::traits::{LlmClient, SessionStore};
use osa_memory::LongTermStore;
use osa_signal::SignalClassifier;
use osa_tools::ToolRegistry;

use crate::hmac_auth::{self, NonceCache};
use crate::routes;
use crate::routes_v1;
use crate::state::AppState;
use crate::static_files;

/// WebSocket + HTTP gateway server built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    app_config: AppConfig,
    runtime: Arc<AgentRuntime>,
    event_bus: Arc<EventBus>,
    store: Arc<dyn SessionStore>,
    session_mgr: Arc<SessionManager>,
    broker: Arc<ApprovalBroker>,
    llm: Arc<dyn LlmClient>,
    tools: Arc<RwLock<ToolRegistry>>,
    classifier: Arc<SignalClassifier>,
    long_term: Option<Arc<LongTermStore>>,
}

impl GatewayServer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: GatewayConfig,
        app_config: AppConfig,
        runtime: Arc<AgentRuntime>,
        event_bus: Arc<EventBus>,
        store: Arc<dyn SessionStore>,
        session_mgr: Arc<SessionManager>,
        broker: Arc<ApprovalBroker>,
        llm: Arc<dyn LlmClient>,
        tools: Arc<RwLock<ToolRegistry>>,
        classifier: Arc<SignalClassifier>,
        long_term: Option<Arc<LongTermStore>>,
    ) -> Self {
        Self {
            config,
            app_config,
            runtime,
            event_bus,
            store,
            session_mgr,
            broker,
            llm,
            tools,
            classifier,
            long_term,
        }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let default_policy = self.app_config.security.to_policy();
        let mailbox = Arc::new(SwarmMailbox::new());

        let make_builder = || osa_agent::OrchestratorBuilder {
            config: self.app_config.clone(),
            llm: self.llm.clone(),
            tools: self.tools.clone(),
            store: self.store.clone(),
            event_bus: self.event_bus.clone(),
            broker: self.broker.clone(),
        };
        let wave_executor = WaveExecutor::new(make_builder(), default_policy.clone());
        let swarm_coordinator =
            SwarmCoordinator::new(make_builder(), default_policy.clone(), mailbox.clone());

        let state = Arc::new(AppState {
            config: self.config.clone(),
            app_config: self.app_config.clone(),
            runtime: self.runtime.clone(),
            event_bus: self.event_bus.clone(),
            store: self.store.clone(),
            session_mgr: self.session_mgr.clone(),
            broker: self.broker.clone(),
            llm: self.llm.clone(),
            tools: self.tools.clone(),
            classifier: self.classifier.clone(),
            long_term: self.long_term.clone(),
            default_policy,
            wave_executor,
            swarm_coordinator,
            swarm_mailbox: mailbox,
            task_groups: RwLock::new(HashMap::new()),
            swarms: RwLock::new(HashMap::new()),
            nonces: NonceCache::new(),
        });

        let v1 = Router::new()
            .route("/orchestrate", post(routes_v1::orchestrate))
            .route("/classify", post(routes_v1::classify))
            .route("/orchestrate/complex", post(routes_v1::orchestrate_complex))
            .route(
                "/orchestrate/{task_id}/progress",
                get(routes_v1::orchestrate_progress),
            )
            .route("/swarm/launch", post(routes_v1::swarm_launch))
            .route("/swarm", get(routes_v1::swarm_list))
            .route(
                "/swarm/{id}",
                get(routes_v1::swarm_get).delete(routes_v1::swarm_cancel),
            )
            .route("/tools/{name}/execute", post(routes_v1::tool_execute))
            .route("/sessions", get(routes_v1::sessions_list))
            .route("/sessions/{id}", get(routes_v1::sessions_get))
            .route("/sessions/{id}/messages", get(routes_v1::sessions_messages))
            .route("/stream/{session_id}", get(routes_v1::stream))
            .route("/commands", get(routes_v1::commands_list))
            .route("/commands/execute", post(routes_v1::commands_execute))
            .route("/memory", post(routes_v1::memory_write))
            .route("/memory/recall", get(routes_v1::memory_recall))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                hmac_auth::require_signed_request,
            ));

        let app = Router::new()
            // WebSocket
            .route("/ws", get(routes::ws_handler))
            // Legacy REST API
            .route("/api/health", get(routes::health))
            .route("/api/sessions", get(routes::list_sessions))
            .route("/api/sessions/{id}/history", get(routes::session_history))
            .route("/api/sessions/{id}/messages", post(routes::send_message))
            // Webhooks
            .route("/api/hooks/wake", post(routes::webhook_wake))
            // Public v1 API surface, HMAC-signed
            .route("/health", get(routes_v1::health))
            .nest("/api/v1", v1)
            // Embedded Web UI
            .route("/", get(static_files::index))
            .route("/assets/{*path}", get(static_files::static_file))
            .layer(CorsLayer::permissive())
            .with_state(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
