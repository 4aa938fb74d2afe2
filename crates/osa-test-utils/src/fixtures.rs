//! Small builders for config/session objects that every agent-loop test
//! needs but shouldn't have to hand-assemble.

use osa_core::config::{AppConfig, ModelConfig};
use osa_core::types::SessionId;

/// A `ModelConfig` with sane test defaults: no API key, small token
/// budget so context-pressure paths are reachable without huge fixtures.
pub fn test_model_config() -> ModelConfig {
    ModelConfig {
        provider: "anthropic".to_string(),
        model_id: "test-model".to_string(),
        api_key: None,
        base_url: None,
        max_tokens: 4096,
        temperature: 0.0,
        thinking: Default::default(),
        retry: None,
    }
}

/// A deterministic session id, distinct from `SessionId::new()`'s random
/// UUID, so assertions can hardcode the expected value.
pub fn test_session_id() -> SessionId {
    SessionId::from_str("test-session")
}

/// A temp directory for tests that need a real working directory (tool
/// execution, sandbox checks). Dropped (and deleted) at the end of scope.
pub fn temp_workspace() -> tempfile::TempDir {
    tempfile::tempdir().expect("failed to create temp workspace")
}

/// A minimal `AppConfig` (test model, every optional section left unset)
/// plus whatever overrides the caller needs, applied via the closure so
/// call sites stay terse.
pub fn test_app_config(configure: impl FnOnce(&mut AppConfig)) -> AppConfig {
    let mut config = AppConfig {
        agent: Default::default(),
        model: test_model_config(),
        fallback_models: Vec::new(),
        gateway: None,
        channels: Default::default(),
        mcp: None,
        hooks: None,
        wizard: None,
        cron: None,
        heartbeat: None,
        web_search: None,
        security: Default::default(),
        embedding: None,
        budget: Default::default(),
    };
    configure(&mut config);
    config
}
