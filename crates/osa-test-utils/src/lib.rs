//! Mocks and fixtures shared across Osa crates' test suites: a scripted
//! `LlmClient`, an in-memory `SessionStore`, and config/session builders.

mod fixtures;
mod mock_llm;
mod mock_store;

pub use fixtures::{test_app_config, test_model_config, test_session_id, temp_workspace};
pub use mock_llm::{FailingLlmClient, ScriptedLlmClient};
pub use mock_store::InMemoryStore;
