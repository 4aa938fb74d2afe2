//! A scripted `LlmClient` for deterministic agent-loop tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};

use osa_core::config::ModelConfig;
use osa_core::error::Result;
use osa_core::traits::LlmClient;
use osa_core::types::{ChatMessage, StopReason, StreamDelta, ToolDefinition};

/// Replays a fixed sequence of turns, one per call to `chat_stream`. Each
/// turn is a `Vec<StreamDelta>` streamed in order; calls past the end of
/// the script repeat the last turn so a test doesn't need to size the
/// script exactly to the number of loop iterations.
pub struct ScriptedLlmClient {
    turns: Vec<Vec<StreamDelta>>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlmClient {
    pub fn new(turns: Vec<Vec<StreamDelta>>) -> Self {
        assert!(!turns.is_empty(), "ScriptedLlmClient needs at least one turn");
        Self {
            turns,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A single-turn client that answers with one text block and stops.
    pub fn with_text_reply(text: impl Into<String>) -> Self {
        Self::new(vec![vec![
            StreamDelta::TextDelta(text.into()),
            StreamDelta::Stop(StopReason::EndTurn),
        ]])
    }

    /// A single-turn client that calls a tool once, then stops.
    pub fn with_tool_call(id: impl Into<String>, name: impl Into<String>, input_json: &str) -> Self {
        Self::new(vec![vec![
            StreamDelta::ToolUseStart {
                index: 0,
                id: id.into(),
                name: name.into(),
            },
            StreamDelta::ToolInputDelta {
                index: 0,
                delta: input_json.to_string(),
            },
            StreamDelta::Stop(StopReason::ToolUse),
        ]])
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The message history passed to each call, in order, for assertions
    /// about what the agent loop actually sent upstream.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().expect("requests mutex poisoned").clone()
    }
}

impl LlmClient for ScriptedLlmClient {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
        _tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        self.requests.lock().expect("requests mutex poisoned").push(messages);
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        let turn = self.turns[index.min(self.turns.len() - 1)].clone();
        Box::pin(async move {
            let items: Vec<Result<StreamDelta>> = turn.into_iter().map(Ok).collect();
            let s: BoxStream<'_, Result<StreamDelta>> = Box::pin(stream::iter(items));
            Ok(s)
        })
    }
}

/// An `LlmClient` whose every call returns an error, for exercising
/// upstream-failure paths.
pub struct FailingLlmClient {
    message: String,
}

impl FailingLlmClient {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl LlmClient for FailingLlmClient {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        _messages: Vec<ChatMessage>,
        _tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let message = self.message.clone();
        Box::pin(async move { Err(osa_core::error::OsaError::Gateway(message)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn replays_scripted_text_reply() {
        let client = ScriptedLlmClient::with_text_reply("hello");
        let config = ModelConfig {
            provider: "anthropic".into(),
            model_id: "test-model".into(),
            api_key: None,
            base_url: None,
            max_tokens: 1024,
            temperature: 0.0,
            thinking: Default::default(),
            retry: None,
        };
        let mut stream = client.chat_stream(&config, vec![ChatMessage::user("hi")], &[]).await.unwrap();
        let mut deltas = Vec::new();
        while let Some(d) = stream.next().await {
            deltas.push(d.unwrap());
        }
        assert_eq!(deltas.len(), 2);
        assert_eq!(client.call_count(), 1);
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn repeats_last_turn_past_script_end() {
        let client = ScriptedLlmClient::with_text_reply("done");
        let config = ModelConfig {
            provider: "anthropic".into(),
            model_id: "test-model".into(),
            api_key: None,
            base_url: None,
            max_tokens: 1024,
            temperature: 0.0,
            thinking: Default::default(),
            retry: None,
        };
        for _ in 0..3 {
            let _ = client.chat_stream(&config, vec![], &[]).await.unwrap();
        }
        assert_eq!(client.call_count(), 3);
    }
}
