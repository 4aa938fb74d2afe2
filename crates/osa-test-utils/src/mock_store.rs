//! An in-memory `SessionStore` for tests that don't need SQLite/FTS5.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::future::BoxFuture;

use osa_core::error::Result;
use osa_core::traits::SessionStore;
use osa_core::types::{ChatMessage, ContentBlock, Role, SearchResult, SessionId};

/// Keeps every appended message per session in a `Vec`, in order. Search
/// is a naive substring scan over text content blocks, case-insensitive,
/// ranked by most-recent-first — good enough to assert "was this
/// recorded", not a stand-in for the FTS5-backed store.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages recorded for `sid`, for direct assertions without
    /// going through the trait's `limit`-bounded `load_history`.
    pub fn all_messages(&self, sid: &SessionId) -> Vec<ChatMessage> {
        self.sessions
            .lock()
            .expect("session store mutex poisoned")
            .get(&sid.0)
            .cloned()
            .unwrap_or_default()
    }
}

impl SessionStore for InMemoryStore {
    fn append_messages(&self, sid: &SessionId, msgs: &[ChatMessage]) -> BoxFuture<'_, Result<()>> {
        let sid = sid.0.clone();
        let msgs = msgs.to_vec();
        Box::pin(async move {
            self.sessions
                .lock()
                .expect("session store mutex poisoned")
                .entry(sid)
                .or_default()
                .extend(msgs);
            Ok(())
        })
    }

    fn load_history(&self, sid: &SessionId, limit: usize) -> BoxFuture<'_, Result<Vec<ChatMessage>>> {
        let sid = sid.0.clone();
        Box::pin(async move {
            let sessions = self.sessions.lock().expect("session store mutex poisoned");
            let history = sessions.get(&sid).cloned().unwrap_or_default();
            let start = history.len().saturating_sub(limit);
            Ok(history[start..].to_vec())
        })
    }

    fn search(&self, query: &str, limit: usize) -> BoxFuture<'_, Result<Vec<SearchResult>>> {
        let query = query.to_lowercase();
        Box::pin(async move {
            let sessions = self.sessions.lock().expect("session store mutex poisoned");
            let mut hits: Vec<SearchResult> = Vec::new();
            for (sid, msgs) in sessions.iter() {
                for msg in msgs.iter().rev() {
                    for block in &msg.content {
                        if let ContentBlock::Text { text } = block {
                            if text.to_lowercase().contains(&query) {
                                hits.push(SearchResult {
                                    session_id: sid.clone(),
                                    role: role_label(&msg.role).to_string(),
                                    content: text.clone(),
                                    timestamp: msg.timestamp.unwrap_or_default(),
                                    rank: 1.0,
                                });
                            }
                        }
                    }
                }
            }
            hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            hits.truncate(limit);
            Ok(hits)
        })
    }
}

fn role_label(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_and_loads_in_order() {
        let store = InMemoryStore::new();
        let sid = SessionId::from_str("s1");
        store
            .append_messages(&sid, &[ChatMessage::user("first"), ChatMessage::assistant_text("second")])
            .await
            .unwrap();

        let history = store.load_history(&sid, 10).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn load_history_respects_limit() {
        let store = InMemoryStore::new();
        let sid = SessionId::from_str("s1");
        for i in 0..5 {
            store.append_messages(&sid, &[ChatMessage::user(format!("msg {i}"))]).await.unwrap();
        }
        let history = store.load_history(&sid, 2).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn search_finds_substring_case_insensitively() {
        let store = InMemoryStore::new();
        let sid = SessionId::from_str("s1");
        store.append_messages(&sid, &[ChatMessage::user("deploy the Widget service")]).await.unwrap();

        let hits = store.search("widget", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].session_id, "s1");
    }
}
