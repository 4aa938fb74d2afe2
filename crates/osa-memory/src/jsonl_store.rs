use std::io::Write as _;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tracing::{debug, warn};

use osa_core::error::{OsaError, Result};
use osa_core::traits::SessionStore;
use osa_core::types::{ChatMessage, SearchResult, SessionId};

use crate::store::SqliteStore;

/// Append-only JSONL-per-session store — the primary persistence backend
/// per §6 (`sessions/<id>/messages.jsonl`), fsynced on append so a crash
/// loses at most the write in flight. Crash recovery is just replay: on
/// `load_history` the file is read top to bottom and any trailing
/// unparseable line (a torn write) is skipped rather than failing the load.
///
/// An optional `SqliteStore` FTS5 index is kept alongside as a search
/// accelerator (§4.3's Open Question resolution — see `DESIGN.md`):
/// every appended message is also inserted there, but the JSONL files
/// remain the durable source of truth.
pub struct JsonlStore {
    root: PathBuf,
    fts: Option<SqliteStore>,
}

impl JsonlStore {
    /// `root` is the directory under which `<session_id>/messages.jsonl`
    /// files live (typically `<workspace>/sessions`).
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(OsaError::Io)?;
        Ok(Self { root: root.to_path_buf(), fts: None })
    }

    /// Attach a SQLite FTS5 accelerator at `fts_path` used for `search()`.
    pub fn with_fts_index(mut self, fts_path: &Path) -> Result<Self> {
        self.fts = Some(SqliteStore::open(fts_path)?);
        Ok(self)
    }

    fn session_path(&self, sid: &SessionId) -> PathBuf {
        self.root.join(&sid.0).join("messages.jsonl")
    }

    /// Replay a session's JSONL file into messages, tolerating a torn
    /// trailing write (the only kind of corruption an append-only fsynced
    /// file can suffer from a crash mid-append).
    fn replay(path: &Path) -> Result<Vec<ChatMessage>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path).map_err(OsaError::Io)?;
        let lines: Vec<&str> = content.lines().collect();
        let mut messages = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ChatMessage>(line) {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    if i == lines.len() - 1 {
                        warn!(path = %path.display(), error = %e, "Discarding torn trailing JSONL line on replay");
                    } else {
                        return Err(OsaError::Json(e));
                    }
                }
            }
        }
        Ok(messages)
    }
}

impl SessionStore for JsonlStore {
    fn append_messages(&self, sid: &SessionId, msgs: &[ChatMessage]) -> BoxFuture<'_, Result<()>> {
        let sid = sid.clone();
        let msgs: Vec<ChatMessage> = msgs.to_vec();
        Box::pin(async move {
            let path = self.session_path(&sid);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(OsaError::Io)?;
            }

            // Never persist transient scaffolding (e.g. memory-flush prompts).
            let durable: Vec<&ChatMessage> =
                msgs.iter().filter(|m| m.phase().is_none()).collect();

            if !durable.is_empty() {
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(OsaError::Io)?;
                for msg in &durable {
                    let line = serde_json::to_string(msg).map_err(OsaError::Json)?;
                    writeln!(file, "{}", line).map_err(OsaError::Io)?;
                }
                file.sync_all().map_err(OsaError::Io)?;
                debug!(session = %sid.0, count = durable.len(), "Appended messages to session JSONL");
            }

            if let Some(ref fts) = self.fts {
                let owned: Vec<ChatMessage> = durable.into_iter().cloned().collect();
                if let Err(e) = fts.append_messages(&sid, &owned).await {
                    warn!(error = %e, "FTS accelerator index update failed (non-fatal)");
                }
            }

            Ok(())
        })
    }

    fn load_history(&self, sid: &SessionId, limit: usize) -> BoxFuture<'_, Result<Vec<ChatMessage>>> {
        let path = self.session_path(sid);
        Box::pin(async move {
            let mut messages = Self::replay(&path)?;
            if messages.len() > limit {
                let drop = messages.len() - limit;
                messages.drain(0..drop);
            }
            Ok(messages)
        })
    }

    fn search(&self, query: &str, limit: usize) -> BoxFuture<'_, Result<Vec<SearchResult>>> {
        let query = query.to_string();
        Box::pin(async move {
            match &self.fts {
                Some(fts) => fts.search(&query, limit).await,
                None => Ok(Vec::new()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osa_core::types::ChatMessage;

    #[tokio::test]
    async fn test_append_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        let sid = SessionId::new();

        let msgs = vec![ChatMessage::user("hello"), ChatMessage::assistant_text("hi")];
        store.append_messages(&sid, &msgs).await.unwrap();

        let history = store.load_history(&sid, 100).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text(), "hello");
    }

    #[tokio::test]
    async fn test_memory_flush_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        let sid = SessionId::new();

        let flush = ChatMessage::user("flush this").with_phase("memory_flush");
        store.append_messages(&sid, &[flush]).await.unwrap();
        let history = store.load_history(&sid, 100).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_replay_skips_torn_trailing_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        let sid = SessionId::new();
        let path = store.session_path(&sid);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();

        let good = serde_json::to_string(&ChatMessage::user("hello")).unwrap();
        tokio::fs::write(&path, format!("{}\n{{\"role\":\"user\"", good)).await.unwrap();

        let history = store.load_history(&sid, 100).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_crash_recovery_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let sid = SessionId::new();
        {
            let store = JsonlStore::open(dir.path()).unwrap();
            store
                .append_messages(&sid, &[ChatMessage::user("first")])
                .await
                .unwrap();
        }
        // Simulate process restart: reopen against the same directory.
        let store2 = JsonlStore::open(dir.path()).unwrap();
        let history = store2.load_history(&sid, 100).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text(), "first");
    }
}
