//! Episodic record of tool invocations, written for the learning subsystem
//! to mine later (§6 persisted-state layout:
//! `learning/episodes/YYYY-MM-DD-episodes.jsonl`).
//!
//! Wired as the `learning_sink` argument to `osa_hooks::builtins::register_all`
//! — every `post_tool_use` payload is appended verbatim, one JSON object per
//! line, rotated daily by wall-clock date.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::warn;

/// Appends hook payloads to `<root>/YYYY-MM-DD-episodes.jsonl`, one file
/// per UTC day. Writes are best-effort: a failure is logged, never
/// propagated, since episodic capture must never block tool dispatch.
pub struct EpisodeWriter {
    root: PathBuf,
    state: Mutex<()>,
}

impl EpisodeWriter {
    pub fn open(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self { root: root.to_path_buf(), state: Mutex::new(()) })
    }

    fn path_for_today(&self) -> PathBuf {
        let day = Utc::now().format("%Y-%m-%d");
        self.root.join(format!("{day}-episodes.jsonl"))
    }

    fn append(&self, payload: &serde_json::Value) {
        let _guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.path_for_today();
        let line = match serde_json::to_string(payload) {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "Failed to serialize episode payload");
                return;
            }
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to append episode record");
        }
    }

    /// Wrap this writer as a sink compatible with
    /// `osa_hooks::builtins::learning_capture`.
    pub fn sink(self: &Arc<Self>) -> Arc<dyn Fn(serde_json::Value) + Send + Sync> {
        let this = self.clone();
        Arc::new(move |payload| this.append(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_writes_jsonl_line() {
        let dir = tempfile::tempdir().unwrap();
        let writer = Arc::new(EpisodeWriter::open(dir.path()).unwrap());
        let sink = writer.sink();
        sink(json!({"tool": "bash", "is_error": false}));

        let path = writer.path_for_today();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("bash"));
    }

    #[test]
    fn test_append_multiple_lines_appends() {
        let dir = tempfile::tempdir().unwrap();
        let writer = Arc::new(EpisodeWriter::open(dir.path()).unwrap());
        let sink = writer.sink();
        sink(json!({"tool": "bash"}));
        sink(json!({"tool": "read_file"}));

        let content = std::fs::read_to_string(writer.path_for_today()).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
