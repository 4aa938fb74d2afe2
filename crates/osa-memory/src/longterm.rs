//! Long-term memory store: a single human-readable `MEMORY.md` document
//! partitioned into category sections (§4.3), plus the inverted index kept
//! in sync with it.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use osa_core::error::{OsaError, Result};
use osa_core::types::{MemoryCategory, MemoryEntry};

use crate::index::{extract_keywords, InvertedIndex};

/// Jaccard keyword-overlap threshold above which two entries in the same
/// category are coalesced by background compaction.
const COMPACTION_OVERLAP_THRESHOLD: f64 = 0.8;

struct Inner {
    entries: HashMap<String, MemoryEntry>,
    index: InvertedIndex,
}

/// `MEMORY.md`-backed long-term store. Reads rebuild the index at boot;
/// writes append under the entry's category section and update the index
/// incrementally.
pub struct LongTermStore {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl LongTermStore {
    /// Open (or create) `MEMORY.md` at `path`, parsing existing sections
    /// and rebuilding the inverted index from them.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(OsaError::Io)?;
            parse_memory_md(&content)
        } else {
            Vec::new()
        };

        let index = InvertedIndex::rebuild(&entries);
        let entries_map: HashMap<String, MemoryEntry> =
            entries.into_iter().map(|e| (e.id.clone(), e)).collect();

        info!(path = %path.display(), count = entries_map.len(), "Loaded long-term memory store");

        Ok(Self {
            path: path.to_path_buf(),
            inner: RwLock::new(Inner { entries: entries_map, index }),
        })
    }

    /// Append a new entry under its category, persist, and index it.
    pub fn write(&self, category: MemoryCategory, content: &str, importance: f64) -> Result<String> {
        let entry = MemoryEntry {
            id: Uuid::new_v4().to_string(),
            category,
            content: content.to_string(),
            keywords: extract_keywords(content).into_iter().collect::<BTreeSet<_>>(),
            importance: importance.clamp(0.0, 1.0),
            created_at: Utc::now(),
        };

        let id = entry.id.clone();
        {
            let mut inner = self.inner.write().map_err(|_| OsaError::Database("lock poisoned".into()))?;
            inner.index.index_entry(&entry);
            inner.entries.insert(entry.id.clone(), entry);
        }
        self.persist()?;
        debug!(category = ?category, id = %id, "Wrote long-term memory entry");
        Ok(id)
    }

    pub fn entries(&self) -> Vec<MemoryEntry> {
        self.inner
            .read()
            .map(|i| i.entries.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entries_by_category(&self, category: MemoryCategory) -> Vec<MemoryEntry> {
        self.inner
            .read()
            .map(|i| {
                i.entries
                    .values()
                    .filter(|e| e.category == category)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn recall(&self, query: &str, max_tokens: u64) -> Vec<MemoryEntry> {
        let inner = match self.inner.read() {
            Ok(g) => g,
            Err(_) => return Vec::new(),
        };
        crate::index::recall_relevant(&inner.index, &inner.entries, query, max_tokens)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Coalesce entries within the same category whose keyword-set Jaccard
    /// overlap is >= 0.8: the newer entry's content replaces the older, and
    /// importances are merged by max. Returns the number of entries removed.
    pub fn compact(&self) -> Result<usize> {
        let mut removed = 0usize;
        {
            let mut inner = self.inner.write().map_err(|_| OsaError::Database("lock poisoned".into()))?;
            for category in MemoryCategory::all() {
                loop {
                    let mut ids: Vec<String> = inner
                        .entries
                        .values()
                        .filter(|e| e.category == category)
                        .map(|e| e.id.clone())
                        .collect();
                    ids.sort();

                    let mut merged_pair = None;
                    'outer: for i in 0..ids.len() {
                        for j in (i + 1)..ids.len() {
                            let a = &inner.entries[&ids[i]];
                            let b = &inner.entries[&ids[j]];
                            if keyword_overlap(&a.keywords, &b.keywords) >= COMPACTION_OVERLAP_THRESHOLD {
                                merged_pair = Some((ids[i].clone(), ids[j].clone()));
                                break 'outer;
                            }
                        }
                    }

                    match merged_pair {
                        Some((keep_id, drop_id)) => {
                            let dropped = inner.entries.remove(&drop_id).unwrap();
                            if let Some(keep) = inner.entries.get_mut(&keep_id) {
                                keep.importance = keep.importance.max(dropped.importance);
                                if dropped.created_at > keep.created_at {
                                    keep.content = dropped.content;
                                    keep.created_at = dropped.created_at;
                                }
                            }
                            inner.index.remove_entry(&drop_id);
                            removed += 1;
                        }
                        None => break,
                    }
                }
            }
        }
        if removed > 0 {
            self.persist()?;
            info!(removed, "Compacted long-term memory store");
        }
        Ok(removed)
    }

    fn persist(&self) -> Result<()> {
        let inner = self.inner.read().map_err(|_| OsaError::Database("lock poisoned".into()))?;
        let rendered = render_memory_md(&inner.entries);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(OsaError::Io)?;
        }
        std::fs::write(&self.path, rendered).map_err(OsaError::Io)
    }
}

fn keyword_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count().max(1) as f64;
    intersection / union
}

fn render_memory_md(entries: &HashMap<String, MemoryEntry>) -> String {
    let mut out = String::from("# Agent Memory\n");
    for category in MemoryCategory::all() {
        let mut section: Vec<&MemoryEntry> = entries.values().filter(|e| e.category == category).collect();
        section.sort_by_key(|e| e.created_at);
        out.push_str(&format!("\n# {}\n", category.heading()));
        for entry in section {
            out.push_str(&format!(
                "\n<!-- id:{} importance:{:.2} created:{} -->\n{}\n",
                entry.id,
                entry.importance,
                entry.created_at.to_rfc3339(),
                entry.content.trim()
            ));
        }
    }
    out
}

/// Parse a `MEMORY.md` document back into entries, reading `<!-- id:...
/// importance:... created:... -->` metadata comments written by
/// `render_memory_md`. Sections with no metadata comment (hand-edited
/// content) are skipped rather than mis-parsed.
fn parse_memory_md(content: &str) -> Vec<MemoryEntry> {
    let mut entries = Vec::new();
    let mut current_category: Option<MemoryCategory> = None;
    let mut pending_meta: Option<(String, f64, chrono::DateTime<Utc>)> = None;
    let mut body = String::new();

    let flush = |entries: &mut Vec<MemoryEntry>,
                 category: Option<MemoryCategory>,
                 meta: &mut Option<(String, f64, chrono::DateTime<Utc>)>,
                 body: &mut String| {
        if let (Some(category), Some((id, importance, created_at))) = (category, meta.take()) {
            let trimmed = body.trim();
            if !trimmed.is_empty() {
                entries.push(MemoryEntry {
                    id,
                    category,
                    content: trimmed.to_string(),
                    keywords: extract_keywords(trimmed).into_iter().collect(),
                    importance,
                    created_at,
                });
            }
        }
        body.clear();
    };

    for line in content.lines() {
        if let Some(heading) = line.strip_prefix("# ") {
            flush(&mut entries, current_category, &mut pending_meta, &mut body);
            current_category = MemoryCategory::from_heading(heading.trim());
            continue;
        }
        if let Some(rest) = line.trim().strip_prefix("<!-- id:") {
            flush(&mut entries, current_category, &mut pending_meta, &mut body);
            if let Some(meta) = parse_meta_comment(rest) {
                pending_meta = Some(meta);
            }
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }
    flush(&mut entries, current_category, &mut pending_meta, &mut body);

    entries
}

fn parse_meta_comment(rest: &str) -> Option<(String, f64, chrono::DateTime<Utc>)> {
    // rest looks like: "abc-123 importance:0.50 created:2024-01-01T00:00:00Z -->"
    let rest = rest.trim_end_matches("-->").trim();
    let mut parts = rest.split_whitespace();
    let id = parts.next()?.to_string();
    let mut importance = 0.5;
    let mut created_at = Utc::now();
    for part in parts {
        if let Some(v) = part.strip_prefix("importance:") {
            importance = v.parse().unwrap_or(0.5);
        } else if let Some(v) = part.strip_prefix("created:") {
            created_at = chrono::DateTime::parse_from_rfc3339(v)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
        }
    }
    Some((id, importance, created_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MEMORY.md");
        let store = LongTermStore::open(&path).unwrap();
        store.write(MemoryCategory::Decision, "Use tokio for async runtime", 0.8).unwrap();

        let reopened = LongTermStore::open(&path).unwrap();
        let decisions = reopened.entries_by_category(MemoryCategory::Decision);
        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].content.contains("tokio"));
    }

    #[test]
    fn test_compact_coalesces_overlapping_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MEMORY.md");
        let store = LongTermStore::open(&path).unwrap();
        store
            .write(MemoryCategory::Pattern, "retry requests with exponential backoff jitter", 0.5)
            .unwrap();
        store
            .write(MemoryCategory::Pattern, "retry requests with exponential backoff and jitter delay", 0.6)
            .unwrap();

        let removed = store.compact().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.entries_by_category(MemoryCategory::Pattern).len(), 1);
    }

    #[test]
    fn test_recall_uses_written_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MEMORY.md");
        let store = LongTermStore::open(&path).unwrap();
        store.write(MemoryCategory::Fact, "the api rate limit is 100 requests per minute", 0.7).unwrap();

        let results = store.recall("api rate limit", 500);
        assert_eq!(results.len(), 1);
    }
}
