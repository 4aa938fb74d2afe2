//! Inverted keyword index over long-term `MEMORY.md` entries (§4.3) and the
//! token-estimation heuristic used when no tokenizer sidecar is available
//! (§4.4: `ceil(0.75*word_count + 0.25*punct_count)`).

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use osa_core::types::MemoryEntry;

/// ~150-term stop-word list filtered out of keyword extraction.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can't", "cannot", "could", "couldn't", "did", "didn't", "do", "does", "doesn't",
    "doing", "don't", "down", "during", "each", "few", "for", "from", "further", "had", "hadn't",
    "has", "hasn't", "have", "haven't", "having", "he", "he'd", "he'll", "he's", "her", "here",
    "here's", "hers", "herself", "him", "himself", "his", "how", "how's", "i", "i'd", "i'll",
    "i'm", "i've", "if", "in", "into", "is", "isn't", "it", "it's", "its", "itself", "let's",
    "me", "more", "most", "mustn't", "my", "myself", "no", "nor", "not", "of", "off", "on",
    "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over", "own",
    "same", "shan't", "she", "she'd", "she'll", "she's", "should", "shouldn't", "so", "some",
    "such", "than", "that", "that's", "the", "their", "theirs", "them", "themselves", "then",
    "there", "there's", "these", "they", "they'd", "they'll", "they're", "they've", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "wasn't", "we",
    "we'd", "we'll", "we're", "we've", "were", "weren't", "what", "what's", "when", "when's",
    "where", "where's", "which", "while", "who", "who's", "whom", "why", "why's", "with",
    "won't", "would", "wouldn't", "you", "you'd", "you'll", "you're", "you've", "your", "yours",
    "yourself", "yourselves", "just", "also", "get", "got", "like", "one", "two", "will",
];

fn stop_words() -> &'static HashSet<&'static str> {
    use std::sync::OnceLock;
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Lowercase, strip punctuation, split on whitespace, and drop stop words.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    let stop = stop_words();
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1 && !stop.contains(w.as_str()))
        .collect()
}

/// Heuristic token estimate used when no tokenizer sidecar is `ready`:
/// `ceil(0.75 * word_count + 0.25 * punct_count)`.
pub fn heuristic_tokens(text: &str) -> u64 {
    let word_count = text.split_whitespace().count() as f64;
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count() as f64;
    (0.75 * word_count + 0.25 * punct_count).ceil() as u64
}

/// `keyword -> set of entry ids`, rebuilt from `MEMORY.md` at boot and
/// updated incrementally on each write. Always a superset of the keywords
/// actually present in the long-term store (at-least-once indexing is
/// tolerated by the invariant; stale entries are harmless since lookups
/// join back against the live entry map).
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, HashSet<String>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from scratch given the full set of entries (boot-time).
    pub fn rebuild(entries: &[MemoryEntry]) -> Self {
        let mut idx = Self::new();
        for entry in entries {
            idx.index_entry(entry);
        }
        idx
    }

    /// Incrementally index one entry (on write).
    pub fn index_entry(&mut self, entry: &MemoryEntry) {
        for kw in &entry.keywords {
            self.postings
                .entry(kw.clone())
                .or_default()
                .insert(entry.id.clone());
        }
    }

    pub fn remove_entry(&mut self, entry_id: &str) {
        for ids in self.postings.values_mut() {
            ids.remove(entry_id);
        }
    }

    /// Candidate entry ids whose keyword set intersects the query's.
    pub fn candidates(&self, query_keywords: &HashSet<String>) -> HashSet<String> {
        let mut out = HashSet::new();
        for kw in query_keywords {
            if let Some(ids) = self.postings.get(kw) {
                out.extend(ids.iter().cloned());
            }
        }
        out
    }

    pub fn keyword_count(&self) -> usize {
        self.postings.len()
    }
}

/// Recency decay: 1.0 for entries created now, decaying over ~30 days to
/// a floor, modeling "still relevant but not fresh" rather than dropping
/// older entries to zero.
fn recency_decay(entry: &MemoryEntry) -> f64 {
    let age_days = (Utc::now() - entry.created_at).num_seconds().max(0) as f64 / 86_400.0;
    (-age_days / 30.0).exp().max(0.05)
}

fn jaccard(a: &HashSet<String>, b: &std::collections::BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let b_set: HashSet<&String> = b.iter().collect();
    let intersection = a.iter().filter(|k| b_set.contains(k)).count() as f64;
    let union = (a.len() + b.len()).max(1) as f64 - intersection;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// `recall_relevant(query, max_tokens)` — score is pinned exactly to
/// `0.5*keyword_overlap + 0.3*recency_decay + 0.2*importance` per the
/// scoring-weights Open Question resolution. Returns entries ranked
/// highest-first, truncated once `max_tokens` (content length heuristic)
/// would be exceeded.
pub fn recall_relevant<'a>(
    index: &InvertedIndex,
    entries: &'a HashMap<String, MemoryEntry>,
    query: &str,
    max_tokens: u64,
) -> Vec<&'a MemoryEntry> {
    let query_kw = extract_keywords(query);
    if query_kw.is_empty() {
        return Vec::new();
    }

    let candidate_ids = index.candidates(&query_kw);
    let mut scored: Vec<(f64, &MemoryEntry)> = candidate_ids
        .iter()
        .filter_map(|id| entries.get(id))
        .map(|entry| {
            let overlap = jaccard(&query_kw, &entry.keywords);
            let score = 0.5 * overlap + 0.3 * recency_decay(entry) + 0.2 * entry.importance;
            (score, entry)
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut out = Vec::new();
    let mut used_tokens = 0u64;
    for (_, entry) in scored {
        let cost = heuristic_tokens(&entry.content);
        if used_tokens + cost > max_tokens && !out.is_empty() {
            break;
        }
        used_tokens += cost;
        out.push(entry);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use osa_core::types::MemoryCategory;
    use std::collections::BTreeSet;

    fn entry(id: &str, content: &str, importance: f64) -> MemoryEntry {
        MemoryEntry {
            id: id.to_string(),
            category: MemoryCategory::Fact,
            content: content.to_string(),
            keywords: extract_keywords(content).into_iter().collect::<BTreeSet<_>>(),
            importance,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_extract_keywords_filters_stop_words() {
        let kws = extract_keywords("The quick brown fox jumps over the lazy dog");
        assert!(!kws.contains("the"));
        assert!(kws.contains("quick"));
        assert!(kws.contains("fox"));
    }

    #[test]
    fn test_heuristic_tokens_monotonic() {
        assert!(heuristic_tokens("one two three") > heuristic_tokens("one"));
    }

    #[test]
    fn test_index_superset_invariant() {
        let e1 = entry("1", "rust tokio async runtime", 0.5);
        let idx = InvertedIndex::rebuild(&[e1.clone()]);
        for kw in &e1.keywords {
            assert!(idx.keyword_count() > 0);
            assert!(idx.candidates(&[kw.clone()].into_iter().collect()).contains("1"));
        }
    }

    #[test]
    fn test_recall_relevant_ranks_by_score() {
        let e1 = entry("1", "rust tokio async runtime decisions", 0.9);
        let e2 = entry("2", "completely unrelated gardening topic", 0.1);
        let mut entries = HashMap::new();
        entries.insert(e1.id.clone(), e1.clone());
        entries.insert(e2.id.clone(), e2.clone());
        let idx = InvertedIndex::rebuild(&[e1, e2]);

        let results = recall_relevant(&idx, &entries, "rust async runtime", 10_000);
        assert_eq!(results.first().map(|e| e.id.as_str()), Some("1"));
    }

    #[test]
    fn test_recall_relevant_respects_token_budget() {
        let e1 = entry("1", "rust async keyword one", 0.5);
        let e2 = entry("2", "rust async keyword two", 0.5);
        let mut entries = HashMap::new();
        entries.insert(e1.id.clone(), e1.clone());
        entries.insert(e2.id.clone(), e2.clone());
        let idx = InvertedIndex::rebuild(&[e1, e2]);

        let results = recall_relevant(&idx, &entries, "rust async keyword", 1);
        assert_eq!(results.len(), 1);
    }
}
