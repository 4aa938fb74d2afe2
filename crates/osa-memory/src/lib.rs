//! Memory subsystem: session history, long-term facts, and episodic
//! learning records (§4.3).
//!
//! Three stores, three lifetimes:
//! - [`JsonlStore`] — per-session append-only JSONL, the durable source of
//!   truth for conversation history, optionally backed by a [`SqliteStore`]
//!   FTS5 accelerator for `search()`.
//! - [`LongTermStore`] — the cross-session `MEMORY.md` document plus its
//!   [`InvertedIndex`], surviving session boundaries.
//! - [`EpisodeWriter`] — a flat append log of tool invocations for the
//!   learning subsystem, rotated daily.

mod embeddings;
mod episodes;
mod index;
mod jsonl_store;
mod longterm;
mod store;

pub use embeddings::{cosine_similarity, EmbeddingProvider, HttpEmbeddingProvider};
pub use episodes::EpisodeWriter;
pub use index::{extract_keywords, heuristic_tokens, recall_relevant, InvertedIndex, STOP_WORDS};
pub use jsonl_store::JsonlStore;
pub use longterm::LongTermStore;
pub use store::SqliteStore;
