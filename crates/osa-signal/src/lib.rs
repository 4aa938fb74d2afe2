//! Two-tier message classification and noise filtering.
//!
//! Tier 1 is a deterministic, sub-millisecond lexical classifier. Tier 2
//! falls back to an LLM only when Tier 1's confidence lands in the
//! uncertainty band, or when the caller demands high accuracy. Results are
//! cached by `sha256(channel || "\n" || message)` with a 10-minute TTL so
//! repeated inbound messages (retries, webhook replays) don't re-pay the
//! classification cost.

mod cache;
mod classifier;
mod noise;
mod rules;
mod tier2;

pub use cache::SignalCache;
pub use classifier::{ClassificationInput, ClassificationOutcome, SignalClassifier};
pub use noise::NoiseFilter;
pub use rules::{Tier1Result, UNCERTAINTY_BAND};
pub use tier2::classify_tier2;
