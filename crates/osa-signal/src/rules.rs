//! Tier 1: deterministic lexical classification.
//!
//! Rule-based labeling from keyword sets, message length, punctuation, and
//! imperative-verb detection. Target latency is sub-millisecond — no I/O,
//! no allocation beyond what's needed to lowercase the input once.

use osa_core::types::{Signal, SignalFormat, SignalGenre, SignalMode, SignalType};

/// Tier 1 confidence values in this half-open band are too uncertain to
/// trust alone; the classifier escalates to Tier 2.
pub const UNCERTAINTY_BAND: (f64, f64) = (0.3, 0.6);

/// The provisional classification Tier 1 produces, plus its own confidence
/// in that verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Tier1Result {
    pub signal: Signal,
    pub confidence: f64,
}

impl Tier1Result {
    pub fn in_uncertainty_band(&self) -> bool {
        self.confidence >= UNCERTAINTY_BAND.0 && self.confidence < UNCERTAINTY_BAND.1
    }
}

const IMPERATIVE_VERBS: &[&str] = &[
    "run", "build", "create", "write", "fix", "add", "remove", "delete", "update",
    "deploy", "install", "configure", "refactor", "implement", "generate", "execute",
    "restart", "stop", "start", "revert", "rollback", "migrate", "analyze", "review",
];

const QUESTION_WORDS: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "which", "can", "could", "should",
    "would", "is", "are", "does", "do",
];

const DECISION_WORDS: &[&str] = &[
    "decide", "decision", "choose", "approve", "reject", "confirm", "vote",
];

const COMMIT_WORDS: &[&str] = &[
    "will", "commit", "promise", "plan to", "going to", "shall",
];

const EXPRESSIVE_WORDS: &[&str] = &[
    "thanks", "thank you", "lol", "haha", "nice", "great", "awesome", "ugh", "sorry",
    "wow", "hey", "hi", "hello", "cool",
];

const MAINTAIN_WORDS: &[&str] = &[
    "monitor", "health", "status", "check", "cleanup", "prune", "backup", "restore",
];

const BUILD_WORDS: &[&str] = &[
    "build", "create", "implement", "write", "generate", "scaffold", "design",
];

const ANALYZE_WORDS: &[&str] = &[
    "analyze", "investigate", "debug", "explain", "review", "compare", "audit",
];

const SCHEDULING_WORDS: &[&str] = &["schedule", "tomorrow", "remind", "calendar", "appointment"];
const SUMMARY_WORDS: &[&str] = &["summarize", "summary", "tl;dr", "recap"];
const REPORT_WORDS: &[&str] = &["report", "status update", "weekly", "metrics"];
const ISSUE_WORDS: &[&str] = &["bug", "broken", "error", "issue", "fails", "crash", "doesn't work"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Classify a message deterministically. `format` is derived separately from
/// channel metadata (never guessed lexically from the body), so the
/// caller supplies it.
pub fn classify_tier1(message: &str, format: SignalFormat) -> Tier1Result {
    let lower = message.to_lowercase();
    let trimmed = lower.trim();
    let word_count = trimmed.split_whitespace().count();
    let punct_count = message.chars().filter(|c| c.is_ascii_punctuation()).count();
    let has_question_mark = message.trim_end().ends_with('?');
    let is_short = word_count <= 4;

    let starts_imperative = trimmed
        .split_whitespace()
        .next()
        .map(|first| IMPERATIVE_VERBS.contains(&first))
        .unwrap_or(false);

    let mode = if contains_any(trimmed, BUILD_WORDS) {
        SignalMode::Build
    } else if contains_any(trimmed, ANALYZE_WORDS) {
        SignalMode::Analyze
    } else if contains_any(trimmed, MAINTAIN_WORDS) {
        SignalMode::Maintain
    } else if starts_imperative || matches!(format, SignalFormat::Command) {
        SignalMode::Execute
    } else {
        SignalMode::Assist
    };

    let genre = if contains_any(trimmed, DECISION_WORDS) {
        SignalGenre::Decide
    } else if contains_any(trimmed, COMMIT_WORDS) {
        SignalGenre::Commit
    } else if starts_imperative || matches!(format, SignalFormat::Command) {
        SignalGenre::Direct
    } else if contains_any(trimmed, EXPRESSIVE_WORDS) && is_short {
        SignalGenre::Express
    } else if has_question_mark {
        SignalGenre::Inform
    } else {
        SignalGenre::Inform
    };

    let r#type = if has_question_mark || contains_any(trimmed, QUESTION_WORDS) {
        SignalType::Question
    } else if contains_any(trimmed, ISSUE_WORDS) {
        SignalType::Issue
    } else if contains_any(trimmed, SCHEDULING_WORDS) {
        SignalType::Scheduling
    } else if contains_any(trimmed, SUMMARY_WORDS) {
        SignalType::Summary
    } else if contains_any(trimmed, REPORT_WORDS) {
        SignalType::Report
    } else if starts_imperative {
        SignalType::Request
    } else {
        SignalType::General
    };

    // Weight: a coarse proxy for "how much does this matter downstream".
    // Short expressive acknowledgments score low; imperative/command/question
    // messages score high. Clamped to [0, 1].
    let mut weight = 0.4;
    if starts_imperative {
        weight += 0.25;
    }
    if matches!(format, SignalFormat::Command) {
        weight += 0.25;
    }
    if has_question_mark {
        weight += 0.15;
    }
    if contains_any(trimmed, EXPRESSIVE_WORDS) && is_short {
        weight -= 0.35;
    }
    if is_short && !has_question_mark && !starts_imperative {
        weight -= 0.15;
    }
    if word_count > 30 {
        weight += 0.1;
    }
    weight = weight.clamp(0.0, 1.0);

    // Confidence: how sure Tier 1 is about its own verdict. Clear signals
    // (imperative verb, explicit question mark, short expressive) are high
    // confidence; everything else lands in the band that escalates to Tier 2.
    let confidence = if starts_imperative || matches!(format, SignalFormat::Command) {
        0.9
    } else if contains_any(trimmed, EXPRESSIVE_WORDS) && is_short {
        0.85
    } else if has_question_mark && word_count < 20 {
        0.75
    } else if word_count == 0 {
        0.95
    } else if punct_count == 0 && word_count > 15 {
        0.45
    } else {
        0.5
    };

    Tier1Result {
        signal: Signal {
            mode,
            genre,
            r#type,
            format,
            weight,
        },
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_greeting_is_express_low_weight() {
        let r = classify_tier1("hey", SignalFormat::Message);
        assert_eq!(r.signal.genre, SignalGenre::Express);
        assert!(r.signal.weight < 0.2, "weight was {}", r.signal.weight);
    }

    #[test]
    fn imperative_request_is_direct_high_confidence() {
        let r = classify_tier1("run the test suite and report back", SignalFormat::Message);
        assert_eq!(r.signal.genre, SignalGenre::Direct);
        assert!(r.confidence >= 0.6);
    }

    #[test]
    fn question_mark_sets_question_type() {
        let r = classify_tier1("why did the build fail?", SignalFormat::Message);
        assert_eq!(r.signal.r#type, SignalType::Question);
    }

    #[test]
    fn command_format_forces_execute_mode() {
        let r = classify_tier1("/deploy prod", SignalFormat::Command);
        assert_eq!(r.signal.mode, SignalMode::Execute);
        assert_eq!(r.signal.genre, SignalGenre::Direct);
    }

    #[test]
    fn ambiguous_long_plain_text_lands_in_uncertainty_band() {
        let r = classify_tier1(
            "so I was thinking about the overall direction of the project lately",
            SignalFormat::Message,
        );
        assert!(r.in_uncertainty_band(), "confidence was {}", r.confidence);
    }
}
