//! Heuristic token estimation used wherever an exact tokenizer sidecar is
//! unavailable. `osa-agent`'s Compactor prefers the tiktoken-backed exact
//! count when a tokenizer sidecar is `ready`; this heuristic is the §4.4
//! fallback and is also what `ChatMessage` constructors use so that
//! `token_count` is always populated even outside the agent crate.

/// `ceil(0.75 * word_count + 0.25 * punct_count)`.
pub fn estimate_tokens(text: &str) -> u64 {
    let word_count = text.split_whitespace().count() as f64;
    let punct_count = text
        .chars()
        .filter(|c| c.is_ascii_punctuation())
        .count() as f64;
    (0.75 * word_count + 0.25 * punct_count).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn counts_words_and_punctuation() {
        let n = estimate_tokens("Hello, world!");
        assert!(n >= 2);
    }
}
