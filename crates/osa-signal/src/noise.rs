//! Noise filter.
//!
//! A message is dropped — never reaching the Agent Loop, never costing an
//! LLM or tool call — iff its weight is below threshold AND it's a short
//! expressive/informational aside AND it isn't a command. Deterministic:
//! identical (channel, message) pairs yield the same verdict within a
//! cache TTL, since the decision is a pure function of the cached Signal.

use osa_core::types::{Signal, SignalFormat, SignalGenre};

const SHORT_MESSAGE_WORD_LIMIT: usize = 6;

/// Decides whether a classified message should be dropped before it ever
/// reaches the Agent Loop.
pub struct NoiseFilter {
    threshold: f64,
}

impl NoiseFilter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// `message` is needed only to measure length; the signal carries
    /// everything else the decision depends on.
    pub fn should_drop(&self, signal: &Signal, message: &str) -> bool {
        if signal.weight >= self.threshold {
            return false;
        }
        if matches!(signal.format, SignalFormat::Command) {
            return false;
        }
        let is_short = message.split_whitespace().count() <= SHORT_MESSAGE_WORD_LIMIT;
        matches!(signal.genre, SignalGenre::Express | SignalGenre::Inform) && is_short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osa_core::types::{SignalMode, SignalType};

    fn signal(weight: f64, genre: SignalGenre, format: SignalFormat) -> Signal {
        Signal {
            mode: SignalMode::Assist,
            genre,
            r#type: SignalType::General,
            format,
            weight,
        }
    }

    #[test]
    fn drops_low_weight_short_express() {
        let filter = NoiseFilter::new(0.2);
        let s = signal(0.1, SignalGenre::Express, SignalFormat::Message);
        assert!(filter.should_drop(&s, "lol thanks"));
    }

    #[test]
    fn keeps_command_even_if_low_weight() {
        let filter = NoiseFilter::new(0.2);
        let s = signal(0.1, SignalGenre::Express, SignalFormat::Command);
        assert!(!filter.should_drop(&s, "lol"));
    }

    #[test]
    fn keeps_high_weight_message() {
        let filter = NoiseFilter::new(0.2);
        let s = signal(0.5, SignalGenre::Express, SignalFormat::Message);
        assert!(!filter.should_drop(&s, "lol"));
    }

    #[test]
    fn keeps_long_low_weight_message() {
        let filter = NoiseFilter::new(0.2);
        let s = signal(0.1, SignalGenre::Inform, SignalFormat::Message);
        let long = "this is a much longer message that rambles on for a while about nothing in particular";
        assert!(!filter.should_drop(&s, long));
    }

    #[test]
    fn determinism_same_input_same_verdict() {
        let filter = NoiseFilter::new(0.2);
        let s = signal(0.05, SignalGenre::Express, SignalFormat::Message);
        assert_eq!(filter.should_drop(&s, "hey"), filter.should_drop(&s, "hey"));
    }
}
