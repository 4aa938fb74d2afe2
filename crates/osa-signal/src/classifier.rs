//! Orchestrates Tier 1 / Tier 2 classification, caching, and the noise
//! filter into the single entry point the gateway and agent loop call.

use std::sync::Arc;
use std::time::Duration;

use osa_core::config::ModelConfig;
use osa_core::traits::LlmClient;
use osa_core::types::{Signal, SignalFormat};

use crate::cache::SignalCache;
use crate::noise::NoiseFilter;
use crate::rules::classify_tier1;
use crate::tier2::classify_tier2;

/// Input to a classification request.
pub struct ClassificationInput<'a> {
    pub channel: &'a str,
    pub message: &'a str,
    pub format: SignalFormat,
    /// Force Tier 2 regardless of Tier 1 confidence, for channels that
    /// require high accuracy classification.
    pub require_high_accuracy: bool,
}

/// What the classifier decided, and whether the message should be
/// forwarded to the Agent Loop or dropped as noise.
#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub signal: Signal,
    pub from_cache: bool,
    pub used_tier2: bool,
    pub dropped: bool,
}

/// Two-tier classifier with an attached cache and noise filter.
pub struct SignalClassifier {
    cache: Arc<SignalCache>,
    noise_filter: NoiseFilter,
    tier2_timeout: Duration,
}

impl SignalClassifier {
    pub fn new(noise_threshold: f64) -> Self {
        Self {
            cache: Arc::new(SignalCache::new()),
            noise_filter: NoiseFilter::new(noise_threshold),
            tier2_timeout: Duration::from_millis(2_000),
        }
    }

    pub fn with_cache(noise_threshold: f64, cache: Arc<SignalCache>) -> Self {
        Self {
            cache,
            noise_filter: NoiseFilter::new(noise_threshold),
            tier2_timeout: Duration::from_millis(2_000),
        }
    }

    pub fn cache(&self) -> Arc<SignalCache> {
        self.cache.clone()
    }

    /// Classify without an LLM available — Tier 1 only, used when the
    /// channel requires no escalation path or no LLM client is wired up.
    pub fn classify_tier1_only(&self, input: &ClassificationInput<'_>) -> ClassificationOutcome {
        let key = SignalCache::key(input.channel, input.message);
        if let Some(signal) = self.cache.get(&key) {
            let dropped = self.noise_filter.should_drop(&signal, input.message);
            return ClassificationOutcome {
                signal,
                from_cache: true,
                used_tier2: false,
                dropped,
            };
        }

        let tier1 = classify_tier1(input.message, input.format);
        self.cache.put(key, tier1.signal.clone());
        let dropped = self.noise_filter.should_drop(&tier1.signal, input.message);
        ClassificationOutcome {
            signal: tier1.signal,
            from_cache: false,
            used_tier2: false,
            dropped,
        }
    }

    /// Full two-tier classification, escalating to the LLM when Tier 1 is
    /// uncertain or high accuracy is demanded. On any Tier 2 failure
    /// (timeout, stream error, JSON parse failure) the Tier 1 result is
    /// used instead.
    pub async fn classify(
        &self,
        input: &ClassificationInput<'_>,
        llm: &dyn LlmClient,
        model: &ModelConfig,
    ) -> ClassificationOutcome {
        let key = SignalCache::key(input.channel, input.message);
        if let Some(signal) = self.cache.get(&key) {
            let dropped = self.noise_filter.should_drop(&signal, input.message);
            return ClassificationOutcome {
                signal,
                from_cache: true,
                used_tier2: false,
                dropped,
            };
        }

        let tier1 = classify_tier1(input.message, input.format);
        let should_escalate = input.require_high_accuracy || tier1.in_uncertainty_band();

        let (signal, used_tier2) = if should_escalate {
            match classify_tier2(llm, model, input.message, input.format, self.tier2_timeout).await
            {
                Some(signal) => (signal, true),
                None => (tier1.signal, false),
            }
        } else {
            (tier1.signal, false)
        };

        self.cache.put(key, signal.clone());
        let dropped = self.noise_filter.should_drop(&signal, input.message);
        ClassificationOutcome {
            signal,
            from_cache: false,
            used_tier2,
            dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_idempotence_tier1_only() {
        let classifier = SignalClassifier::new(0.2);
        let input = ClassificationInput {
            channel: "cli",
            message: "run the tests",
            format: SignalFormat::Message,
            require_high_accuracy: false,
        };
        let first = classifier.classify_tier1_only(&input);
        let second = classifier.classify_tier1_only(&input);
        assert_eq!(first.signal, second.signal);
        assert!(!first.from_cache);
        assert!(second.from_cache);
    }

    #[test]
    fn noise_dropped_for_greeting() {
        let classifier = SignalClassifier::new(0.2);
        let input = ClassificationInput {
            channel: "cli",
            message: "hey",
            format: SignalFormat::Message,
            require_high_accuracy: false,
        };
        let outcome = classifier.classify_tier1_only(&input);
        assert!(outcome.dropped);
    }
}
