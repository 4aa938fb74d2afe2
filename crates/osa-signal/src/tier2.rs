//! Tier 2: LLM-backed classification fallback.
//!
//! Invoked only when Tier 1 confidence lands in the uncertainty band, or
//! when the caller demands high accuracy. Prompts with a fixed instruction
//! template and parses a strict JSON response. `format` is never asked of
//! the LLM — it's derived from channel metadata and carried over from
//! Tier 1's result.

use futures::StreamExt;

use osa_core::config::ModelConfig;
use osa_core::traits::LlmClient;
use osa_core::types::{ChatMessage, Signal, SignalFormat, SignalGenre, SignalMode, SignalType, StreamDelta};

const INSTRUCTION_TEMPLATE: &str = r#"Classify the following message. Respond with ONLY a single-line JSON object, no prose, no markdown fences, matching exactly this shape:
{"mode":"EXECUTE|BUILD|ANALYZE|MAINTAIN|ASSIST","genre":"DIRECT|INFORM|COMMIT|DECIDE|EXPRESS","type":"question|request|issue|scheduling|summary|report|general","weight":0.0}

Message:
"#;

#[derive(Debug, serde::Deserialize)]
struct RawClassification {
    mode: String,
    genre: String,
    r#type: String,
    weight: f64,
}

fn parse_mode(s: &str) -> Option<SignalMode> {
    Some(match s.to_uppercase().as_str() {
        "EXECUTE" => SignalMode::Execute,
        "BUILD" => SignalMode::Build,
        "ANALYZE" => SignalMode::Analyze,
        "MAINTAIN" => SignalMode::Maintain,
        "ASSIST" => SignalMode::Assist,
        _ => return None,
    })
}

fn parse_genre(s: &str) -> Option<SignalGenre> {
    Some(match s.to_uppercase().as_str() {
        "DIRECT" => SignalGenre::Direct,
        "INFORM" => SignalGenre::Inform,
        "COMMIT" => SignalGenre::Commit,
        "DECIDE" => SignalGenre::Decide,
        "EXPRESS" => SignalGenre::Express,
        _ => return None,
    })
}

fn parse_type(s: &str) -> Option<SignalType> {
    Some(match s.to_lowercase().as_str() {
        "question" => SignalType::Question,
        "request" => SignalType::Request,
        "issue" => SignalType::Issue,
        "scheduling" => SignalType::Scheduling,
        "summary" => SignalType::Summary,
        "report" => SignalType::Report,
        "general" => SignalType::General,
        _ => return None,
    })
}

/// Strip a leading/trailing markdown code fence if present, since some
/// providers wrap JSON in ```json ... ``` despite instructions not to.
fn strip_fences(s: &str) -> &str {
    let s = s.trim();
    let s = s.strip_prefix("```json").or_else(|| s.strip_prefix("```")).unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

/// Parse a Tier 2 JSON response into a `Signal`, combining with the
/// channel-derived `format`. Returns `None` on any parse failure — the
/// caller falls back to the Tier 1 result (non-fatal).
pub fn parse_tier2_response(raw: &str, format: SignalFormat) -> Option<Signal> {
    let cleaned = strip_fences(raw);
    let parsed: RawClassification = serde_json::from_str(cleaned).ok()?;
    Some(Signal {
        mode: parse_mode(&parsed.mode)?,
        genre: parse_genre(&parsed.genre)?,
        r#type: parse_type(&parsed.r#type)?,
        format,
        weight: parsed.weight.clamp(0.0, 1.0),
    })
}

/// Run Tier 2 classification against an LLM. Returns `None` on timeout,
/// stream error, or parse failure — all non-fatal; the caller
/// is expected to fall back to the Tier 1 label.
pub async fn classify_tier2(
    llm: &dyn LlmClient,
    model: &ModelConfig,
    message: &str,
    format: SignalFormat,
    timeout: std::time::Duration,
) -> Option<Signal> {
    let prompt = format!("{INSTRUCTION_TEMPLATE}{message}");
    let messages = vec![ChatMessage::user(&prompt)];

    let run = async {
        let mut stream = llm.chat_stream(model, messages, &[]).await.ok()?;
        let mut text = String::new();
        while let Some(delta) = stream.next().await {
            if let Ok(StreamDelta::TextDelta(chunk)) = delta {
                text.push_str(&chunk);
            }
        }
        parse_tier2_response(&text, format)
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(signal) => signal,
        Err(_) => {
            tracing::debug!("tier 2 classification timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let raw = r#"{"mode":"EXECUTE","genre":"DIRECT","type":"request","weight":0.85}"#;
        let signal = parse_tier2_response(raw, SignalFormat::Message).unwrap();
        assert_eq!(signal.mode, SignalMode::Execute);
        assert_eq!(signal.genre, SignalGenre::Direct);
        assert_eq!(signal.r#type, SignalType::Request);
        assert!((signal.weight - 0.85).abs() < 1e-9);
    }

    #[test]
    fn strips_markdown_fence() {
        let raw = "```json\n{\"mode\":\"ASSIST\",\"genre\":\"INFORM\",\"type\":\"general\",\"weight\":0.4}\n```";
        let signal = parse_tier2_response(raw, SignalFormat::Message).unwrap();
        assert_eq!(signal.mode, SignalMode::Assist);
    }

    #[test]
    fn malformed_json_is_none() {
        assert!(parse_tier2_response("not json at all", SignalFormat::Message).is_none());
    }

    #[test]
    fn unknown_enum_value_is_none() {
        let raw = r#"{"mode":"WHATEVER","genre":"DIRECT","type":"request","weight":0.5}"#;
        assert!(parse_tier2_response(raw, SignalFormat::Message).is_none());
    }

    #[test]
    fn weight_is_clamped() {
        let raw = r#"{"mode":"ASSIST","genre":"INFORM","type":"general","weight":5.0}"#;
        let signal = parse_tier2_response(raw, SignalFormat::Message).unwrap();
        assert_eq!(signal.weight, 1.0);
    }
}
