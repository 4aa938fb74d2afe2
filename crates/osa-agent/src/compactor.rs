//! Three-zone progressive context compression (§4.4).
//!
//! Zones are assigned by recency from the tail of the working message list:
//! Hot = last 10, Warm = 11-30, Cold = 31+. Utilization against the token
//! budget selects an action: below 0.50 nothing happens; 0.50 crosses the
//! breakpoint (caller emits `context_pressure`, no mutation yet); 0.80 merges
//! adjacent same-role messages in the warm zone; 0.90 summarizes warm-zone
//! groups of five and drops cold-zone tool argument bodies; 0.95 compresses
//! the cold zone to key-fact bullets and falls back to emergency truncation.
//!
//! Compaction only ever touches the in-memory working copy handed to it —
//! the session store (`JsonlStore`) is untouched, so nothing here can lose
//! data a user could not recover by reloading history.

use futures::StreamExt;

use osa_core::config::{CompactionConfig, ModelConfig};
use osa_core::error::Result;
use osa_core::traits::LlmClient;
use osa_core::types::{ChatMessage, CompactionState, ContentBlock, Role, StreamDelta};

use crate::intelligence::{compact_tool_output, estimate_message_tokens, prune_to_budget};

const HOT_SIZE: usize = 10;
const WARM_SIZE: usize = 30;

/// Which compression zone a message falls into, counting from the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Hot,
    Warm,
    Cold,
}

/// Assigns zones by position from the end of `messages` (index 0 excluded,
/// since it's always the Critical-tier system message and never zoned).
fn zone_of(len: usize, idx: usize) -> Zone {
    let from_end = len.saturating_sub(idx + 1);
    if from_end < HOT_SIZE {
        Zone::Hot
    } else if from_end < WARM_SIZE {
        Zone::Warm
    } else {
        Zone::Cold
    }
}

/// Importance weighting used for retention ordering within a zone:
/// tool-call messages get a bonus, pure acknowledgments a penalty.
pub fn message_importance(msg: &ChatMessage) -> f64 {
    let mut score = 0.0;
    let has_tool_call = msg
        .content
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. }));
    if has_tool_call {
        score += 0.5;
    }
    if is_pure_acknowledgment(msg) {
        score -= 0.5;
    }
    if msg.metadata.as_ref().is_some_and(|m| m.protected) {
        score += 1.0;
    }
    score
}

const ACKNOWLEDGMENTS: &[&str] = &[
    "ok", "okay", "sure", "got it", "understood", "sounds good", "thanks", "thank you", "yep", "k",
];

fn is_pure_acknowledgment(msg: &ChatMessage) -> bool {
    if msg.content.len() != 1 {
        return false;
    }
    let text = msg.text().trim().to_lowercase();
    !text.is_empty() && text.len() < 20 && ACKNOWLEDGMENTS.contains(&text.trim_end_matches('.'))
}

pub fn utilization(total_tokens: u64, budget: u64) -> f64 {
    if budget == 0 {
        return 0.0;
    }
    total_tokens as f64 / budget as f64
}

/// Resolve the compaction state for a utilization ratio against the
/// 0.50/0.80/0.90/0.95 breakpoint/warn/needed/critical thresholds. The
/// 0.50 breakpoint is fixed (not configurable); the remaining three are
/// read from `CompactionConfig`.
pub fn state_for(utilization: f64, config: &CompactionConfig) -> CompactionState {
    if utilization >= config.emergency {
        CompactionState::Critical
    } else if utilization >= config.aggressive {
        CompactionState::Needed
    } else if utilization >= config.warn {
        CompactionState::Warning
    } else if utilization >= 0.50 {
        CompactionState::Breakpoint
    } else {
        CompactionState::Ok
    }
}

pub struct Compactor {
    config: CompactionConfig,
}

impl Compactor {
    pub fn new(config: CompactionConfig) -> Self {
        Self { config }
    }

    /// Apply whatever action the current utilization calls for. Returns the
    /// resolved state so the caller can decide whether to emit
    /// `context_pressure`. `llm`/`model` are used only for Needed's
    /// warm-zone summarization; its absence (or a failed call) falls back
    /// to keyword-bullet compression, never to silent data loss.
    pub async fn compact(
        &self,
        messages: &mut Vec<ChatMessage>,
        budget: u64,
        llm: Option<(&dyn LlmClient, &ModelConfig)>,
    ) -> Result<CompactionState> {
        let total: u64 = messages.iter().map(|m| estimate_message_tokens(m) as u64).sum();
        let util = utilization(total, budget);
        let state = state_for(util, &self.config);

        match state {
            CompactionState::Ok | CompactionState::Breakpoint => {}
            CompactionState::Warning => merge_adjacent_same_role(messages, Zone::Warm),
            CompactionState::Needed => {
                summarize_warm_groups(messages, llm).await;
                drop_cold_tool_args(messages);
            }
            CompactionState::Critical => {
                compress_cold_to_bullets(messages);
                drop_cold_tool_args(messages);
                let budget = budget.max(1) as usize;
                prune_to_budget(messages, budget, HOT_SIZE);
            }
        }

        Ok(state)
    }
}

/// Merge consecutive same-role messages within the warm zone into one,
/// concatenating their text content. Keeps the highest-importance
/// message's metadata.
fn merge_adjacent_same_role(messages: &mut Vec<ChatMessage>, target: Zone) {
    let len = messages.len();
    let mut merged: Vec<ChatMessage> = Vec::with_capacity(len);
    for (idx, msg) in messages.drain(..).enumerate() {
        let zone = zone_of(len, idx);
        if zone == target {
            if let Some(prev) = merged.last_mut() {
                if prev.role == msg.role && zone_of(len, idx.saturating_sub(1)) == target {
                    let combined_text = format!("{}\n{}", prev.text(), msg.text());
                    if message_importance(&msg) > message_importance(prev) {
                        *prev = msg;
                    }
                    prev.content = vec![ContentBlock::Text { text: combined_text }];
                    continue;
                }
            }
        }
        merged.push(msg);
    }
    *messages = merged;
}

/// Summarize the warm zone in groups of five, oldest-first, replacing each
/// group with a single summary message. On LLM failure, falls back to
/// keyword extraction rather than leaving the group untouched.
async fn summarize_warm_groups(messages: &mut Vec<ChatMessage>, llm: Option<(&dyn LlmClient, &ModelConfig)>) {
    let len = messages.len();
    let warm_indices: Vec<usize> = (0..len).filter(|&i| zone_of(len, i) == Zone::Warm).collect();
    if warm_indices.is_empty() {
        return;
    }

    for group in warm_indices.chunks(5) {
        if group.len() < 2 {
            continue;
        }
        let start = group[0];
        let end = group[group.len() - 1] + 1;
        let group_msgs = &messages[start..end];
        let summary_text = match llm {
            Some((client, model_cfg)) => match summarize_group(client, model_cfg, group_msgs).await {
                Some(text) => text,
                None => keyword_bullet_summary(group_msgs),
            },
            None => keyword_bullet_summary(group_msgs),
        };
        let summary = ChatMessage::user(format!("[compacted]\n{summary_text}"));
        messages.splice(start..end, std::iter::once(summary));
        break; // re-zone after one group; caller's loop re-invokes per turn
    }
}

async fn summarize_group(llm: &dyn LlmClient, model: &ModelConfig, group: &[ChatMessage]) -> Option<String> {
    let text = group.iter().map(|m| format!("{:?}: {}", m.role, m.text())).collect::<Vec<_>>().join("\n");
    let prompt = vec![ChatMessage::user(format!(
        "Summarize concisely, preserving facts/decisions/file paths:\n\n{text}"
    ))];
    let mut stream = llm.chat_stream(model, prompt, &[]).await.ok()?;
    let mut out = String::new();
    while let Some(delta) = stream.next().await {
        if let Ok(StreamDelta::TextDelta(t)) = delta {
            out.push_str(&t);
        }
    }
    if out.trim().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn keyword_bullet_summary(group: &[ChatMessage]) -> String {
    let joined = group.iter().map(|m| m.text()).collect::<Vec<_>>().join(" ");
    let keywords = osa_memory::extract_keywords(&joined);
    let mut kws: Vec<&String> = keywords.iter().collect();
    kws.sort();
    format!("key facts: {}", kws.into_iter().take(12).cloned().collect::<Vec<_>>().join(", "))
}

/// Cold-zone tool_use/tool_result content is replaced with a short marker,
/// preserving the message's role and id so downstream code that keys off
/// tool_call_id stays consistent, while shedding the bulk of the tokens.
fn drop_cold_tool_args(messages: &mut [ChatMessage]) {
    let len = messages.len();
    for (idx, msg) in messages.iter_mut().enumerate() {
        if zone_of(len, idx) != Zone::Cold {
            continue;
        }
        for block in &mut msg.content {
            match block {
                ContentBlock::ToolUse { input, .. } => {
                    *input = serde_json::json!({"_compacted": true});
                }
                ContentBlock::ToolResult { content, .. } => {
                    *content = compact_tool_output(content, 64);
                }
                _ => {}
            }
        }
    }
}

/// Cold-zone text messages are collapsed to keyword bullets, keeping the
/// highest-importance messages intact and dropping the rest entirely.
fn compress_cold_to_bullets(messages: &mut Vec<ChatMessage>) {
    let len = messages.len();
    let mut cold_indices: Vec<usize> = (0..len).filter(|&i| zone_of(len, i) == Zone::Cold).collect();
    cold_indices.sort_by(|&a, &b| {
        message_importance(&messages[b])
            .partial_cmp(&message_importance(&messages[a]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Keep the top third of cold messages by importance intact; bulletize the rest.
    let keep_count = (cold_indices.len() / 3).max(1);
    let to_bulletize: std::collections::HashSet<usize> =
        cold_indices.into_iter().skip(keep_count).collect();

    for &idx in &to_bulletize {
        let msg = &messages[idx];
        if matches!(msg.role, Role::System) {
            continue;
        }
        let bullet = keyword_bullet_summary(std::slice::from_ref(msg));
        let mut replacement = ChatMessage::user(bullet);
        if let Some(phase) = msg.phase() {
            replacement = replacement.with_phase(phase.to_string());
        }
        messages[idx] = replacement;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osa_core::config::CompactionConfig;

    fn cfg() -> CompactionConfig {
        CompactionConfig { warn: 0.80, aggressive: 0.90, emergency: 0.95 }
    }

    #[test]
    fn test_state_for_breakpoints() {
        let c = cfg();
        assert_eq!(state_for(0.10, &c), CompactionState::Ok);
        assert_eq!(state_for(0.55, &c), CompactionState::Breakpoint);
        assert_eq!(state_for(0.81, &c), CompactionState::Warning);
        assert_eq!(state_for(0.91, &c), CompactionState::Needed);
        assert_eq!(state_for(0.96, &c), CompactionState::Critical);
    }

    #[test]
    fn test_zone_assignment() {
        assert_eq!(zone_of(50, 49), Zone::Hot);
        assert_eq!(zone_of(50, 35), Zone::Warm);
        assert_eq!(zone_of(50, 0), Zone::Cold);
    }

    #[test]
    fn test_importance_tool_call_bonus() {
        let tool_msg = ChatMessage::tool_result("id1", "result", false);
        let plain_msg = ChatMessage::user("hello there");
        assert!(message_importance(&tool_msg) > message_importance(&plain_msg));
    }

    #[test]
    fn test_importance_acknowledgment_penalty() {
        let ack = ChatMessage::user("ok");
        let normal = ChatMessage::user("please run the tests");
        assert!(message_importance(&ack) < message_importance(&normal));
    }

    #[tokio::test]
    async fn test_compact_noop_below_breakpoint() {
        let compactor = Compactor::new(cfg());
        let mut messages = vec![ChatMessage::user("hi")];
        let state = compactor.compact(&mut messages, 100_000, None).await.unwrap();
        assert_eq!(state, CompactionState::Ok);
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn test_compact_critical_shrinks_messages() {
        let compactor = Compactor::new(cfg());
        let mut messages: Vec<ChatMessage> =
            (0..60).map(|i| ChatMessage::user(format!("message number {i} with some padding text"))).collect();
        let before = messages.len();
        // budget tiny relative to content forces Critical
        let state = compactor.compact(&mut messages, 10, None).await.unwrap();
        assert_eq!(state, CompactionState::Critical);
        assert!(messages.len() <= before);
    }
}
