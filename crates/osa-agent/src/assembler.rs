//! Four-tier token-budgeted prompt assembly (§4.4).
//!
//! Given a hard budget `B = model_context_limit - reserved_response_tokens`,
//! the Critical tier (system prompt built by [`crate::context`]) is never
//! truncated; if it alone exceeds `B` assembly fails with
//! `context_overflow`. The remainder is split High 40% / Medium 30% / Low
//! 30%, filled in that order; a tier that runs out of candidates before
//! exhausting its share cascades the unspent tokens to the next tier.

use osa_core::error::{OsaError, Result};
use osa_core::types::{ChatMessage, MemoryEntry};

use crate::intelligence::{estimate_message_tokens, estimate_tokens};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierBudgets {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

pub struct ContextAssembler;

impl ContextAssembler {
    /// Split `total_budget - critical_tokens` 40/30/30 across High/Medium/Low.
    pub fn compute_budgets(total_budget: u64, critical_tokens: u64) -> Result<TierBudgets> {
        if critical_tokens > total_budget {
            return Err(OsaError::ContextOverflow { budget: total_budget });
        }
        let remainder = total_budget - critical_tokens;
        let high = (remainder as f64 * 0.40).floor() as u64;
        let medium = (remainder as f64 * 0.30).floor() as u64;
        let low = remainder.saturating_sub(high).saturating_sub(medium);
        Ok(TierBudgets { critical: critical_tokens, high, medium, low })
    }

    /// Assemble the full prompt. `history` is chronological (oldest first);
    /// `recalled_memories` should already be ranked best-first (see
    /// `osa_memory::recall_relevant`); `bulletins` are free-form Low-tier
    /// notes (workflow/env context). Returns messages in send order:
    /// critical system message, then Low-tier bulletins, then Medium-tier
    /// memory context, then as much recent History (High tier) as fits —
    /// recency stays closest to the end of the prompt.
    pub fn assemble(
        system_msg: ChatMessage,
        history: &[ChatMessage],
        recalled_memories: &[MemoryEntry],
        bulletins: &[String],
        total_budget: u64,
    ) -> Result<Vec<ChatMessage>> {
        let critical_tokens = estimate_message_tokens(&system_msg) as u64;
        let budgets = Self::compute_budgets(total_budget, critical_tokens)?;

        // High: fill with the most recent messages first, then restore
        // chronological order.
        let mut high_used = 0u64;
        let mut high_msgs: Vec<ChatMessage> = Vec::new();
        for msg in history.iter().rev() {
            let cost = estimate_message_tokens(msg) as u64;
            if high_used + cost > budgets.high && !high_msgs.is_empty() {
                break;
            }
            high_used += cost;
            high_msgs.push(msg.clone());
        }
        high_msgs.reverse();
        let high_unspent = budgets.high.saturating_sub(high_used);

        // Medium: relevance-scored memories, cascading High's unspent share.
        let medium_budget = budgets.medium + high_unspent;
        let mut medium_used = 0u64;
        let mut medium_lines: Vec<String> = Vec::new();
        for entry in recalled_memories {
            let line = format!("- [{}] {}", entry.category.heading(), entry.content);
            let cost = estimate_tokens(&line) as u64;
            if medium_used + cost > medium_budget && !medium_lines.is_empty() {
                break;
            }
            medium_used += cost;
            medium_lines.push(line);
        }
        let medium_unspent = medium_budget.saturating_sub(medium_used);

        // Low: bulletins/workflow notes, cascading Medium's unspent share.
        let low_budget = budgets.low + medium_unspent;
        let mut low_used = 0u64;
        let mut low_lines: Vec<String> = Vec::new();
        for bulletin in bulletins {
            let cost = estimate_tokens(bulletin) as u64;
            if low_used + cost > low_budget && !low_lines.is_empty() {
                break;
            }
            low_used += cost;
            low_lines.push(bulletin.clone());
        }

        let mut out = vec![system_msg];
        if !low_lines.is_empty() {
            out.push(ChatMessage::user(format!("# Workflow Context\n\n{}", low_lines.join("\n"))).with_phase("low_tier"));
        }
        if !medium_lines.is_empty() {
            out.push(ChatMessage::user(format!("# Relevant Memory\n\n{}", medium_lines.join("\n"))).with_phase("medium_tier"));
        }
        out.extend(high_msgs);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osa_core::types::{MemoryCategory, Role};

    fn entry(content: &str) -> MemoryEntry {
        MemoryEntry {
            id: "1".to_string(),
            category: MemoryCategory::Fact,
            content: content.to_string(),
            keywords: Default::default(),
            importance: 0.5,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_compute_budgets_splits_remainder() {
        let budgets = ContextAssembler::compute_budgets(1000, 100).unwrap();
        assert_eq!(budgets.critical, 100);
        assert_eq!(budgets.high, 360);
        assert_eq!(budgets.medium, 270);
        assert_eq!(budgets.high + budgets.medium + budgets.low, 900);
    }

    #[test]
    fn test_compute_budgets_overflow() {
        let err = ContextAssembler::compute_budgets(100, 200).unwrap_err();
        assert!(matches!(err, OsaError::ContextOverflow { budget: 100 }));
    }

    #[test]
    fn test_assemble_includes_all_tiers() {
        let mut system = ChatMessage::user("system prompt");
        system.role = Role::System;
        let history = vec![ChatMessage::user("hello"), ChatMessage::assistant_text("hi there")];
        let memories = vec![entry("the api rate limit is 100/min")];
        let bulletins = vec!["deploy freeze until Friday".to_string()];

        let assembled =
            ContextAssembler::assemble(system, &history, &memories, &bulletins, 5000).unwrap();

        assert_eq!(assembled[0].role, Role::System);
        assert!(assembled.iter().any(|m| m.text().contains("deploy freeze")));
        assert!(assembled.iter().any(|m| m.text().contains("rate limit")));
        assert!(assembled.last().unwrap().text().contains("hi there"));
    }

    #[test]
    fn test_assemble_high_tier_drops_oldest_under_tight_budget() {
        let mut system = ChatMessage::user("system");
        system.role = Role::System;
        let history: Vec<ChatMessage> =
            (0..50).map(|i| ChatMessage::user(format!("message {i} with filler text to cost tokens"))).collect();

        let assembled = ContextAssembler::assemble(system, &history, &[], &[], 200).unwrap();
        // Should keep the most recent message, not the oldest.
        assert!(assembled.last().unwrap().text().contains("message 49"));
    }
}
