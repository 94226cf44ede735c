//! Sliding-window truncation (base spec §4.1 step 5, §8 boundary property: "never
//! drops the system message or the most-recent user message").

use crate::storage::{ChatMessage, Role};

/// Approximates a message's token count. The base spec treats the tokenizer as an
/// external, swappable concern ("a provided tokenizer"); implementers with a real
/// tokenizer can supply their own [`TokenCounter`] instead of the default.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Default approximation: ~4 characters per token, the conventional rule of thumb for
/// English text with BPE tokenizers, used when no real tokenizer is injected.
pub struct ApproxCharTokenCounter;

impl TokenCounter for ApproxCharTokenCounter {
    fn count(&self, text: &str) -> usize {
        (text.chars().count() / 4).max(1)
    }
}

/// Applies a sliding window sized by `max_context_window * threshold_percentage`
/// (default 128k * 0.8). Drops the oldest non-system messages first; always preserves
/// the system message (if present, assumed to be `messages[0]`) and the most-recent
/// user message.
pub fn truncate_messages(
    messages: &[ChatMessage],
    counter: &dyn TokenCounter,
    max_context_window: usize,
    threshold_percentage: f64,
) -> Vec<ChatMessage> {
    let budget = (max_context_window as f64 * threshold_percentage) as usize;

    let system_idx = messages.iter().position(|m| m.role == Role::System);
    let last_user_idx = messages.iter().rposition(|m| m.role == Role::User);

    let mut total: usize = messages.iter().map(|m| counter.count(&m.content)).sum();
    if total <= budget {
        return messages.to_vec();
    }

    // Drop oldest non-system, non-most-recent-user messages first, in order, until we
    // fit the budget or run out of droppable messages.
    let mut keep: Vec<bool> = vec![true; messages.len()];
    for (i, msg) in messages.iter().enumerate() {
        if total <= budget {
            break;
        }
        if Some(i) == system_idx || Some(i) == last_user_idx {
            continue;
        }
        keep[i] = false;
        total -= counter.count(&msg.content);
    }

    messages
        .iter()
        .zip(keep)
        .filter_map(|(m, k)| k.then(|| m.clone()))
        .collect()
}

pub const DEFAULT_MAX_CONTEXT_WINDOW: usize = 128_000;
pub const DEFAULT_THRESHOLD_PERCENTAGE: f64 = 0.8;

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, content: &str) -> ChatMessage {
        ChatMessage::new(role, content)
    }

    #[test]
    fn fits_within_budget_is_unchanged() {
        let messages = vec![
            msg(Role::System, "sys"),
            msg(Role::User, "hi"),
            msg(Role::Assistant, "hello"),
        ];
        let out = truncate_messages(&messages, &ApproxCharTokenCounter, 128_000, 0.8);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn drops_oldest_non_system_non_last_user_first() {
        let big = "x".repeat(4000);
        let messages = vec![
            msg(Role::System, "sys"),
            msg(Role::User, &big),
            msg(Role::Assistant, &big),
            msg(Role::User, "latest question"),
        ];
        // Budget small enough to force drops but large enough to keep system + last user.
        let out = truncate_messages(&messages, &ApproxCharTokenCounter, 10, 0.8);
        assert!(out.iter().any(|m| m.role == Role::System));
        assert!(out.iter().any(|m| m.content == "latest question"));
        assert!(out.len() < messages.len());
    }

    #[test]
    fn never_drops_system_or_most_recent_user_even_under_extreme_pressure() {
        let big = "x".repeat(100_000);
        let messages = vec![
            msg(Role::System, &big),
            msg(Role::User, &big),
            msg(Role::Assistant, &big),
            msg(Role::User, "latest"),
        ];
        let out = truncate_messages(&messages, &ApproxCharTokenCounter, 1, 0.8);
        assert!(out.iter().any(|m| m.role == Role::System));
        assert!(out.iter().any(|m| m.content == "latest"));
    }
}
