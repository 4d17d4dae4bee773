//! Conversation context snapshot and session health scan.
//!
//! The caller rebuilds a [`ConversationContext`] for every turn; the guardian
//! only reads it.

use serde::{Deserialize, Serialize};

/// How many recent message bodies the caller is expected to supply.
pub const RECENT_MESSAGE_WINDOW: usize = 5;

/// Characters of the previous message that must reappear for a loop.
const LOOP_PREFIX_CHARS: usize = 50;

/// Distress phrases outside the trigger taxonomy. They never classify a
/// message, but in an unhealthy session they count as a trigger.
const STRAIN_PHRASES: &[&str] = &[
    "delete account",
    "misleading",
    "deceptive",
    "wrong information",
    "incorrect",
    "outdated",
    "old data",
    "not updated",
    "missing",
    "disappeared",
    "gone",
    "deleted",
    "slow",
    "laggy",
    "unresponsive",
    "freezing",
    "hanging",
    "not responding",
    "page not found",
    "503",
    "unavailable",
    "maintenance",
    "down",
    "offline",
    "connection lost",
    "network error",
    "failed to fetch",
    "api error",
    "database error",
    "query failed",
    "transaction failed",
];

/// Whether `message` contains one of the session-strain phrases.
pub fn mentions_strain(message: &str) -> bool {
    let lowered = message.to_lowercase();
    STRAIN_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// Read-only per-turn snapshot of the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationContext {
    pub message_count: u32,
    /// Last message bodies, oldest first. Trimmed to
    /// [`RECENT_MESSAGE_WINDOW`] by [`ConversationContext::from_history`].
    pub recent_messages: Vec<String>,
    pub session_duration_ms: u64,
    pub error_count: u32,
    /// Epoch ms of the previous escalation in this session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_escalation_ms: Option<u64>,
}

impl ConversationContext {
    /// Build a snapshot from the full message history.
    pub fn from_history<S: AsRef<str>>(history: &[S], session_duration_ms: u64) -> Self {
        let start = history.len().saturating_sub(RECENT_MESSAGE_WINDOW);
        Self {
            message_count: history.len() as u32,
            recent_messages: history[start..]
                .iter()
                .map(|m| m.as_ref().to_string())
                .collect(),
            session_duration_ms,
            error_count: 0,
            last_escalation_ms: None,
        }
    }

    pub fn with_error_count(mut self, error_count: u32) -> Self {
        self.error_count = error_count;
        self
    }

    pub fn with_last_escalation(mut self, at_ms: u64) -> Self {
        self.last_escalation_ms = Some(at_ms);
        self
    }
}

/// Thresholds for [`ContextHealth::scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthLimits {
    /// Sessions with this many errors or more are unhealthy.
    pub max_errors: u32,
    /// Sessions at least this long are unhealthy.
    pub max_session_ms: u64,
}

impl Default for HealthLimits {
    fn default() -> Self {
        Self {
            max_errors: 5,
            max_session_ms: 3_600_000,
        }
    }
}

/// Result of scanning a context for looping and session wear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextHealth {
    /// The last three messages each repeat the start of the one before.
    pub looping: bool,
    pub healthy: bool,
}

impl ContextHealth {
    pub fn scan(context: &ConversationContext, limits: &HealthLimits) -> Self {
        Self {
            looping: is_looping(&context.recent_messages),
            healthy: context.error_count < limits.max_errors
                && context.session_duration_ms < limits.max_session_ms,
        }
    }
}

fn is_looping(messages: &[String]) -> bool {
    if messages.len() < 3 {
        return false;
    }
    let last_three: Vec<String> = messages[messages.len() - 3..]
        .iter()
        .map(|m| m.to_lowercase())
        .collect();
    last_three.windows(2).all(|pair| {
        let prefix: String = pair[0].chars().take(LOOP_PREFIX_CHARS).collect();
        pair[1].contains(&prefix)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_history_keeps_last_five() {
        let history: Vec<String> = (1..=8).map(|i| format!("m{}", i)).collect();
        let ctx = ConversationContext::from_history(&history, 1_000);
        assert_eq!(ctx.message_count, 8);
        assert_eq!(ctx.recent_messages, vec!["m4", "m5", "m6", "m7", "m8"]);
        assert_eq!(ctx.session_duration_ms, 1_000);
    }

    #[test]
    fn test_repeated_messages_loop() {
        let ctx = ConversationContext::from_history(
            &["hello", "Try again", "try again please", "TRY AGAIN PLEASE!"],
            0,
        );
        let health = ContextHealth::scan(&ctx, &HealthLimits::default());
        assert!(health.looping);
        assert!(health.healthy);
    }

    #[test]
    fn test_distinct_messages_do_not_loop() {
        let ctx = ConversationContext::from_history(&["find jobs", "in Berlin", "remote only"], 0);
        assert!(!ContextHealth::scan(&ctx, &HealthLimits::default()).looping);
    }

    #[test]
    fn test_two_messages_never_loop() {
        let ctx = ConversationContext::from_history(&["same", "same"], 0);
        assert!(!ContextHealth::scan(&ctx, &HealthLimits::default()).looping);
    }

    #[test]
    fn test_strain_phrases() {
        assert!(mentions_strain("The site is SLOW today"));
        assert!(mentions_strain("my saved search disappeared"));
        assert!(!mentions_strain("show me remote jobs"));
    }

    #[test]
    fn test_unhealthy_on_errors_or_duration() {
        let limits = HealthLimits::default();
        let worn = ConversationContext::default().with_error_count(5);
        assert!(!ContextHealth::scan(&worn, &limits).healthy);

        let long = ConversationContext {
            session_duration_ms: 3_600_000,
            ..Default::default()
        };
        assert!(!ContextHealth::scan(&long, &limits).healthy);

        let fresh = ConversationContext::default().with_error_count(4);
        assert!(ContextHealth::scan(&fresh, &limits).healthy);
    }
}
