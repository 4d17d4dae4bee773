//! One line of stdin input.

use flow_guardian::rate_limit::FALLBACK_CLIENT_IP;
use flow_guardian::ConversationContext;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TurnInput {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub client_ip: Option<String>,
    /// Prior message bodies, oldest first. Only the last five are kept.
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub session_duration_ms: u64,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub last_escalation_ms: Option<u64>,
}

impl TurnInput {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            user_id: None,
            client_ip: None,
            history: Vec::new(),
            session_duration_ms: 0,
            error_count: 0,
            last_escalation_ms: None,
        }
    }

    pub fn context(&self) -> ConversationContext {
        let mut ctx = ConversationContext::from_history(&self.history, self.session_duration_ms)
            .with_error_count(self.error_count);
        ctx.last_escalation_ms = self.last_escalation_ms;
        ctx
    }

    /// Identity for the rate-limit key, with CLI flags as fallbacks.
    pub fn identity<'a>(
        &'a self,
        default_user: &'a str,
        default_ip: Option<&'a str>,
    ) -> (&'a str, &'a str) {
        let user = self.user_id.as_deref().unwrap_or(default_user);
        let ip = self
            .client_ip
            .as_deref()
            .or(default_ip)
            .unwrap_or(FALLBACK_CLIENT_IP);
        (user, ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_line() {
        let turn: TurnInput = serde_json::from_str(r#"{"message":"hello"}"#).unwrap();
        assert_eq!(turn.message, "hello");
        assert_eq!(turn.identity("cli", None), ("cli", "0.0.0.0"));
        assert_eq!(turn.context(), ConversationContext::default());
    }

    #[test]
    fn test_full_line() {
        let turn: TurnInput = serde_json::from_str(
            r#"{
                "message": "still broken",
                "user_id": "u-9",
                "client_ip": "198.51.100.4",
                "history": ["a", "b", "c", "d", "e", "f"],
                "session_duration_ms": 4000,
                "error_count": 2,
                "last_escalation_ms": 100
            }"#,
        )
        .unwrap();
        assert_eq!(turn.identity("cli", Some("10.0.0.1")), ("u-9", "198.51.100.4"));

        let ctx = turn.context();
        assert_eq!(ctx.message_count, 6);
        assert_eq!(ctx.recent_messages.len(), 5);
        assert_eq!(ctx.error_count, 2);
        assert_eq!(ctx.last_escalation_ms, Some(100));
    }
}
