//! Structured error types for the guardian.
//!
//! Nothing here is fatal. Throttling, empty style history, and bad
//! transitions are all recoverable and callers are expected to match on
//! the variant. "No trigger matched" and "escalation required" are normal
//! control flow and live in [`crate::escalation::TransitionDirective`]
//! instead of this enum.

use std::path::PathBuf;

use crate::escalation::handover::HandoverState;

/// Result type alias for guardian operations.
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors from the guardian subsystem.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// The sliding window for `key` is full.
    #[error("Rate limit exceeded for {key}: retry in {retry_after_ms}ms")]
    RateLimitExceeded { key: String, retry_after_ms: u64 },

    /// Style analysis was asked to profile an empty history.
    #[error("No message history to derive a style profile from")]
    EmptyStyleHistory,

    /// The hold/handover state machine refused a transition.
    #[error("Illegal handover transition: {from} → {to}")]
    IllegalTransition {
        from: HandoverState,
        to: HandoverState,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read a configuration file from disk.
    #[error("Failed to read {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse a TOML configuration file.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The rate-limit backing store could not serve the request.
    #[error("Rate limit store unavailable: {0}")]
    StoreUnavailable(String),
}

impl GuardError {
    /// Whether the caller can recover by answering the user normally
    /// (throttle message, default style, etc.).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded { .. } | Self::EmptyStyleHistory | Self::StoreUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_message_names_key() {
        let err = GuardError::RateLimitExceeded {
            key: "ai-chat:u1:10.0.0.1".into(),
            retry_after_ms: 1500,
        };
        let msg = err.to_string();
        assert!(msg.contains("ai-chat:u1:10.0.0.1"));
        assert!(msg.contains("1500ms"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_config_errors_are_not_recoverable() {
        assert!(!GuardError::InvalidConfig("x".into()).is_recoverable());
        let err = GuardError::IllegalTransition {
            from: HandoverState::Normal,
            to: HandoverState::HandedOff,
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("normal → handed_off"));
    }
}
