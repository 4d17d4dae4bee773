//! Escalation Policy — turns classifier output into a transition directive
//!
//! One decision per message. There are no retries and no backoff; whether a
//! second escalation in the same session is honored is controlled by
//! [`RepeatEscalation`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{mentions_strain, ContextHealth, ConversationContext, HealthLimits};
use crate::triggers::{
    Severity, TriggerCategory, TriggerDetectionResult, KEYWORD_ESCALATION_THRESHOLD,
};

/// Handover copy used when no category template applies.
pub const GENERIC_HANDOVER: &str = "I want to ensure you receive the best possible assistance. Let me connect you with a specialist who can help. One moment please...";

/// Handover copy for health-driven escalations with no trigger match.
pub const DIFFICULTY_HANDOVER: &str = "I understand you're experiencing difficulties. Let me connect you with a specialist who can better assist you. One moment please...";

/// What the caller should do with this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionDirective {
    /// Nothing matched; generate a normal reply.
    Continue,
    /// A trigger matched below the escalation bar; reply with extra care.
    Clarify,
    /// Skip generation and return a handover payload.
    Escalate,
}

impl TransitionDirective {
    /// Directive implied by the classifier alone.
    pub fn from_detection(detection: &TriggerDetectionResult) -> Self {
        if detection.escalation_required {
            Self::Escalate
        } else if detection.triggered {
            Self::Clarify
        } else {
            Self::Continue
        }
    }
}

impl fmt::Display for TransitionDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Clarify => write!(f, "clarify"),
            Self::Escalate => write!(f, "escalate"),
        }
    }
}

/// Why a turn was escalated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// Category severity is high or critical.
    Severity {
        category: TriggerCategory,
        severity: Severity,
    },
    /// Enough keywords matched to escalate regardless of severity.
    KeywordVolume { count: usize },
    /// Recent messages repeat each other.
    Looping,
    /// A trigger fired in a worn-out session.
    UnhealthySession {
        error_count: u32,
        session_duration_ms: u64,
    },
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Severity { category, severity } => {
                write!(f, "{} trigger at {} severity", category, severity)
            }
            Self::KeywordVolume { count } => {
                write!(f, "{} keywords matched (threshold: {})", count, KEYWORD_ESCALATION_THRESHOLD)
            }
            Self::Looping => write!(f, "conversation is looping"),
            Self::UnhealthySession {
                error_count,
                session_duration_ms,
            } => write!(
                f,
                "unhealthy session ({} errors, {}ms)",
                error_count, session_duration_ms
            ),
        }
    }
}

/// Whether repeated escalations within one session are honored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RepeatEscalation {
    /// Every message is judged on its own.
    #[default]
    Independent,
    /// Within `cooldown_ms` of the previous escalation, downgrade to clarify.
    Cooldown { cooldown_ms: u64 },
}

/// Full decision for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDecision {
    pub directive: TransitionDirective,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<EscalationReason>,
    /// Handover copy, present only when escalating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// An escalation was due but the repeat knob held it back.
    #[serde(default)]
    pub suppressed: bool,
}

impl EscalationDecision {
    pub fn escalates(&self) -> bool {
        self.directive == TransitionDirective::Escalate
    }
}

/// Fixed handover template for a category.
pub fn handover_message(category: &TriggerCategory) -> &'static str {
    match category {
        TriggerCategory::Security => "I understand your security concern is critical. Let me connect you with our security specialist who can address this immediately. Please hold for just a moment...",
        TriggerCategory::Payment => "I see you're experiencing a payment issue. Let me transfer you to our billing specialist who can resolve this right away. One moment please...",
        TriggerCategory::Escalation => "I'd be happy to connect you with a specialist who can provide more detailed assistance. Please hold while I transfer you...",
        TriggerCategory::Frustration => "I sincerely apologize for the frustration you're experiencing. Let me connect you with a senior specialist who can help resolve this immediately. One moment...",
        TriggerCategory::Errors => "I understand you're encountering technical difficulties. Let me connect you with our technical support team who can diagnose and fix this. Please hold...",
        TriggerCategory::Access => "I see you're having trouble accessing your account. Let me connect you with our account specialist who can restore your access. One moment please...",
        TriggerCategory::Confusion => "I want to make sure you get the clearest possible explanation. Let me connect you with a specialist who can walk you through this step-by-step. Please hold...",
        TriggerCategory::Other(_) => GENERIC_HANDOVER,
    }
}

/// Escalation policy configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub repeat: RepeatEscalation,
    pub health: HealthLimits,
}

/// Deterministic escalation policy. No LLM calls, no shared state.
#[derive(Debug, Clone, Default)]
pub struct EscalationPolicy {
    config: PolicyConfig,
}

impl EscalationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Decide from the classifier result alone.
    pub fn decide_detection(&self, detection: &TriggerDetectionResult) -> EscalationDecision {
        let directive = TransitionDirective::from_detection(detection);
        if directive != TransitionDirective::Escalate {
            return EscalationDecision {
                directive,
                reason: None,
                message: None,
                suppressed: false,
            };
        }

        let reason = match &detection.category {
            Some(category) if detection.severity.escalates() => EscalationReason::Severity {
                category: category.clone(),
                severity: detection.severity,
            },
            _ => EscalationReason::KeywordVolume {
                count: detection.matched_keywords.len(),
            },
        };
        let message = detection
            .category
            .as_ref()
            .map(handover_message)
            .unwrap_or(GENERIC_HANDOVER);

        EscalationDecision {
            directive,
            reason: Some(reason),
            message: Some(message.to_string()),
            suppressed: false,
        }
    }

    /// Decide for a turn, folding in session health and the repeat knob.
    ///
    /// Health can only raise the directive to escalate: a looping
    /// conversation escalates outright, an unhealthy one escalates when any
    /// trigger fired.
    pub fn decide(
        &self,
        detection: &TriggerDetectionResult,
        context: &ConversationContext,
        now_ms: u64,
    ) -> EscalationDecision {
        self.decide_strained(detection, detection.triggered, context, now_ms)
    }

    /// Like [`EscalationPolicy::decide`], but an unhealthy session also
    /// escalates when `message` mentions a strain phrase ("slow",
    /// "incorrect", "delete account", ...) the taxonomy does not cover.
    pub fn decide_turn(
        &self,
        message: &str,
        detection: &TriggerDetectionResult,
        context: &ConversationContext,
        now_ms: u64,
    ) -> EscalationDecision {
        let strained = detection.triggered || mentions_strain(message);
        self.decide_strained(detection, strained, context, now_ms)
    }

    fn decide_strained(
        &self,
        detection: &TriggerDetectionResult,
        strained: bool,
        context: &ConversationContext,
        now_ms: u64,
    ) -> EscalationDecision {
        let mut decision = self.decide_detection(detection);
        let health = ContextHealth::scan(context, &self.config.health);

        if !decision.escalates() {
            let health_reason = if health.looping {
                Some(EscalationReason::Looping)
            } else if strained && !health.healthy {
                Some(EscalationReason::UnhealthySession {
                    error_count: context.error_count,
                    session_duration_ms: context.session_duration_ms,
                })
            } else {
                None
            };

            if let Some(reason) = health_reason {
                let message = detection
                    .category
                    .as_ref()
                    .map(handover_message)
                    .unwrap_or(DIFFICULTY_HANDOVER);
                decision = EscalationDecision {
                    directive: TransitionDirective::Escalate,
                    reason: Some(reason),
                    message: Some(message.to_string()),
                    suppressed: false,
                };
            }
        }

        if decision.escalates() && self.within_cooldown(context, now_ms) {
            debug!(
                last_escalation_ms = ?context.last_escalation_ms,
                reason = ?decision.reason,
                "Escalation suppressed by repeat cooldown"
            );
            // a held-back escalation with no trigger behind it stays a plain turn
            decision.directive = if detection.triggered {
                TransitionDirective::Clarify
            } else {
                TransitionDirective::Continue
            };
            decision.message = None;
            decision.suppressed = true;
        }

        decision
    }

    fn within_cooldown(&self, context: &ConversationContext, now_ms: u64) -> bool {
        match (self.config.repeat, context.last_escalation_ms) {
            (RepeatEscalation::Cooldown { cooldown_ms }, Some(last)) => {
                now_ms.saturating_sub(last) < cooldown_ms
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triggers::detect_triggers;

    #[test]
    fn test_continue_has_no_message() {
        let d = EscalationPolicy::new().decide_detection(&detect_triggers("find me a job"));
        assert_eq!(d.directive, TransitionDirective::Continue);
        assert!(d.message.is_none());
        assert!(d.reason.is_none());
    }

    #[test]
    fn test_clarify_for_low_severity() {
        let d = EscalationPolicy::new().decide_detection(&detect_triggers("I'm confused"));
        assert_eq!(d.directive, TransitionDirective::Clarify);
        assert!(d.message.is_none());
    }

    #[test]
    fn test_payment_uses_billing_template() {
        let d = EscalationPolicy::new().decide_detection(&detect_triggers("I need a refund"));
        assert!(d.escalates());
        assert!(d.message.as_deref().unwrap().contains("billing specialist"));
        assert_eq!(
            d.reason,
            Some(EscalationReason::Severity {
                category: TriggerCategory::Payment,
                severity: Severity::Critical,
            })
        );
    }

    #[test]
    fn test_keyword_volume_reason() {
        let d = EscalationPolicy::new()
            .decide_detection(&detect_triggers("confused, unclear and complicated"));
        assert!(d.escalates());
        assert_eq!(d.reason, Some(EscalationReason::KeywordVolume { count: 3 }));
        assert!(d.message.as_deref().unwrap().contains("step-by-step"));
    }

    #[test]
    fn test_unmapped_category_gets_generic_template() {
        assert_eq!(
            handover_message(&TriggerCategory::Other("shipping".into())),
            GENERIC_HANDOVER
        );
    }

    #[test]
    fn test_looping_escalates_benign_message() {
        let ctx = ConversationContext::from_history(&["show jobs", "show jobs", "show jobs"], 0);
        let d = EscalationPolicy::new().decide(&detect_triggers("show jobs"), &ctx, 0);
        assert!(d.escalates());
        assert_eq!(d.reason, Some(EscalationReason::Looping));
        assert_eq!(d.message.as_deref(), Some(DIFFICULTY_HANDOVER));
    }

    #[test]
    fn test_unhealthy_session_escalates_only_when_triggered() {
        let ctx = ConversationContext::default().with_error_count(7);
        let policy = EscalationPolicy::new();

        let quiet = policy.decide(&detect_triggers("next page please"), &ctx, 0);
        assert_eq!(quiet.directive, TransitionDirective::Continue);

        let confused = policy.decide(&detect_triggers("I'm confused"), &ctx, 0);
        assert!(confused.escalates());
        assert!(matches!(
            confused.reason,
            Some(EscalationReason::UnhealthySession { error_count: 7, .. })
        ));
    }

    #[test]
    fn test_independent_repeats_always_escalate() {
        let ctx = ConversationContext::default().with_last_escalation(9_000);
        let d = EscalationPolicy::new().decide(&detect_triggers("I was hacked"), &ctx, 10_000);
        assert!(d.escalates());
        assert!(!d.suppressed);
    }

    #[test]
    fn test_cooldown_downgrades_repeat() {
        let policy = EscalationPolicy::with_config(PolicyConfig {
            repeat: RepeatEscalation::Cooldown { cooldown_ms: 5_000 },
            ..Default::default()
        });
        let ctx = ConversationContext::default().with_last_escalation(9_000);

        let held = policy.decide(&detect_triggers("I was hacked"), &ctx, 10_000);
        assert_eq!(held.directive, TransitionDirective::Clarify);
        assert!(held.suppressed);
        assert!(held.message.is_none());

        let later = policy.decide(&detect_triggers("I was hacked"), &ctx, 14_000);
        assert!(later.escalates());
        assert!(!later.suppressed);
    }

    #[test]
    fn test_cooldown_keeps_untriggered_loop_continuing() {
        let policy = EscalationPolicy::with_config(PolicyConfig {
            repeat: RepeatEscalation::Cooldown { cooldown_ms: 5_000 },
            ..Default::default()
        });
        let ctx = ConversationContext::from_history(&["show jobs", "show jobs", "show jobs"], 0)
            .with_last_escalation(9_000);

        let d = policy.decide(&detect_triggers("show jobs"), &ctx, 10_000);
        assert_eq!(d.directive, TransitionDirective::Continue);
        assert_eq!(d.reason, Some(EscalationReason::Looping));
        assert!(d.suppressed);
        assert!(d.message.is_none());
    }

    #[test]
    fn test_strain_phrase_escalates_unhealthy_session() {
        let policy = EscalationPolicy::new();
        let message = "the dashboard is so slow";
        let detection = detect_triggers(message);
        assert!(!detection.triggered);

        let worn = ConversationContext::default().with_error_count(5);
        let d = policy.decide_turn(message, &detection, &worn, 0);
        assert!(d.escalates());
        assert!(matches!(
            d.reason,
            Some(EscalationReason::UnhealthySession { error_count: 5, .. })
        ));
        assert_eq!(d.message.as_deref(), Some(DIFFICULTY_HANDOVER));

        // classifier-only decisions ignore strain phrases
        assert!(!policy.decide(&detection, &worn, 0).escalates());
        // and a healthy session never escalates on them
        let fresh = ConversationContext::default();
        assert_eq!(
            policy.decide_turn(message, &detection, &fresh, 0).directive,
            TransitionDirective::Continue
        );
    }
}
