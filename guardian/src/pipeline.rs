//! Turn pipeline — rate gate, classify, decide, then either hand over or
//! blend the reply style.
//!
//! ```text
//! message ──▶ FlowGuardian ──reject──▶ Throttled
//!                 │ admit
//!                 ▼
//!         TriggerClassifier ─▶ EscalationPolicy (+ health, repeat knob)
//!                 │
//!        escalate ├──────────▶ Handover (caller may start a HoldSession)
//!                 ▼
//!         StyleAnalyzer ─▶ AdaptiveBlender ─▶ Proceed
//! ```
//!
//! The limiter is the only shared state and no lock outlives the admit.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GuardianConfig;
use crate::context::ConversationContext;
use crate::error::GuardResult;
use crate::escalation::{
    EscalationDecision, EscalationPolicy, HoldSession, TransitionDirective, GENERIC_HANDOVER,
};
use crate::rate_limit::{Admission, FlowGuardian, RateLimitKey};
use crate::style::{AdaptiveBlender, AdaptiveParameters, BaselinePersona, StyleAnalyzer};
use crate::triggers::{Severity, TriggerCategory, TriggerClassifier, TriggerDetectionResult};

/// What the user sees instead of a generated reply when a turn escalates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoverPayload {
    pub message: String,
    pub handover: bool,
    pub support_contact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TriggerCategory>,
    pub severity: Severity,
}

/// Result of evaluating one user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TurnOutcome {
    /// Rejected by the limiter; nothing else ran.
    Throttled { retry_after_ms: u64, message: String },
    /// Skip generation and show the payload.
    Handover {
        payload: HandoverPayload,
        detection: TriggerDetectionResult,
        decision: EscalationDecision,
    },
    /// Generate a reply with the blended style.
    Proceed {
        detection: TriggerDetectionResult,
        directive: TransitionDirective,
        parameters: AdaptiveParameters,
        /// Text to append to the system prompt.
        instructions: String,
    },
}

impl TurnOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Throttled { .. } => "throttled",
            Self::Handover { .. } => "handover",
            Self::Proceed { .. } => "proceed",
        }
    }

    pub fn is_handover(&self) -> bool {
        matches!(self, Self::Handover { .. })
    }
}

/// Per-deployment guard. Cheap to clone; clones share the limiter.
#[derive(Debug, Clone)]
pub struct ConversationGuard {
    config: GuardianConfig,
    limiter: FlowGuardian,
    classifier: TriggerClassifier,
    policy: EscalationPolicy,
    analyzer: StyleAnalyzer,
    blender: AdaptiveBlender,
}

impl ConversationGuard {
    /// Validate `config` and build a guard on the in-memory limiter.
    pub fn new(config: GuardianConfig) -> GuardResult<Self> {
        Self::with_limiter(config, FlowGuardian::in_memory())
    }

    pub fn with_limiter(config: GuardianConfig, limiter: FlowGuardian) -> GuardResult<Self> {
        config.validate()?;
        Ok(Self {
            classifier: config
                .taxonomy
                .clone()
                .map(TriggerClassifier::with_taxonomy)
                .unwrap_or_default(),
            policy: EscalationPolicy::with_config(config.policy.clone()),
            analyzer: StyleAnalyzer::new(),
            blender: AdaptiveBlender::new(BaselinePersona::default(), config.mirror_intensity),
            limiter,
            config,
        })
    }

    /// Swap the classifier, e.g. for a custom taxonomy.
    pub fn with_classifier(mut self, classifier: TriggerClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.config
    }

    pub fn limiter(&self) -> &FlowGuardian {
        &self.limiter
    }

    /// Rate-limit key for an identity under this guard's feature.
    pub fn key_for(&self, user_id: &str, client_ip: &str) -> RateLimitKey {
        RateLimitKey::new(self.config.feature.as_str(), user_id, client_ip)
    }

    /// Evaluate one turn.
    pub async fn evaluate(
        &self,
        key: &RateLimitKey,
        message: &str,
        context: &ConversationContext,
    ) -> TurnOutcome {
        let key_str = key.to_string();
        let admission = self
            .limiter
            .admit(&key_str, self.config.rate_limit, self.config.window_ms)
            .await;
        match admission {
            Ok(Admission::Admitted { .. }) => {}
            Ok(Admission::Rejected { retry_after_ms }) => {
                return self.throttled(retry_after_ms);
            }
            Err(e) => {
                warn!(key = %key_str, error = %e, "Rate limit store failed, throttling turn");
                return self.throttled(self.config.window_ms);
            }
        }

        let detection = self.classifier.classify(message);
        let decision = self
            .policy
            .decide_turn(message, &detection, context, self.limiter.now_ms());

        if decision.escalates() {
            info!(
                key = %key_str,
                category = ?detection.category,
                severity = %detection.severity,
                reason = ?decision.reason,
                "Escalating conversation to specialist"
            );
            let payload = HandoverPayload {
                message: decision
                    .message
                    .clone()
                    .unwrap_or_else(|| GENERIC_HANDOVER.to_string()),
                handover: true,
                support_contact: self.config.support_contact.clone(),
                category: detection.category.clone(),
                severity: detection.severity,
            };
            return TurnOutcome::Handover {
                payload,
                detection,
                decision,
            };
        }

        let profile = self.analyzer.try_analyze(&context.recent_messages).ok();
        let parameters = self.blender.blend(profile.as_ref());
        debug!(
            key = %key_str,
            directive = %decision.directive,
            tone = parameters.tone,
            response_length = parameters.response_length,
            "Proceeding with blended style"
        );

        TurnOutcome::Proceed {
            instructions: parameters.directive(),
            directive: decision.directive,
            detection,
            parameters,
        }
    }

    /// Begin the hold for an escalated turn with the configured duration.
    pub fn start_hold(&self, reason: &str) -> GuardResult<HoldSession> {
        HoldSession::begin(self.config.hold_ms, reason)
    }

    /// Like [`ConversationGuard::start_hold`], cancelled together with the
    /// session token.
    pub fn start_hold_with_token(
        &self,
        reason: &str,
        session: &CancellationToken,
    ) -> GuardResult<HoldSession> {
        HoldSession::with_token(self.config.hold_ms, reason, session.child_token())
    }

    fn throttled(&self, retry_after_ms: u64) -> TurnOutcome {
        TurnOutcome::Throttled {
            retry_after_ms,
            message: self.config.throttle_message.clone(),
        }
    }
}
