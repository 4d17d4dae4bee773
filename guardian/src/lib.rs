//! Flow Guardian — conversation risk and escalation engine
//!
//! A deterministic guard placed in front of an AI chat assistant. For every
//! user turn it:
//! - rate-limits per `feature:user:ip` with a sliding window
//! - classifies the message against an ordered keyword taxonomy
//! - decides whether to continue, clarify, or hand over to a specialist
//! - simulates a cancellable hold before handoff
//! - mirrors the user's communication style into the reply parameters
//!
//! # Usage
//!
//! ```rust,ignore
//! use flow_guardian::{ConversationContext, ConversationGuard, GuardianConfig, TurnOutcome};
//!
//! let guard = ConversationGuard::new(GuardianConfig::from_env())?;
//! let key = guard.key_for(&user_id, &client_ip);
//! let context = ConversationContext::from_history(&history, session_ms);
//!
//! match guard.evaluate(&key, &message, &context).await {
//!     TurnOutcome::Throttled { message, .. } => reply_429(message),
//!     TurnOutcome::Handover { payload, .. } => reply_json(payload),
//!     TurnOutcome::Proceed { instructions, .. } => generate(system_prompt + &instructions),
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod escalation;
pub mod pipeline;
pub mod rate_limit;
pub mod style;
pub mod triggers;

pub use config::GuardianConfig;
pub use context::{ContextHealth, ConversationContext, HealthLimits};
pub use error::{GuardError, GuardResult};
pub use escalation::{
    EscalationDecision, EscalationPolicy, HandoverState, HoldOutcome, HoldSession,
    RepeatEscalation, TransitionDirective,
};
pub use pipeline::{ConversationGuard, HandoverPayload, TurnOutcome};
pub use rate_limit::{FlowGuardian, RateLimitKey};
pub use style::{AdaptiveBlender, AdaptiveParameters, StyleAnalyzer, UserStyleProfile};
pub use triggers::{
    detect_triggers, Severity, TriggerCategory, TriggerClassifier, TriggerDetectionResult,
};
