//! Escalation — deterministic policy plus the hold/handover state machine
//!
//! Decides, per message, whether the conversation continues, gets extra
//! clarification, or is handed to a fresh assistant/human. This is a pure
//! decision layer with no LLM calls.
//!
//! # Escalation Ladder
//!
//! ```text
//! TriggerDetectionResult
//!     │
//!     ├─ nothing matched                  → continue
//!     ├─ matched, low/medium, < 3 keywords → clarify
//!     ├─ high/critical or ≥ 3 keywords     → escalate
//!     ├─ conversation looping              → escalate
//!     ├─ triggered in unhealthy session    → escalate
//!     │
//!     ▼
//! escalate ─▶ handover template ─▶ Escalating ─▶ HoldSimulated (≤ 60s) ─▶ HandedOff
//! ```

pub mod handover;
pub mod policy;

pub use handover::{
    capped_hold_ms, HandoverMachine, HandoverState, HoldOutcome, HoldSession, TransitionRecord,
    DEFAULT_HOLD_MS, MAX_HOLD_MS,
};
pub use policy::{
    handover_message, EscalationDecision, EscalationPolicy, EscalationReason, PolicyConfig,
    RepeatEscalation, TransitionDirective, DIFFICULTY_HANDOVER, GENERIC_HANDOVER,
};
