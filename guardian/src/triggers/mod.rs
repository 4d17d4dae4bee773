//! Trigger detection
//!
//! Keyword-driven risk classification for inbound chat messages.
//!
//! ```text
//! message ──lowercase──▶ errors? ─▶ confusion? ─▶ frustration? ─▶ escalation?
//!                          │            │              │               │
//!                          └────────────┴── first hit wins ────────────┘
//!                                       ─▶ payment? ─▶ security? ─▶ access?
//! ```

pub mod classifier;
pub mod taxonomy;

pub use classifier::{
    detect_triggers, Severity, SuggestedAction, TriggerClassifier, TriggerDetectionResult,
    KEYWORD_ESCALATION_THRESHOLD,
};
pub use taxonomy::{TriggerCategory, TriggerGroup, TriggerTaxonomy};
