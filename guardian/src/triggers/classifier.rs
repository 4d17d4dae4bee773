//! Trigger Classifier — first-match keyword scan over the taxonomy
//!
//! Pure and synchronous. Safe to call from any thread without locking.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::taxonomy::{TriggerCategory, TriggerTaxonomy};

/// Matched keyword count at which any category escalates.
pub const KEYWORD_ESCALATION_THRESHOLD: usize = 3;

/// Ordered risk level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Fixed severity table. Not configurable per call.
    pub fn for_category(category: &TriggerCategory) -> Self {
        match category {
            TriggerCategory::Security | TriggerCategory::Payment => Self::Critical,
            TriggerCategory::Escalation | TriggerCategory::Frustration => Self::High,
            TriggerCategory::Errors | TriggerCategory::Access => Self::Medium,
            TriggerCategory::Confusion | TriggerCategory::Other(_) => Self::Low,
        }
    }

    pub fn escalates(self) -> bool {
        self >= Self::High
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// What the classifier suggests doing with the turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    #[default]
    Continue,
    Clarify,
    Escalate,
}

impl SuggestedAction {
    pub fn description(self) -> &'static str {
        match self {
            Self::Continue => "Continue normal conversation",
            Self::Clarify => "Provide extra clarification and support",
            Self::Escalate => "Escalate to fresh AI instance with context preservation",
        }
    }
}

impl fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Clarify => write!(f, "clarify"),
            Self::Escalate => write!(f, "escalate"),
        }
    }
}

/// Classifier output for a single message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDetectionResult {
    pub triggered: bool,
    pub category: Option<TriggerCategory>,
    pub matched_keywords: Vec<String>,
    pub severity: Severity,
    pub escalation_required: bool,
    pub suggested_action: SuggestedAction,
}

impl TriggerDetectionResult {
    /// Result for a message that matched nothing.
    pub fn no_match() -> Self {
        Self::default()
    }

    fn from_match(category: TriggerCategory, matched_keywords: Vec<String>) -> Self {
        let severity = Severity::for_category(&category);
        let escalation_required =
            severity.escalates() || matched_keywords.len() >= KEYWORD_ESCALATION_THRESHOLD;
        let suggested_action = if escalation_required {
            SuggestedAction::Escalate
        } else {
            SuggestedAction::Clarify
        };
        Self {
            triggered: true,
            category: Some(category),
            matched_keywords,
            severity,
            escalation_required,
            suggested_action,
        }
    }

    /// Compact summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "category={} matched={} severity={} action={}",
            self.category.as_ref().map(|c| c.as_str()).unwrap_or("none"),
            self.matched_keywords.len(),
            self.severity,
            self.suggested_action,
        )
    }
}

/// Scans messages against an ordered taxonomy.
#[derive(Debug, Clone, Default)]
pub struct TriggerClassifier {
    taxonomy: TriggerTaxonomy,
}

impl TriggerClassifier {
    /// Classifier over the built-in taxonomy.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_taxonomy(taxonomy: TriggerTaxonomy) -> Self {
        Self { taxonomy }
    }

    pub fn taxonomy(&self) -> &TriggerTaxonomy {
        &self.taxonomy
    }

    /// Classify one message.
    ///
    /// Categories are evaluated in taxonomy order and the first one with any
    /// match wins; later categories are never looked at.
    pub fn classify(&self, message: &str) -> TriggerDetectionResult {
        let lowered = message.to_lowercase();
        self.taxonomy
            .groups()
            .iter()
            .find_map(|group| {
                let matched = group.matches_in(&lowered);
                (!matched.is_empty())
                    .then(|| TriggerDetectionResult::from_match(group.category.clone(), matched))
            })
            .unwrap_or_else(TriggerDetectionResult::no_match)
    }
}

/// Classify against the built-in taxonomy.
pub fn detect_triggers(message: &str) -> TriggerDetectionResult {
    TriggerClassifier::new().classify(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triggers::taxonomy::TriggerGroup;

    #[test]
    fn test_confusion_is_low_and_clarifies() {
        let r = detect_triggers("I'm a bit confused about this");
        assert!(r.triggered);
        assert_eq!(r.category, Some(TriggerCategory::Confusion));
        assert_eq!(r.matched_keywords, vec!["confused"]);
        assert_eq!(r.severity, Severity::Low);
        assert!(!r.escalation_required);
        assert_eq!(r.suggested_action, SuggestedAction::Clarify);
    }

    #[test]
    fn test_payment_wins_over_security() {
        let r = detect_triggers("my card was charged twice, unauthorized charge");
        assert_eq!(r.category, Some(TriggerCategory::Payment));
        assert_eq!(r.matched_keywords, vec!["unauthorized charge"]);
        assert_eq!(r.severity, Severity::Critical);
        assert!(r.escalation_required);
        assert_eq!(r.suggested_action, SuggestedAction::Escalate);
    }

    #[test]
    fn test_plain_message_continues() {
        let r = detect_triggers("Show me remote data analyst jobs in Berlin");
        assert!(!r.triggered);
        assert_eq!(r.category, None);
        assert!(r.matched_keywords.is_empty());
        assert_eq!(r.severity, Severity::Low);
        assert_eq!(r.suggested_action, SuggestedAction::Continue);
    }

    #[test]
    fn test_case_insensitive() {
        let r = detect_triggers("I WAS HACKED");
        assert_eq!(r.category, Some(TriggerCategory::Security));
        assert_eq!(r.severity, Severity::Critical);
    }

    #[test]
    fn test_three_low_keywords_escalate() {
        let r = detect_triggers("I'm confused, it's unclear and complicated");
        assert_eq!(r.category, Some(TriggerCategory::Confusion));
        assert_eq!(r.matched_keywords.len(), 3);
        assert_eq!(r.severity, Severity::Low);
        assert!(r.escalation_required);
    }

    #[test]
    fn test_only_first_category_keywords_collected() {
        // "error" (errors) comes before "refund" (payment)
        let r = detect_triggers("checkout error, I want a refund");
        assert_eq!(r.category, Some(TriggerCategory::Errors));
        assert_eq!(r.matched_keywords, vec!["error"]);
        assert_eq!(r.severity, Severity::Medium);
        assert!(!r.escalation_required);
    }

    #[test]
    fn test_severity_table() {
        use TriggerCategory::*;
        assert_eq!(Severity::for_category(&Security), Severity::Critical);
        assert_eq!(Severity::for_category(&Payment), Severity::Critical);
        assert_eq!(Severity::for_category(&Escalation), Severity::High);
        assert_eq!(Severity::for_category(&Frustration), Severity::High);
        assert_eq!(Severity::for_category(&Errors), Severity::Medium);
        assert_eq!(Severity::for_category(&Access), Severity::Medium);
        assert_eq!(Severity::for_category(&Confusion), Severity::Low);
        assert_eq!(
            Severity::for_category(&Other("shipping".into())),
            Severity::Low
        );
        assert!(Severity::Low < Severity::Medium && Severity::High < Severity::Critical);
    }

    #[test]
    fn test_custom_taxonomy_order_respected() {
        let taxonomy = TriggerTaxonomy::new(vec![
            TriggerGroup::new("security", &["unauthorized"]),
            TriggerGroup::new("payment", &["unauthorized charge"]),
        ]);
        let r = TriggerClassifier::with_taxonomy(taxonomy)
            .classify("unauthorized charge on my card");
        assert_eq!(r.category, Some(TriggerCategory::Security));
    }

    #[test]
    fn test_summary_format() {
        let r = detect_triggers("I was hacked");
        assert_eq!(
            r.summary(),
            "category=security matched=1 severity=critical action=escalate"
        );
    }
}
