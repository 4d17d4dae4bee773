//! Trigger Taxonomy — ordered category → keyword table
//!
//! The classifier stops at the first category with a match, so the order of
//! [`TriggerTaxonomy::categories`] is policy. It is kept as a `Vec`, never a
//! map.

use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Risk/attention category a keyword belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerCategory {
    Errors,
    Confusion,
    Frustration,
    Escalation,
    Payment,
    Security,
    Access,
    /// Category from a custom taxonomy with no fixed severity or template.
    Other(String),
}

impl TriggerCategory {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Errors => "errors",
            Self::Confusion => "confusion",
            Self::Frustration => "frustration",
            Self::Escalation => "escalation",
            Self::Payment => "payment",
            Self::Security => "security",
            Self::Access => "access",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for TriggerCategory {
    fn from(name: String) -> Self {
        match name.to_lowercase().as_str() {
            "errors" => Self::Errors,
            "confusion" => Self::Confusion,
            "frustration" => Self::Frustration,
            "escalation" => Self::Escalation,
            "payment" => Self::Payment,
            "security" => Self::Security,
            "access" => Self::Access,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for TriggerCategory {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<TriggerCategory> for String {
    fn from(category: TriggerCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for TriggerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerGroup {
    pub category: TriggerCategory,
    /// Lowercase substrings, in declaration order.
    #[serde(deserialize_with = "lowercase_keywords")]
    pub keywords: Vec<String>,
}

fn lowercase_keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let keywords = Vec::<String>::deserialize(deserializer)?;
    Ok(keywords.into_iter().map(|k| k.to_lowercase()).collect())
}

impl TriggerGroup {
    pub fn new(category: impl Into<TriggerCategory>, keywords: &[&str]) -> Self {
        Self {
            category: category.into(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Keywords of this group that occur in an already-lowercased message.
    pub fn matches_in(&self, lowered: &str) -> Vec<String> {
        self.keywords
            .iter()
            .filter(|k| lowered.contains(k.as_str()))
            .cloned()
            .collect()
    }
}

/// Ordered list of trigger groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerTaxonomy {
    groups: Vec<TriggerGroup>,
}

const ERRORS: &[&str] = &[
    "not working",
    "broken",
    "error",
    "doesn't work",
    "can't find",
    "stuck",
    "loading forever",
    "keeps crashing",
    "won't load",
    "same thing",
    "repeating",
    "loop",
    "again and again",
    "tried multiple times",
    "still not working",
    "blank page",
    "white screen",
    "404",
    "500",
    "server error",
];

const CONFUSION: &[&str] = &[
    "confused",
    "don't understand",
    "makes no sense",
    "unclear",
    "what do you mean",
    "explain again",
    "not clear",
    "complicated",
    "too difficult",
    "can't figure out",
    "lost",
    "where am i",
    "how do i",
    "what is this",
    "why",
];

const FRUSTRATION: &[&str] = &[
    "frustrated",
    "annoyed",
    "angry",
    "terrible",
    "awful",
    "worst",
    "hate",
    "useless",
    "waste of time",
    "disappointed",
    "fed up",
    "sick of",
    "ridiculous",
    "pathetic",
    "garbage",
];

const ESCALATION: &[&str] = &[
    "help me",
    "need assistance",
    "support",
    "talk to human",
    "real person",
    "customer service",
    "representative",
    "agent",
    "manager",
    "escalate",
    "complaint",
    "speak to someone",
    "human help",
    "live chat",
    "call me",
];

const PAYMENT: &[&str] = &[
    "refund",
    "cancel",
    "unsubscribe",
    "payment failed",
    "checkout error",
    "billing issue",
    "charge problem",
    "subscription error",
    "renewal failed",
    "card declined",
    "payment method",
    "invoice missing",
    "overcharged",
    "wrong amount",
    "unauthorized charge",
];

const SECURITY: &[&str] = &[
    "privacy concern",
    "data breach",
    "security issue",
    "unauthorized",
    "hacked",
    "suspicious",
    "scam",
    "fraud",
    "fake",
    "phishing",
];

const ACCESS: &[&str] = &[
    "can't access",
    "locked out",
    "password reset",
    "forgot password",
    "can't login",
    "authentication failed",
    "session expired",
    "timeout",
    "logged out",
    "access denied",
];

static DEFAULT_TAXONOMY: LazyLock<TriggerTaxonomy> = LazyLock::new(|| {
    TriggerTaxonomy::new(vec![
        TriggerGroup::new(TriggerCategory::Errors, ERRORS),
        TriggerGroup::new(TriggerCategory::Confusion, CONFUSION),
        TriggerGroup::new(TriggerCategory::Frustration, FRUSTRATION),
        TriggerGroup::new(TriggerCategory::Escalation, ESCALATION),
        TriggerGroup::new(TriggerCategory::Payment, PAYMENT),
        TriggerGroup::new(TriggerCategory::Security, SECURITY),
        TriggerGroup::new(TriggerCategory::Access, ACCESS),
    ])
});

impl TriggerTaxonomy {
    pub fn new(groups: Vec<TriggerGroup>) -> Self {
        Self { groups }
    }

    /// The built-in, process-wide taxonomy.
    ///
    /// Order: errors, confusion, frustration, escalation, payment, security,
    /// access. Payment precedes security, so "unauthorized charge" is a
    /// billing problem rather than a security one.
    pub fn builtin() -> &'static TriggerTaxonomy {
        &DEFAULT_TAXONOMY
    }

    pub fn groups(&self) -> &[TriggerGroup] {
        &self.groups
    }

    /// Categories in evaluation order.
    pub fn categories(&self) -> impl Iterator<Item = &TriggerCategory> {
        self.groups.iter().map(|g| &g.category)
    }

    /// Total keyword count across all groups.
    pub fn keyword_count(&self) -> usize {
        self.groups.iter().map(|g| g.keywords.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.keywords.is_empty())
    }
}

impl Default for TriggerTaxonomy {
    fn default() -> Self {
        Self::builtin().clone()
    }
}
