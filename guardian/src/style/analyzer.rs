//! Style Analyzer — communication profile from recent messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GuardError, GuardResult};

const FORMAL_MARKERS: &[&str] = &["please", "thank you", "kindly", "appreciate", "regards"];
const CASUAL_MARKERS: &[&str] = &["hey", "yeah", "cool", "awesome", "thanks"];

const HIGH: f64 = 0.7;
const LOW: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Analytical,
    Empathetic,
    Direct,
    Collaborative,
}

impl fmt::Display for CommunicationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analytical => write!(f, "analytical"),
            Self::Empathetic => write!(f, "empathetic"),
            Self::Direct => write!(f, "direct"),
            Self::Collaborative => write!(f, "collaborative"),
        }
    }
}

/// Observed style of the person on the other end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserStyleProfile {
    /// 0 = casual, 1 = formal.
    pub tone: f64,
    /// 0 = informal, 1 = formal.
    pub formality: f64,
    /// Mean words per message.
    pub response_length: u32,
    pub communication_style: CommunicationStyle,
}

/// Marker tallies behind a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerCounts {
    pub formal: usize,
    pub casual: usize,
}

impl MarkerCounts {
    /// Each marker counts at most once per message.
    pub fn tally<S: AsRef<str>>(messages: &[S]) -> Self {
        messages.iter().fold(Self::default(), |mut acc, msg| {
            let lower = msg.as_ref().to_lowercase();
            acc.formal += FORMAL_MARKERS.iter().filter(|m| lower.contains(*m)).count();
            acc.casual += CASUAL_MARKERS.iter().filter(|m| lower.contains(*m)).count();
            acc
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StyleAnalyzer;

impl StyleAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Profile a message history.
    ///
    /// An empty history yields `response_length == 0`; callers wanting the
    /// blender defaults instead should use [`StyleAnalyzer::try_analyze`].
    pub fn analyze<S: AsRef<str>>(&self, messages: &[S]) -> UserStyleProfile {
        let response_length = mean_word_count(messages);
        let counts = MarkerCounts::tally(messages);

        // ties land on the formal tone branch
        let formality = if counts.formal > counts.casual { HIGH } else { LOW };
        let tone = if counts.casual > counts.formal { LOW } else { HIGH };
        let communication_style = if formality > 0.6 {
            CommunicationStyle::Analytical
        } else {
            CommunicationStyle::Collaborative
        };

        UserStyleProfile {
            tone,
            formality,
            response_length,
            communication_style,
        }
    }

    /// Like [`StyleAnalyzer::analyze`], but an empty history is
    /// [`GuardError::EmptyStyleHistory`].
    pub fn try_analyze<S: AsRef<str>>(&self, messages: &[S]) -> GuardResult<UserStyleProfile> {
        if messages.is_empty() {
            return Err(GuardError::EmptyStyleHistory);
        }
        Ok(self.analyze(messages))
    }
}

fn mean_word_count<S: AsRef<str>>(messages: &[S]) -> u32 {
    if messages.is_empty() {
        return 0;
    }
    let words: usize = messages
        .iter()
        .map(|m| m.as_ref().split_whitespace().count())
        .sum();
    (words as f64 / messages.len() as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_casual_history() {
        let p = StyleAnalyzer::new().analyze(&["hey", "thanks", "cool, awesome"]);
        assert!((p.formality - 0.3).abs() < f64::EPSILON);
        assert!((p.tone - 0.3).abs() < f64::EPSILON);
        assert_eq!(p.communication_style, CommunicationStyle::Collaborative);
        assert_eq!(p.response_length, 1);
    }

    #[test]
    fn test_formal_history() {
        let p = StyleAnalyzer::new().analyze(&[
            "Could you please review my resume? Kind regards",
            "Thank you, I appreciate it",
        ]);
        assert!((p.formality - 0.7).abs() < f64::EPSILON);
        assert!((p.tone - 0.7).abs() < f64::EPSILON);
        assert_eq!(p.communication_style, CommunicationStyle::Analytical);
    }

    #[test]
    fn test_tie_uses_formal_tone_and_low_formality() {
        let p = StyleAnalyzer::new().analyze(&["find data jobs in Lisbon"]);
        assert!((p.formality - 0.3).abs() < f64::EPSILON);
        assert!((p.tone - 0.7).abs() < f64::EPSILON);
        assert_eq!(p.communication_style, CommunicationStyle::Collaborative);
    }

    #[test]
    fn test_mean_word_count_rounds() {
        let p = StyleAnalyzer::new().analyze(&["one two", "one two three"]);
        assert_eq!(p.response_length, 3);
    }

    #[test]
    fn test_empty_history() {
        let empty: [&str; 0] = [];
        let analyzer = StyleAnalyzer::new();
        assert_eq!(analyzer.analyze(&empty).response_length, 0);
        assert!(matches!(
            analyzer.try_analyze(&empty),
            Err(GuardError::EmptyStyleHistory)
        ));
    }

    #[test]
    fn test_marker_counts_once_per_message() {
        let counts = MarkerCounts::tally(&["please please please", "thanks thanks"]);
        assert_eq!(counts, MarkerCounts { formal: 1, casual: 1 });
    }
}
