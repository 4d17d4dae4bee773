//! Guardian configuration.
//!
//! Defaults match the production chat route. Overrides come from a TOML file
//! ([`GuardianConfig::from_toml_file`]) and/or `GUARDIAN_*` environment
//! variables ([`GuardianConfig::from_env`]). Unparseable env values are
//! ignored.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::HealthLimits;
use crate::error::{GuardError, GuardResult};
use crate::escalation::{PolicyConfig, RepeatEscalation, DEFAULT_HOLD_MS, MAX_HOLD_MS};
use crate::style::DEFAULT_MIRROR_INTENSITY;
use crate::triggers::TriggerTaxonomy;

pub const DEFAULT_FEATURE: &str = "ai-chat";
pub const DEFAULT_RATE_LIMIT: u32 = 20;
pub const DEFAULT_WINDOW_MS: u64 = 60_000;
/// One day.
pub const MAX_WINDOW_MS: u64 = 86_400_000;
pub const DEFAULT_SUPPORT_CONTACT: &str = "support@jobpilot.com";
pub const THROTTLE_MESSAGE: &str = "Too many requests. Please try again in a minute.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    /// Feature prefix of the rate-limit key.
    pub feature: String,
    /// Requests admitted per window.
    pub rate_limit: u32,
    pub window_ms: u64,
    /// 0 = pure persona, 1 = pure mirror.
    pub mirror_intensity: f64,
    /// Requested hold before handoff; capped at 60s when the hold runs.
    pub hold_ms: u64,
    pub support_contact: String,
    pub throttle_message: String,
    pub policy: PolicyConfig,
    /// Replaces the built-in taxonomy. Group order is evaluation order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<TriggerTaxonomy>,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            feature: DEFAULT_FEATURE.to_string(),
            rate_limit: DEFAULT_RATE_LIMIT,
            window_ms: DEFAULT_WINDOW_MS,
            mirror_intensity: DEFAULT_MIRROR_INTENSITY,
            hold_ms: DEFAULT_HOLD_MS,
            support_contact: DEFAULT_SUPPORT_CONTACT.to_string(),
            throttle_message: THROTTLE_MESSAGE.to_string(),
            policy: PolicyConfig::default(),
            taxonomy: None,
        }
    }
}

impl GuardianConfig {
    /// Defaults with `GUARDIAN_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Read a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> GuardResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| GuardError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> GuardResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(feature) = lookup("GUARDIAN_FEATURE") {
            self.feature = feature;
        }
        if let Some(n) = lookup("GUARDIAN_RATE_LIMIT").and_then(|v| v.parse().ok()) {
            self.rate_limit = n;
        }
        if let Some(n) = lookup("GUARDIAN_WINDOW_MS").and_then(|v| v.parse().ok()) {
            self.window_ms = n;
        }
        if let Some(n) = lookup("GUARDIAN_MIRROR_INTENSITY").and_then(|v| v.parse().ok()) {
            self.mirror_intensity = n;
        }
        if let Some(n) = lookup("GUARDIAN_HOLD_MS").and_then(|v| v.parse().ok()) {
            self.hold_ms = n;
        }
        if let Some(contact) = lookup("GUARDIAN_SUPPORT_CONTACT") {
            self.support_contact = contact;
        }
        if let Some(n) = lookup("GUARDIAN_ESCALATION_COOLDOWN_MS").and_then(|v| v.parse().ok()) {
            self.policy.repeat = RepeatEscalation::Cooldown { cooldown_ms: n };
        }
        if let Some(n) = lookup("GUARDIAN_MAX_ERRORS").and_then(|v| v.parse().ok()) {
            self.policy.health.max_errors = n;
        }
        if let Some(n) = lookup("GUARDIAN_MAX_SESSION_MS").and_then(|v| v.parse().ok()) {
            self.policy.health.max_session_ms = n;
        }
    }

    pub fn validate(&self) -> GuardResult<()> {
        if self.feature.trim().is_empty() {
            return Err(GuardError::InvalidConfig("feature must not be empty".into()));
        }
        if self.feature.contains(':') {
            return Err(GuardError::InvalidConfig(format!(
                "feature '{}' must not contain ':'",
                self.feature
            )));
        }
        if self.window_ms == 0 || self.window_ms > MAX_WINDOW_MS {
            return Err(GuardError::InvalidConfig(format!(
                "window_ms must be within 1..={MAX_WINDOW_MS}, got {}",
                self.window_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.mirror_intensity) {
            return Err(GuardError::InvalidConfig(format!(
                "mirror_intensity must be within [0, 1], got {}",
                self.mirror_intensity
            )));
        }
        if self.hold_ms > MAX_HOLD_MS {
            return Err(GuardError::InvalidConfig(format!(
                "hold_ms must be <= {MAX_HOLD_MS}, got {}",
                self.hold_ms
            )));
        }
        if self.support_contact.trim().is_empty() {
            return Err(GuardError::InvalidConfig(
                "support_contact must not be empty".into(),
            ));
        }
        if let Some(taxonomy) = &self.taxonomy {
            if taxonomy.is_empty() {
                return Err(GuardError::InvalidConfig(
                    "taxonomy must contain at least one keyword".into(),
                ));
            }
            // "" is a substring of every message
            if let Some(group) = taxonomy
                .groups()
                .iter()
                .find(|g| g.keywords.iter().any(|k| k.trim().is_empty()))
            {
                return Err(GuardError::InvalidConfig(format!(
                    "taxonomy group '{}' has a blank keyword",
                    group.category.as_str()
                )));
            }
        }
        let HealthLimits {
            max_errors,
            max_session_ms,
        } = self.policy.health;
        if max_errors == 0 || max_session_ms == 0 {
            return Err(GuardError::InvalidConfig(
                "health limits must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GuardianConfig::default();
        assert_eq!(config.feature, "ai-chat");
        assert_eq!(config.rate_limit, 20);
        assert_eq!(config.window_ms, 60_000);
        assert_eq!(config.hold_ms, 30_000);
        assert_eq!(config.support_contact, "support@jobpilot.com");
        assert_eq!(config.policy.repeat, RepeatEscalation::Independent);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            ("GUARDIAN_RATE_LIMIT", "5"),
            ("GUARDIAN_WINDOW_MS", "not-a-number"),
            ("GUARDIAN_SUPPORT_CONTACT", "help@example.com"),
            ("GUARDIAN_ESCALATION_COOLDOWN_MS", "120000"),
        ]
        .into_iter()
        .collect();

        let mut config = GuardianConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.window_ms, 60_000);
        assert_eq!(config.support_contact, "help@example.com");
        assert_eq!(
            config.policy.repeat,
            RepeatEscalation::Cooldown {
                cooldown_ms: 120_000
            }
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = GuardianConfig::from_toml_str(
            r#"
            rate_limit = 10
            mirror_intensity = 0.25

            [policy.repeat]
            mode = "cooldown"
            cooldown_ms = 300000
            "#,
        )
        .unwrap();
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.mirror_intensity, 0.25);
        assert_eq!(config.window_ms, 60_000);
        assert_eq!(
            config.policy.repeat,
            RepeatEscalation::Cooldown {
                cooldown_ms: 300_000
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            GuardianConfig {
                feature: "ai:chat".into(),
                ..Default::default()
            },
            GuardianConfig {
                window_ms: 0,
                ..Default::default()
            },
            GuardianConfig {
                mirror_intensity: 1.5,
                ..Default::default()
            },
            GuardianConfig {
                hold_ms: 90_000,
                ..Default::default()
            },
            GuardianConfig {
                window_ms: u64::MAX,
                ..Default::default()
            },
            GuardianConfig {
                window_ms: MAX_WINDOW_MS + 1,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(GuardError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_custom_taxonomy_from_toml() {
        let config = GuardianConfig::from_toml_str(
            r#"
            [[taxonomy.groups]]
            category = "shipping"
            keywords = ["Late Delivery", "lost parcel"]

            [[taxonomy.groups]]
            category = "payment"
            keywords = ["refund"]
            "#,
        )
        .unwrap();
        let taxonomy = config.taxonomy.unwrap();
        let order: Vec<&str> = taxonomy.categories().map(|c| c.as_str()).collect();
        assert_eq!(order, ["shipping", "payment"]);
        assert_eq!(taxonomy.groups()[0].keywords[0], "late delivery");

        let empty = GuardianConfig::from_toml_str("[taxonomy]\ngroups = []\n");
        assert!(matches!(empty, Err(GuardError::InvalidConfig(_))));
    }

    #[test]
    fn test_window_bound_is_inclusive() {
        let config = GuardianConfig {
            window_ms: MAX_WINDOW_MS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let mut env_config = GuardianConfig::default();
        env_config.apply_env(|k| {
            (k == "GUARDIAN_WINDOW_MS").then(|| u64::MAX.to_string())
        });
        assert!(matches!(
            env_config.validate(),
            Err(GuardError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_blank_taxonomy_keyword_rejected() {
        for keyword in ["\"\"", "\"   \""] {
            let raw = format!(
                "[[taxonomy.groups]]\ncategory = \"shipping\"\nkeywords = [\"late delivery\", {keyword}]\n"
            );
            let err = GuardianConfig::from_toml_str(&raw).unwrap_err();
            assert!(
                matches!(err, GuardError::InvalidConfig(ref msg) if msg.contains("shipping")),
                "{keyword} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_toml_parse_error_is_typed() {
        let err = GuardianConfig::from_toml_str("rate_limit = \"lots\"").unwrap_err();
        assert!(matches!(err, GuardError::ConfigParse(_)));
    }
}
