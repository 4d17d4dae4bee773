//! Adaptive Blender — mixes the fixed persona with the user's observed style.

use serde::{Deserialize, Serialize};

use super::analyzer::UserStyleProfile;

pub const DEFAULT_MIRROR_INTENSITY: f64 = 0.4;

/// The assistant's own style before any mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselinePersona {
    pub tone: f64,
    pub formality: f64,
    pub response_length: u32,
}

impl Default for BaselinePersona {
    fn default() -> Self {
        Self {
            tone: 0.7,
            formality: 0.8,
            response_length: 175,
        }
    }
}

/// Tone/formality/length used for the user side when no profile exists.
#[derive(Debug, Clone, Copy, PartialEq)]
struct UserDefaults {
    tone: f64,
    formality: f64,
    response_length: u32,
}

const USER_DEFAULTS: UserDefaults = UserDefaults {
    tone: 0.5,
    formality: 0.5,
    response_length: 150,
};

/// Blended generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveParameters {
    pub tone: f64,
    pub formality: f64,
    pub response_length: u32,
}

impl AdaptiveParameters {
    pub fn tone_guidance(&self) -> &'static str {
        if self.tone > 0.6 {
            "Maintain professional formality with structured responses"
        } else {
            "Use a more conversational, approachable tone while maintaining expertise"
        }
    }

    pub fn length_guidance(&self) -> &'static str {
        if self.response_length > 200 {
            "Provide comprehensive, detailed explanations"
        } else {
            "Keep responses concise and action-oriented"
        }
    }

    /// Instruction block appended to the system prompt.
    pub fn directive(&self) -> String {
        format!(
            "ADAPTIVE COMMUNICATION STYLE:\n\
             - Tone: {}% formal ({})\n\
             - Response length: Target {} words ({})",
            (self.tone * 100.0).round() as u32,
            self.tone_guidance(),
            self.response_length,
            self.length_guidance(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveBlender {
    baseline: BaselinePersona,
    mirror_intensity: f64,
}

impl Default for AdaptiveBlender {
    fn default() -> Self {
        Self::new(BaselinePersona::default(), DEFAULT_MIRROR_INTENSITY)
    }
}

impl AdaptiveBlender {
    /// `mirror_intensity` is clamped to `[0, 1]`; NaN becomes the default.
    pub fn new(baseline: BaselinePersona, mirror_intensity: f64) -> Self {
        let mirror_intensity = if mirror_intensity.is_nan() {
            DEFAULT_MIRROR_INTENSITY
        } else {
            mirror_intensity.clamp(0.0, 1.0)
        };
        Self {
            baseline,
            mirror_intensity,
        }
    }

    pub fn with_intensity(mirror_intensity: f64) -> Self {
        Self::new(BaselinePersona::default(), mirror_intensity)
    }

    pub fn baseline(&self) -> &BaselinePersona {
        &self.baseline
    }

    pub fn mirror_intensity(&self) -> f64 {
        self.mirror_intensity
    }

    /// Mix baseline and user style. `None` blends against the neutral user
    /// defaults.
    pub fn blend(&self, user: Option<&UserStyleProfile>) -> AdaptiveParameters {
        let (tone, formality, length) = match user {
            Some(u) => (u.tone, u.formality, u.response_length),
            None => (
                USER_DEFAULTS.tone,
                USER_DEFAULTS.formality,
                USER_DEFAULTS.response_length,
            ),
        };
        let i = self.mirror_intensity;
        let b = &self.baseline;

        AdaptiveParameters {
            tone: mix(b.tone, tone, i),
            formality: mix(b.formality, formality, i),
            response_length: mix(f64::from(b.response_length), f64::from(length), i).round()
                as u32,
        }
    }
}

fn mix(base: f64, user: f64, i: f64) -> f64 {
    base * (1.0 - i) + user * i
}
