//! Style mirroring.
//!
//! [`StyleAnalyzer`] profiles the user's recent messages;
//! [`AdaptiveBlender`] mixes that profile into the fixed persona by
//! `mirror_intensity` and renders the prompt directive.

pub mod analyzer;
pub mod blend;

pub use analyzer::{CommunicationStyle, MarkerCounts, StyleAnalyzer, UserStyleProfile};
pub use blend::{AdaptiveBlender, AdaptiveParameters, BaselinePersona, DEFAULT_MIRROR_INTENSITY};
