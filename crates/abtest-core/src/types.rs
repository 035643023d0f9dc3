//! Common types for the A/B tester
//!
//! Fundamental constants and the catalogue of tester variants. A variant
//! fixes how many input groups exist, whether each group is mono or stereo,
//! and which groups take part in a blind test by default.

use std::fmt;
use std::str::FromStr;

use crate::error::TesterError;

/// Audio sample type (32-bit float, planar host buffers)
pub type Sample = f32;

/// Default sample rate until the host reports the real one
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Frames processed per internal block; bounds the scratch buffer size
pub const BLOCK_SIZE: usize = 1024;

/// Maximum number of input groups (a packed shuffle word holds 8 slots)
pub const MAX_GROUPS: usize = 8;

/// Lowest rating value
pub const RATE_MIN: u32 = 1;
/// Highest rating value
pub const RATE_MAX: u32 = 10;
/// Rating assigned on creation and on reset
pub const RATE_DFL: u32 = 1;
/// Distance between two rating indicators
pub const RATE_STEP: u32 = 1;

/// Default bypass crossfade duration in milliseconds
pub const DEFAULT_BYPASS_FADE_MS: f32 = 5.0;

/// Channel arity of every input group in a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Mono,
    Stereo,
}

impl Arity {
    /// Number of audio channels per group (and number of outputs)
    pub fn channels(&self) -> usize {
        match self {
            Arity::Mono => 1,
            Arity::Stereo => 2,
        }
    }
}

/// A tester variant: x2, x4 or x8 input groups, mono or stereo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variant {
    groups: usize,
    arity: Arity,
}

impl Variant {
    pub const X2_MONO: Variant = Variant { groups: 2, arity: Arity::Mono };
    pub const X4_MONO: Variant = Variant { groups: 4, arity: Arity::Mono };
    pub const X8_MONO: Variant = Variant { groups: 8, arity: Arity::Mono };
    pub const X2_STEREO: Variant = Variant { groups: 2, arity: Arity::Stereo };
    pub const X4_STEREO: Variant = Variant { groups: 4, arity: Arity::Stereo };
    pub const X8_STEREO: Variant = Variant { groups: 8, arity: Arity::Stereo };

    /// All shipped variants
    pub const ALL: [Variant; 6] = [
        Variant::X2_MONO,
        Variant::X4_MONO,
        Variant::X8_MONO,
        Variant::X2_STEREO,
        Variant::X4_STEREO,
        Variant::X8_STEREO,
    ];

    /// Number of selectable input groups
    pub fn group_count(&self) -> usize {
        self.groups
    }

    /// Group arity
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Number of audio input channels (groups × arity)
    pub fn input_count(&self) -> usize {
        self.groups * self.arity.channels()
    }

    /// Number of audio output channels
    pub fn output_count(&self) -> usize {
        self.arity.channels()
    }

    /// Whether each group has its own blind-test enable switch.
    ///
    /// The x2 variants have none: both groups always take part.
    pub fn has_blind_switches(&self) -> bool {
        self.groups > 2
    }

    /// Default blind-test participation of a 0-based group
    pub fn blind_enabled_by_default(&self, group: usize) -> bool {
        !self.has_blind_switches() || group < 2
    }

    /// Canonical identifier, e.g. `ab_tester_x4_stereo`
    pub fn id(&self) -> String {
        let arity = match self.arity {
            Arity::Mono => "mono",
            Arity::Stereo => "stereo",
        };
        format!("ab_tester_x{}_{}", self.groups, arity)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for Variant {
    type Err = TesterError;

    /// Accepts the full id (`ab_tester_x4_mono`) or the short form (`x4_mono`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let short = s.strip_prefix("ab_tester_").unwrap_or(s);
        let id = format!("ab_tester_{}", short);
        Variant::ALL
            .iter()
            .copied()
            .find(|v| v.id() == id)
            .ok_or_else(|| TesterError::UnknownVariant(s.to_string()))
    }
}

/// Convert decibels to a linear gain factor
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a linear gain factor to decibels
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.max(1e-10).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_counts() {
        assert_eq!(Variant::X4_MONO.input_count(), 4);
        assert_eq!(Variant::X4_MONO.output_count(), 1);
        assert_eq!(Variant::X8_STEREO.input_count(), 16);
        assert_eq!(Variant::X8_STEREO.output_count(), 2);
        assert_eq!(Variant::X2_STEREO.group_count(), 2);
    }

    #[test]
    fn test_blind_defaults() {
        assert!(!Variant::X2_MONO.has_blind_switches());
        assert!(Variant::X2_MONO.blind_enabled_by_default(1));

        let v = Variant::X8_MONO;
        assert!(v.has_blind_switches());
        assert!(v.blind_enabled_by_default(0));
        assert!(v.blind_enabled_by_default(1));
        assert!(!v.blind_enabled_by_default(2));
        assert!(!v.blind_enabled_by_default(7));
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!("x4_stereo".parse::<Variant>().unwrap(), Variant::X4_STEREO);
        assert_eq!("ab_tester_x2_mono".parse::<Variant>().unwrap(), Variant::X2_MONO);
        assert!("x3_mono".parse::<Variant>().is_err());
        assert!("4_mono".parse::<Variant>().is_err());
    }

    #[test]
    fn test_db_conversion() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 0.001);
        assert!((db_to_gain(6.0) - 2.0).abs() < 0.01);
        assert!((gain_to_db(0.5) + 6.02).abs() < 0.01);
    }
}
