//! Port layout for each tester variant
//!
//! Global ports come first, followed by one block of ports per input group.
//! Group numbers in ids are 1-based (`g_1`, `rate_1`, ...).

use super::{PortKind, PortMeta, PortSet};
use crate::types::{db_to_gain, Arity, Variant, RATE_DFL, RATE_MAX, RATE_MIN, RATE_STEP};

/// Channel selector (0 = nothing selected)
pub const SELECTOR: &str = "sel";
/// Blind test on/off
pub const BLIND: &str = "bte";
/// Re-shuffle trigger
pub const SHUFFLE: &str = "shuf";
/// Rating reset trigger
pub const RESET: &str = "rst";
/// Mono mixdown switch (stereo variants only)
pub const MONO: &str = "mono";

/// Maximum input gain (+40 dB)
pub const GAIN_MAX: f32 = 100.0;

/// Meter ceiling (+48 dB)
pub fn meter_max() -> f32 {
    db_to_gain(48.0)
}

/// Gain port of a 1-based group
pub fn gain_id(group: usize) -> String {
    format!("g_{}", group)
}

/// Blind-test participation switch of a 1-based group
pub fn blind_enable_id(group: usize) -> String {
    format!("bte_{}", group)
}

/// Rating port of a 1-based group
pub fn rating_id(group: usize) -> String {
    format!("rate_{}", group)
}

/// Meter port of a 0-based input channel
pub fn meter_id(variant: Variant, channel: usize) -> String {
    match variant.arity() {
        Arity::Mono => format!("ism_{}", channel + 1),
        Arity::Stereo => {
            let side = if channel % 2 == 0 { "l" } else { "r" };
            format!("ism_{}{}", channel / 2 + 1, side)
        }
    }
}

/// Build the full port set of a variant, every port at its default value
pub fn build_ports(variant: Variant) -> PortSet {
    let mut set = PortSet::new();
    let groups = variant.group_count();

    set.add(PortMeta::new(RESET, "Reset channel rating", PortKind::Trigger));
    set.add(PortMeta::new(BLIND, "Blind test enable", PortKind::Switch));
    set.add(PortMeta::new(SHUFFLE, "Re-shuffle channels", PortKind::Trigger));
    set.add(
        PortMeta::new(SELECTOR, "Channel selector", PortKind::Integer)
            .with_range(0.0, groups as f32)
            .with_step(1.0),
    );
    if variant.arity() == Arity::Stereo {
        set.add(PortMeta::new(MONO, "Mono switch", PortKind::Switch));
    }

    for g in 0..groups {
        let n = g + 1;
        set.add(
            PortMeta::new(gain_id(n), format!("Input gain {}", n), PortKind::Control)
                .with_range(0.0, GAIN_MAX)
                .with_default(1.0),
        );
        for c in 0..variant.arity().channels() {
            let channel = g * variant.arity().channels() + c;
            set.add(
                PortMeta::new(
                    meter_id(variant, channel),
                    format!("Input signal meter {}", n),
                    PortKind::Meter,
                )
                .with_range(0.0, meter_max()),
            );
        }
        if variant.has_blind_switches() {
            let enabled = if variant.blind_enabled_by_default(g) { 1.0 } else { 0.0 };
            set.add(
                PortMeta::new(blind_enable_id(n), format!("Blind test enable {}", n), PortKind::Switch)
                    .with_default(enabled),
            );
        }
        set.add(
            PortMeta::new(rating_id(n), format!("Channel blind test rate {}", n), PortKind::Integer)
                .with_range(RATE_MIN as f32, RATE_MAX as f32)
                .with_default(RATE_DFL as f32)
                .with_step(RATE_STEP as f32),
        );
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_layout() {
        let set = build_ports(Variant::X4_MONO);
        assert!(set.get(MONO).is_none());
        assert!(set.get("ism_4").is_some());
        assert!(set.get("bte_4").is_some());
        assert_eq!(set.get("bte_1").unwrap().value(), 1.0);
        assert_eq!(set.get("bte_3").unwrap().value(), 0.0);
        assert_eq!(set.get(SELECTOR).unwrap().meta().max, 4.0);
    }

    #[test]
    fn test_stereo_layout() {
        let set = build_ports(Variant::X2_STEREO);
        assert!(set.get(MONO).is_some());
        assert!(set.get("ism_2l").is_some());
        assert!(set.get("ism_2r").is_some());
        assert!(set.get("bte_1").is_none());
        assert_eq!(set.get("rate_2").unwrap().value(), RATE_DFL as f32);
        assert_eq!(set.get("g_1").unwrap().value(), 1.0);
    }

    #[test]
    fn test_meter_ids() {
        assert_eq!(meter_id(Variant::X8_MONO, 7), "ism_8");
        assert_eq!(meter_id(Variant::X4_STEREO, 0), "ism_1l");
        assert_eq!(meter_id(Variant::X4_STEREO, 5), "ism_3r");
    }
}
