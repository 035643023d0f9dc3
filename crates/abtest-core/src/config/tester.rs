//! Tester settings file

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::TesterResult;
use crate::types::{Variant, DEFAULT_BYPASS_FADE_MS};

/// File name inside the config directory
pub const CONFIG_FILE: &str = "config.yaml";

/// Default location: `<config dir>/abtest/config.yaml`
/// (`~/.config/abtest/config.yaml` on Linux)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("abtest")
        .join(CONFIG_FILE)
}

/// Settings of one tester setup
///
/// ```yaml
/// variant: x4_stereo
/// bypass_fade_ms: 5.0
/// shuffle_seed: 1234   # omit for a new order every run
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    /// Variant id, short (`x4_stereo`) or full (`ab_tester_x4_stereo`)
    pub variant: String,
    /// Bypass crossfade duration in milliseconds
    pub bypass_fade_ms: f32,
    /// Fixed seed for reproducible blind-test orders
    pub shuffle_seed: Option<u64>,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            variant: "x2_stereo".to_string(),
            bypass_fade_ms: DEFAULT_BYPASS_FADE_MS,
            shuffle_seed: None,
        }
    }
}

impl TesterConfig {
    /// Parsed variant
    pub fn variant(&self) -> TesterResult<Variant> {
        self.variant.parse()
    }

    /// Crossfade time, negative or non-finite values replaced by the default
    pub fn fade_ms(&self) -> f32 {
        if self.bypass_fade_ms.is_finite() && self.bypass_fade_ms >= 0.0 {
            self.bypass_fade_ms
        } else {
            DEFAULT_BYPASS_FADE_MS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config, save_config};
    use crate::error::TesterError;

    #[test]
    fn test_defaults() {
        let config = TesterConfig::default();
        assert_eq!(config.variant().unwrap(), Variant::X2_STEREO);
        assert!((config.fade_ms() - 5.0).abs() < f32::EPSILON);
        assert!(config.shuffle_seed.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "variant: ab_tester_x8_mono\nshuffle_seed: 99\n").unwrap();

        let config: TesterConfig = load_config(&path);
        assert_eq!(config.variant().unwrap(), Variant::X8_MONO);
        assert_eq!(config.shuffle_seed, Some(99));
        assert!((config.bypass_fade_ms - DEFAULT_BYPASS_FADE_MS).abs() < f32::EPSILON);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abtest").join(CONFIG_FILE);
        let config = TesterConfig {
            variant: "x4_mono".into(),
            bypass_fade_ms: 12.5,
            shuffle_seed: Some(7),
        };
        save_config(&config, &path).unwrap();
        assert_eq!(load_config::<TesterConfig>(&path), config);
    }

    #[test]
    fn test_bad_values() {
        let config = TesterConfig {
            variant: "x3_quad".into(),
            bypass_fade_ms: -1.0,
            shuffle_seed: None,
        };
        assert_eq!(config.variant(), Err(TesterError::UnknownVariant("x3_quad".into())));
        assert!((config.fade_ms() - DEFAULT_BYPASS_FADE_MS).abs() < f32::EPSILON);
    }

    #[test]
    fn test_default_path() {
        let path = default_config_path();
        assert!(path.ends_with("abtest/config.yaml"));
    }
}
