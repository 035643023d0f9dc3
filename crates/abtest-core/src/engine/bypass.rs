//! Bypass crossfade - click-free switching of a channel in and out
//!
//! Instead of muting instantly, the channel gain slides linearly between 0
//! and 1 over a fixed duration. The duration is specified in milliseconds and
//! converted to a per-sample step whenever the sample rate changes, so the
//! fade sounds the same at every rate.

use crate::types::{Sample, DEFAULT_BYPASS_FADE_MS, DEFAULT_SAMPLE_RATE};

/// Per-channel bypass crossfade
#[derive(Debug, Clone)]
pub struct Bypass {
    /// Current fade position (0.0 = silent, 1.0 = fully audible)
    gain: f32,
    /// Fade destination
    target: f32,
    /// Gain change per sample
    delta: f32,
    /// Fade duration in milliseconds
    fade_ms: f32,
}

impl Bypass {
    /// Create a bypassed (silent) crossfade for the given sample rate
    pub fn new(sample_rate: u32, fade_ms: f32) -> Self {
        let mut bypass = Self {
            gain: 0.0,
            target: 0.0,
            delta: 1.0,
            fade_ms: fade_ms.max(0.0),
        };
        bypass.init(sample_rate);
        bypass
    }

    /// Recompute the fade step for a new sample rate.
    ///
    /// The current fade position is kept, so a running fade just continues at
    /// the new speed.
    pub fn init(&mut self, sample_rate: u32) {
        let fade_samples = self.fade_ms * 0.001 * sample_rate.max(1) as f32;
        self.delta = if fade_samples > 1.0 { 1.0 / fade_samples } else { 1.0 };
    }

    /// Start fading towards the bypassed (`true`) or active (`false`) state.
    ///
    /// Returns `true` if the target changed.
    pub fn set_bypass(&mut self, bypass: bool) -> bool {
        let target = if bypass { 0.0 } else { 1.0 };
        let changed = target != self.target;
        self.target = target;
        changed
    }

    /// Jump to a state without fading
    pub fn reset(&mut self, bypass: bool) {
        self.target = if bypass { 0.0 } else { 1.0 };
        self.gain = self.target;
    }

    /// Whether the channel is bypassed (or fading towards it)
    pub fn is_bypassed(&self) -> bool {
        self.target == 0.0
    }

    /// Whether a fade is in progress
    pub fn is_fading(&self) -> bool {
        self.gain != self.target
    }

    /// Current fade position
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Per-sample gain step
    pub fn step(&self) -> f32 {
        self.delta
    }

    /// Apply the crossfade in place; a bypassed channel fades to silence
    pub fn process(&mut self, buffer: &mut [Sample]) {
        if !self.is_fading() {
            if self.gain == 0.0 {
                buffer.fill(0.0);
            }
            return;
        }

        for sample in buffer.iter_mut() {
            if self.gain < self.target {
                self.gain = (self.gain + self.delta).min(self.target);
            } else if self.gain > self.target {
                self.gain = (self.gain - self.delta).max(self.target);
            }
            *sample *= self.gain;
        }
    }
}

impl Default for Bypass {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_BYPASS_FADE_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_silent() {
        let mut bypass = Bypass::new(48000, 5.0);
        let mut buffer = vec![1.0; 16];
        bypass.process(&mut buffer);
        assert!(buffer.iter().all(|&s| s == 0.0));
        assert!(bypass.is_bypassed());
    }

    #[test]
    fn test_reset_is_instant() {
        let mut bypass = Bypass::new(48000, 5.0);
        bypass.reset(false);
        let mut buffer = vec![0.5; 8];
        bypass.process(&mut buffer);
        assert!(buffer.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_fade_in_is_gradual() {
        // 5 ms at 48 kHz = 240 samples
        let mut bypass = Bypass::new(48000, 5.0);
        assert!(bypass.set_bypass(false));
        assert!(!bypass.set_bypass(false));

        let mut buffer = vec![1.0; 480];
        bypass.process(&mut buffer);

        assert!(buffer[0] > 0.0 && buffer[0] < 0.01);
        for pair in buffer.windows(2) {
            assert!(pair[1] >= pair[0]);
            assert!(pair[1] - pair[0] <= bypass.step() + 1e-6);
        }
        assert_eq!(buffer[479], 1.0);
        assert!(!bypass.is_fading());
    }

    #[test]
    fn test_fade_out_reaches_silence() {
        let mut bypass = Bypass::new(48000, 5.0);
        bypass.reset(false);
        bypass.set_bypass(true);

        let mut buffer = vec![1.0; 480];
        bypass.process(&mut buffer);
        assert!(buffer[0] < 1.0 && buffer[0] > 0.99);
        assert_eq!(buffer[479], 0.0);
    }

    #[test]
    fn test_sample_rate_change_keeps_position() {
        let mut bypass = Bypass::new(48000, 5.0);
        bypass.set_bypass(false);
        let mut buffer = vec![1.0; 120];
        bypass.process(&mut buffer);
        let position = bypass.gain();

        bypass.init(96000);
        assert_eq!(bypass.gain(), position);
        assert!((bypass.step() - 1.0 / 480.0).abs() < 1e-7);
    }

    #[test]
    fn test_zero_fade_switches_within_one_sample() {
        let mut bypass = Bypass::new(48000, 0.0);
        bypass.set_bypass(false);
        let mut buffer = vec![1.0; 4];
        bypass.process(&mut buffer);
        assert_eq!(buffer, vec![1.0; 4]);
    }
}
