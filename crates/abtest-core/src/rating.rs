//! Channel ratings
//!
//! Each input group has one rating port (`rate_N`). The UI shows it twice:
//! once in the ordinary channel strip and once in the blind-test grid. Both
//! are rows of indicator buttons; indicator `i` stands for the rating
//! `RATE_MIN + i * RATE_STEP` and is lit when the rating reaches it.
//!
//! The port is the only source of truth. Views are never written directly;
//! they are recomputed from the port value after every change, so the two
//! rows cannot disagree.

use std::sync::Arc;

use crate::error::TesterResult;
use crate::port::{layout, Port, PortId, PortSet};
use crate::types::{Variant, RATE_MAX, RATE_MIN, RATE_STEP};

/// Number of indicators per view
pub const INDICATOR_COUNT: usize = ((RATE_MAX - RATE_MIN) / RATE_STEP + 1) as usize;

/// Rating value represented by indicator `i`
pub fn threshold(indicator: usize) -> u32 {
    RATE_MIN + indicator as u32 * RATE_STEP
}

/// Which of the two displays of a rating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingView {
    /// Channel strip
    Ordinary,
    /// Blind-test grid
    Blind,
}

/// Lit state of one row of indicators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSet {
    lit: [bool; INDICATOR_COUNT],
}

impl IndicatorSet {
    fn new() -> Self {
        Self {
            lit: [false; INDICATOR_COUNT],
        }
    }

    fn update(&mut self, rating: u32) {
        for (i, lit) in self.lit.iter_mut().enumerate() {
            *lit = threshold(i) <= rating;
        }
    }

    pub fn is_lit(&self, indicator: usize) -> bool {
        self.lit.get(indicator).copied().unwrap_or(false)
    }

    /// Lit flags in indicator order
    pub fn lit(&self) -> &[bool] {
        &self.lit
    }

    pub fn lit_count(&self) -> usize {
        self.lit.iter().filter(|&&l| l).count()
    }
}

/// A rating port and its two views
#[derive(Debug)]
pub struct RatingBinding {
    port: Arc<Port>,
    ordinary: IndicatorSet,
    blind: IndicatorSet,
}

impl RatingBinding {
    pub fn new(port: Arc<Port>) -> Self {
        let mut binding = Self {
            port,
            ordinary: IndicatorSet::new(),
            blind: IndicatorSet::new(),
        };
        binding.sync();
        binding
    }

    /// Current rating
    pub fn value(&self) -> u32 {
        let value = self.port.value().round() as u32;
        value.clamp(RATE_MIN, RATE_MAX)
    }

    pub fn port(&self) -> &Arc<Port> {
        &self.port
    }

    pub fn view(&self, view: RatingView) -> &IndicatorSet {
        match view {
            RatingView::Ordinary => &self.ordinary,
            RatingView::Blind => &self.blind,
        }
    }

    /// Indicator clicked in either view
    pub fn click(&mut self, indicator: usize) {
        if indicator >= INDICATOR_COUNT {
            return;
        }
        self.port.set_value(threshold(indicator) as f32);
        self.port.notify_all();
        self.sync();
    }

    /// Back to the default rating
    pub fn reset(&mut self) {
        self.port.reset();
        self.port.notify_all();
        self.sync();
    }

    /// Recompute both views from the port value
    pub fn sync(&mut self) {
        let rating = self.value();
        self.ordinary.update(rating);
        self.blind.update(rating);
    }
}

/// Ratings of every group of a tester
#[derive(Debug)]
pub struct RatingRegistry {
    bindings: Vec<RatingBinding>,
}

impl RatingRegistry {
    pub fn new(variant: Variant, ports: &PortSet) -> TesterResult<Self> {
        let bindings = (1..=variant.group_count())
            .map(|g| ports.port(&layout::rating_id(g)).map(RatingBinding::new))
            .collect::<TesterResult<Vec<_>>>()?;
        Ok(Self { bindings })
    }

    /// Binding of a 0-based group
    pub fn get(&self, group: usize) -> Option<&RatingBinding> {
        self.bindings.get(group)
    }

    pub fn get_mut(&mut self, group: usize) -> Option<&mut RatingBinding> {
        self.bindings.get_mut(group)
    }

    /// Ratings in group order
    pub fn values(&self) -> Vec<u32> {
        self.bindings.iter().map(RatingBinding::value).collect()
    }

    pub fn reset_all(&mut self) {
        for binding in &mut self.bindings {
            binding.reset();
        }
        log::debug!("[RATING] All {} ratings reset", self.bindings.len());
    }

    /// Refresh views after a port notification; true if it was a rating port
    pub fn on_port_notify(&mut self, port: PortId) -> bool {
        match self.bindings.iter_mut().find(|b| b.port.index() == port) {
            Some(binding) => {
                binding.sync();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
