//! Channel selector state

/// Active input group derived from the raw selector control.
///
/// `0` means nothing is selected; `k > 0` selects the k-th input group,
/// whatever the group arity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectorState {
    active: usize,
}

impl SelectorState {
    /// Derive the state from a raw control value: `max(0, round(value))`
    pub fn from_value(value: f32) -> Self {
        let active = if value.is_nan() { 0.0 } else { value.round().max(0.0) };
        Self { active: active as usize }
    }

    /// Recompute from a raw value, returning `true` if the selection changed
    pub fn update(&mut self, value: f32) -> bool {
        let next = Self::from_value(value);
        let changed = next != *self;
        *self = next;
        changed
    }

    /// The selected 1-based group, or 0
    pub fn value(&self) -> usize {
        self.active
    }

    /// The selected 1-based group, if any
    pub fn active_group(&self) -> Option<usize> {
        (self.active > 0).then_some(self.active)
    }

    /// Whether the given 1-based group is audible
    pub fn is_active(&self, group: usize) -> bool {
        self.active != 0 && self.active == group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_and_clamping() {
        assert_eq!(SelectorState::from_value(2.4).value(), 2);
        assert_eq!(SelectorState::from_value(2.5).value(), 3);
        assert_eq!(SelectorState::from_value(-3.0).value(), 0);
        assert_eq!(SelectorState::from_value(f32::NAN).value(), 0);
    }

    #[test]
    fn test_exactly_one_group_active() {
        let groups = 8;
        for s in 0..=groups {
            let state = SelectorState::from_value(s as f32);
            let active = (1..=groups).filter(|&g| state.is_active(g)).count();
            if s == 0 {
                assert_eq!(active, 0);
                assert_eq!(state.active_group(), None);
            } else {
                assert_eq!(active, 1);
                assert_eq!(state.active_group(), Some(s));
            }
        }
    }

    #[test]
    fn test_update_reports_change() {
        let mut state = SelectorState::default();
        assert!(state.update(1.0));
        assert!(!state.update(1.2));
        assert!(state.update(0.0));
    }
}
