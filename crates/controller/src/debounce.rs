//! Leading-edge detection for the shared manual-override button.
//!
//! The raw sample is taken once per poll cycle. A press-edge fires only on
//! the transition released -> pressed, so holding the button down yields a
//! single event. Electrical bounce is suppressed by timing rather than by
//! filtering: every poll is followed by `poll_ms`, and an edge adds a further
//! `settle_ms` before the next sample is taken.

use std::time::Duration;

use serde::Serialize;

use crate::config::Timing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonState {
    Released,
    Pressed,
}

/// Button history stored on each plot so edge state survives across polls.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualInputDebouncer {
    raw: bool,
    prev: bool,
}

impl ManualInputDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw sample (`true` = pressed). Returns `true` when this
    /// sample completes a press-edge.
    pub fn sample(&mut self, raw: bool) -> bool {
        self.prev = self.raw;
        self.raw = raw;
        self.raw && !self.prev
    }

    pub fn state(&self) -> ButtonState {
        if self.raw {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        }
    }

    /// Delay to apply before the next sample.
    pub fn delay_after(edge: bool, timing: &Timing) -> Duration {
        if edge {
            timing.settle() + timing.poll()
        } else {
            timing.poll()
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(samples: &[bool]) -> Vec<usize> {
        let mut d = ManualInputDebouncer::new();
        samples
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| d.sample(s).then_some(i))
            .collect()
    }

    #[test]
    fn fires_once_per_press() {
        let seq = [false, false, true, true, false, true];
        assert_eq!(edges(&seq), vec![2, 5]);
    }

    #[test]
    fn sustained_hold_fires_once() {
        let seq = [true; 20];
        assert_eq!(edges(&seq), vec![0]);
    }

    #[test]
    fn release_does_not_fire() {
        let seq = [true, false, false];
        assert_eq!(edges(&seq), vec![0]);
    }

    #[test]
    fn idle_line_never_fires() {
        assert!(edges(&[false; 8]).is_empty());
    }

    #[test]
    fn state_tracks_last_sample() {
        let mut d = ManualInputDebouncer::new();
        assert_eq!(d.state(), ButtonState::Released);
        d.sample(true);
        assert_eq!(d.state(), ButtonState::Pressed);
        d.sample(false);
        assert_eq!(d.state(), ButtonState::Released);
    }

    #[test]
    fn edge_state_persists_between_calls() {
        let mut d = ManualInputDebouncer::new();
        assert!(d.sample(true));
        // Copy carries the stored history with it, like a plot's button field.
        let mut carried = d;
        assert!(!carried.sample(true));
        assert!(!carried.sample(false));
        assert!(carried.sample(true));
    }

    #[test]
    fn edge_adds_settling_delay() {
        let timing = Timing::default();
        assert_eq!(
            ManualInputDebouncer::delay_after(false, &timing),
            Duration::from_millis(50)
        );
        assert_eq!(
            ManualInputDebouncer::delay_after(true, &timing),
            Duration::from_millis(250)
        );
    }
}
