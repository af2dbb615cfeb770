//! Scripted board for tests: queued sensor/button samples in, every output
//! call recorded.

use std::collections::VecDeque;

use super::Board;
use crate::plot::PlotId;

#[derive(Debug, Default)]
pub struct MockBoard {
    pub moisture: VecDeque<i32>,
    pub buttons: VecDeque<bool>,
    pub pump_calls: Vec<bool>,
    pub indicator_calls: Vec<(PlotId, bool)>,
    /// Returned once `moisture` runs dry.
    pub last_moisture: i32,
}

impl MockBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_moisture(readings: &[i32]) -> Self {
        Self {
            moisture: readings.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn push_buttons(&mut self, samples: &[bool]) {
        self.buttons.extend(samples.iter().copied());
    }

    pub fn output_calls(&self) -> usize {
        self.pump_calls.len() + self.indicator_calls.len()
    }
}

impl Board for MockBoard {
    fn read_moisture(&mut self) -> i32 {
        if let Some(v) = self.moisture.pop_front() {
            self.last_moisture = v;
        }
        self.last_moisture
    }

    fn button_active(&mut self) -> bool {
        self.buttons.pop_front().unwrap_or(false)
    }

    fn set_pump(&mut self, on: bool) {
        self.pump_calls.push(on);
    }

    fn set_indicator(&mut self, plot: PlotId, on: bool) {
        self.indicator_calls.push((plot, on));
    }
}
