//! Bounded FIFO of the thresholds a user has set on a plot.

use std::collections::VecDeque;

/// Maximum number of thresholds retained per plot.
pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct ThresholdHistory {
    entries: VecDeque<i32>,
}

impl ThresholdHistory {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Append `value`, evicting the oldest entry once the log is full.
    pub fn record(&mut self, value: i32) {
        if self.entries.len() >= HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(value);
    }

    /// All stored thresholds, oldest first.
    pub fn snapshot(&self) -> Vec<i32> {
        self.entries.iter().copied().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn latest(&self) -> Option<i32> {
        self.entries.back().copied()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
