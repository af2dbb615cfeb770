//! The plot entity: one independently watered land unit.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::debounce::ManualInputDebouncer;
use crate::history::ThresholdHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlotId(u8);

impl PlotId {
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which control loop a plot is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum Mode {
    Idle,
    /// `from_auto` is set when a button press interrupted an Auto session;
    /// leaving Manual then ends that session as well.
    Manual { from_auto: bool },
    Auto,
}

#[derive(Debug, Clone)]
pub struct Plot {
    pub id: PlotId,
    pub name: String,
    pub mode: Mode,
    pub threshold: i32,
    pub current_moisture: i32,
    pub pump_state: bool,
    pub manual_override: bool,
    pub indicator_on: bool,
    pub history: ThresholdHistory,
    pub button: ManualInputDebouncer,
}

impl Plot {
    pub fn new(id: PlotId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            mode: Mode::Idle,
            threshold: 0,
            current_moisture: 0,
            pump_state: false,
            manual_override: false,
            indicator_on: false,
            history: ThresholdHistory::new(),
            button: ManualInputDebouncer::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.mode == Mode::Idle
    }
}
