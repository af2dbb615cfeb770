//! Bounded system event log and the JSON status snapshot built from it.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Instant;
use time::OffsetDateTime;

use crate::debounce::ButtonState;
use crate::plot::{Mode, Plot, PlotId};

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct SystemEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub kind: EventKind,
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Mode,
    Pump,
    Threshold,
    Error,
    System,
}

pub struct EventLog {
    started_at: Instant,
    events: VecDeque<SystemEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            events: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    pub fn record(&mut self, kind: EventKind, detail: impl Into<String>) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(SystemEvent {
            ts: OffsetDateTime::now_utc(),
            kind,
            detail: detail.into(),
        });
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Events newest first.
    pub fn recent(&self) -> Vec<SystemEvent> {
        self.events.iter().rev().cloned().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// JSON snapshot (what the `status` command prints)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub uptime_secs: u64,
    pub active_plot: Option<PlotId>,
    pub pump_on: bool,
    pub pump_owner: Option<PlotId>,
    pub plots: Vec<PlotStatus>,
    pub events: Vec<SystemEvent>,
}

#[derive(Debug, Serialize)]
pub struct PlotStatus {
    pub id: PlotId,
    pub name: String,
    #[serde(flatten)]
    pub mode: Mode,
    pub threshold: i32,
    pub moisture: i32,
    pub pump_state: bool,
    pub manual_override: bool,
    pub indicator_on: bool,
    pub button: ButtonState,
    pub history: Vec<i32>,
}

impl From<&Plot> for PlotStatus {
    fn from(p: &Plot) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            mode: p.mode,
            threshold: p.threshold,
            moisture: p.current_moisture,
            pump_state: p.pump_state,
            manual_override: p.manual_override,
            indicator_on: p.indicator_on,
            button: p.button.state(),
            history: p.history.snapshot(),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
