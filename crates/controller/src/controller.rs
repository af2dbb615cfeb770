//! Per-plot control state machine.
//!
//! ## States
//!
//! ```text
//!          enter_manual                      enter_auto(threshold)
//! Idle ──────────────────▶ Manual      Idle ──────────────────────▶ Auto
//!  ▲                         │          ▲                             │
//!  └──────[return]───────────┘          └──────────[return]───────────┤
//!  ▲                                                                  │
//!  └──[return]── Manual { from_auto } ◀──────[press-edge]─────────────┘
//! ```
//!
//! Each call to [`PlotController::tick`] runs one poll cycle and reports how
//! long the caller should wait before the next one. A press during Auto hands
//! control to Manual; when that Manual session ends, the Auto session is over
//! too and the plot returns to Idle.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::board::Board;
use crate::config::ControlSettings;
use crate::debounce::ManualInputDebouncer;
use crate::error::ControllerError;
use crate::plot::{Mode, Plot};
use crate::pump::PumpActuator;
use crate::status::{EventKind, EventLog};

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Mode still running; wait this long before the next tick.
    Continue(Duration),
    /// No mode running (either never started or just exited).
    Idle,
}

/// Borrowed view of one plot plus the shared hardware it is allowed to drive.
pub struct PlotController<'a, B: Board> {
    plot: &'a mut Plot,
    pump: &'a mut PumpActuator,
    board: &'a mut B,
    settings: &'a ControlSettings,
    events: &'a mut EventLog,
}

impl<'a, B: Board> PlotController<'a, B> {
    pub fn new(
        plot: &'a mut Plot,
        pump: &'a mut PumpActuator,
        board: &'a mut B,
        settings: &'a ControlSettings,
        events: &'a mut EventLog,
    ) -> Self {
        Self {
            plot,
            pump,
            board,
            settings,
            events,
        }
    }

    // -----------------------------------------------------------------------
    // Mode entry
    // -----------------------------------------------------------------------

    /// Start Manual mode passive: override cleared, indicator dark.
    pub fn enter_manual(&mut self, from_auto: bool) {
        self.plot.mode = Mode::Manual { from_auto };
        self.plot.manual_override = false;
        self.set_indicator(false);

        info!(plot = %self.plot.id, from_auto, "manual mode entered");
        self.events.record(
            EventKind::Mode,
            format!(
                "plot {}: manual mode{}",
                self.plot.id,
                if from_auto { " (interrupted auto)" } else { "" }
            ),
        );
    }

    /// Start Auto mode with a user-supplied threshold. Returns the threshold
    /// actually applied after the configured policy.
    pub fn enter_auto(&mut self, requested: i32) -> i32 {
        let max = self.settings.sensor_max;
        let threshold = self.settings.threshold_policy.apply(requested, max);

        if !(0..=max).contains(&requested) {
            warn!(
                plot = %self.plot.id,
                requested,
                applied = threshold,
                max,
                "threshold outside sensor range"
            );
        }

        self.plot.threshold = threshold;
        self.plot.history.record(threshold);
        self.plot.mode = Mode::Auto;

        info!(plot = %self.plot.id, threshold, "auto mode entered");
        self.events.record(
            EventKind::Threshold,
            format!("plot {}: threshold set to {threshold}", self.plot.id),
        );
        threshold
    }

    // -----------------------------------------------------------------------
    // Poll cycle
    // -----------------------------------------------------------------------

    /// Run one poll cycle. `return_requested` is the operator's out-of-band
    /// "back to menu" signal for this cycle.
    pub fn tick(&mut self, return_requested: bool) -> Result<Step, ControllerError> {
        match self.plot.mode {
            Mode::Idle => Ok(Step::Idle),
            Mode::Manual { from_auto } => self.manual_tick(from_auto, return_requested),
            Mode::Auto => self.auto_tick(return_requested),
        }
    }

    fn manual_tick(&mut self, from_auto: bool, return_requested: bool) -> Result<Step, ControllerError> {
        if return_requested {
            self.leave_manual(from_auto)?;
            return Ok(Step::Idle);
        }

        let edge = self.sample_button();
        if edge {
            self.plot.manual_override = !self.plot.manual_override;
            info!(
                plot = %self.plot.id,
                manual_override = self.plot.manual_override,
                "manual override toggled"
            );
        }

        // Override ON forces the pump ON, override OFF forces it OFF.
        let forced = self.plot.manual_override;
        self.drive_pump(forced)?;
        self.set_indicator(forced);

        Ok(Step::Continue(ManualInputDebouncer::delay_after(
            edge,
            &self.settings.timing,
        )))
    }

    fn auto_tick(&mut self, return_requested: bool) -> Result<Step, ControllerError> {
        if self.sample_button() {
            info!(plot = %self.plot.id, "button pressed, auto session handed to manual");
            self.enter_manual(true);
            // A return that arrived with the press ends the nested session
            // on its first poll.
            if return_requested {
                self.leave_manual(true)?;
                return Ok(Step::Idle);
            }
            return Ok(Step::Continue(ManualInputDebouncer::delay_after(
                true,
                &self.settings.timing,
            )));
        }

        if return_requested {
            self.leave_auto()?;
            return Ok(Step::Idle);
        }

        let moisture = self.board.read_moisture();
        self.plot.current_moisture = moisture;

        // Strict less-than: moisture equal to the threshold is adequate.
        let water = moisture < self.plot.threshold;
        debug!(
            plot = %self.plot.id,
            moisture,
            threshold = self.plot.threshold,
            water,
            "auto sample"
        );
        self.drive_pump(water)?;

        Ok(Step::Continue(self.settings.timing.sample()))
    }

    // -----------------------------------------------------------------------
    // Mode exit
    // -----------------------------------------------------------------------

    /// Override and indicator are always cleared. The pump keeps its last
    /// commanded level unless `stop_pump_on_exit` is configured.
    fn leave_manual(&mut self, from_auto: bool) -> Result<(), ControllerError> {
        self.plot.manual_override = false;
        self.set_indicator(false);
        if self.settings.stop_pump_on_exit {
            self.drive_pump(false)?;
        }
        self.plot.mode = Mode::Idle;

        info!(
            plot = %self.plot.id,
            pump_on = self.pump.current_state(),
            from_auto,
            "manual mode exited"
        );
        self.events.record(
            EventKind::Mode,
            format!(
                "plot {}: manual mode exited{}",
                self.plot.id,
                if from_auto { ", auto session ended" } else { "" }
            ),
        );
        Ok(())
    }

    fn leave_auto(&mut self) -> Result<(), ControllerError> {
        if self.settings.stop_pump_on_exit {
            self.drive_pump(false)?;
        }
        self.plot.mode = Mode::Idle;

        info!(plot = %self.plot.id, pump_on = self.pump.current_state(), "auto mode exited");
        self.events.record(
            EventKind::Mode,
            format!("plot {}: auto mode exited", self.plot.id),
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn sample_button(&mut self) -> bool {
        let raw = self.board.button_active();
        self.plot.button.sample(raw)
    }

    fn drive_pump(&mut self, on: bool) -> Result<(), ControllerError> {
        let was_on = self.pump.current_state();
        self.pump.set_state(self.plot.id, on, &mut *self.board)?;
        if was_on != on {
            self.events.record(
                EventKind::Pump,
                format!("plot {} pump {}", self.plot.id, if on { "ON" } else { "OFF" }),
            );
        }
        self.plot.pump_state = on;
        Ok(())
    }

    fn set_indicator(&mut self, on: bool) {
        self.board.set_indicator(self.plot.id, on);
        self.plot.indicator_on = on;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
