//! Plot registry and mode routing. The dispatcher is the only place that
//! decides which plot holds the shared pump, button and sensor.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::board::Board;
use crate::config::{Config, ControlSettings};
use crate::controller::{PlotController, Step};
use crate::error::ControllerError;
use crate::plot::{Plot, PlotId};
use crate::pump::PumpActuator;
use crate::status::{EventKind, EventLog, PlotStatus, StatusSnapshot};

/// Mode menu entries, numbered as the operator types them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Manual,
    Auto,
    ViewHistory,
}

impl MenuChoice {
    pub fn from_selection(n: i64) -> Result<Self, ControllerError> {
        match n {
            1 => Ok(Self::Manual),
            2 => Ok(Self::Auto),
            3 => Ok(Self::ViewHistory),
            _ => Err(ControllerError::invalid_mode(n)),
        }
    }
}

pub struct Dispatcher<B: Board> {
    plots: BTreeMap<PlotId, Plot>,
    active: Option<PlotId>,
    pump: PumpActuator,
    board: B,
    settings: ControlSettings,
    events: EventLog,
}

impl<B: Board> Dispatcher<B> {
    pub fn new(config: &Config, board: B) -> Self {
        let plots: BTreeMap<PlotId, Plot> = config
            .plots
            .iter()
            .map(|p| {
                let id = PlotId::new(p.id);
                (id, Plot::new(id, p.name.clone()))
            })
            .collect();

        let mut events = EventLog::new();
        events.record(
            EventKind::System,
            format!("controller started with {} plot(s)", plots.len()),
        );

        Self {
            plots,
            active: None,
            pump: PumpActuator::new(),
            board,
            settings: config.control(),
            events,
        }
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Make `id` the active plot and hand it the pump. An unknown id changes
    /// nothing and touches no hardware.
    pub fn select_plot(&mut self, id: i64) -> Result<PlotId, ControllerError> {
        let plot_id = self.lookup(id).map_err(|e| self.reject(e))?;
        if let Some(running) = self.running_plot() {
            return Err(self.reject(ControllerError::ModeActive(running)));
        }

        // The previous owner no longer commands the pump.
        if let Some(prev) = self.pump.owner().filter(|p| *p != plot_id) {
            if let Some(plot) = self.plots.get_mut(&prev) {
                plot.pump_state = false;
            }
        }

        self.active = Some(plot_id);
        self.pump.assign(plot_id);
        info!(plot = %plot_id, "plot selected");
        Ok(plot_id)
    }

    pub fn enter_manual(&mut self) -> Result<(), ControllerError> {
        self.prepare_mode()?;
        self.controller()?.enter_manual(false);
        Ok(())
    }

    /// Returns the threshold actually applied.
    pub fn enter_auto(&mut self, threshold: i32) -> Result<i32, ControllerError> {
        self.prepare_mode()?;
        Ok(self.controller()?.enter_auto(threshold))
    }

    /// Threshold history of the selected plot, oldest first.
    pub fn view_history(&self) -> Result<Vec<i32>, ControllerError> {
        let id = self.active.ok_or(ControllerError::NoPlotSelected)?;
        Ok(self.plots[&id].history.snapshot())
    }

    /// Threshold history of any plot, oldest first. Read-only.
    pub fn view_directory(&self, id: i64) -> Result<Vec<i32>, ControllerError> {
        let plot_id = self.lookup(id)?;
        Ok(self.plots[&plot_id].history.snapshot())
    }

    // -----------------------------------------------------------------------
    // Running
    // -----------------------------------------------------------------------

    /// One poll cycle of the active plot's mode.
    pub fn tick(&mut self, return_requested: bool) -> Result<Step, ControllerError> {
        if !self.is_running() {
            return Ok(Step::Idle);
        }
        self.controller()?.tick(return_requested)
    }

    pub fn is_running(&self) -> bool {
        self.running_plot().is_some()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn active_plot(&self) -> Option<&Plot> {
        self.active.and_then(|id| self.plots.get(&id))
    }

    #[cfg(test)]
    pub fn plot(&self, id: PlotId) -> Option<&Plot> {
        self.plots.get(&id)
    }

    pub fn plots(&self) -> impl Iterator<Item = &Plot> {
        self.plots.values()
    }

    #[cfg(test)]
    pub fn pump(&self) -> &PumpActuator {
        &self.pump
    }

    #[cfg(test)]
    pub fn board(&self) -> &B {
        &self.board
    }

    #[cfg(test)]
    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            uptime_secs: self.events.uptime_secs(),
            active_plot: self.active,
            pump_on: self.pump.current_state(),
            pump_owner: self.pump.owner(),
            plots: self.plots.values().map(PlotStatus::from).collect(),
            events: self.events.recent(),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn lookup(&self, id: i64) -> Result<PlotId, ControllerError> {
        u8::try_from(id)
            .ok()
            .map(PlotId::new)
            .filter(|p| self.plots.contains_key(p))
            .ok_or_else(|| {
                warn!(id, "rejected plot selection");
                ControllerError::invalid_plot(id)
            })
    }

    fn reject(&mut self, err: ControllerError) -> ControllerError {
        self.events.record(EventKind::Error, err.to_string());
        err
    }

    fn running_plot(&self) -> Option<PlotId> {
        self.plots.values().find(|p| !p.is_idle()).map(|p| p.id)
    }

    /// Checks shared by every mode entry, then all indicators dark.
    fn prepare_mode(&mut self) -> Result<(), ControllerError> {
        if self.active.is_none() {
            return Err(self.reject(ControllerError::NoPlotSelected));
        }
        if let Some(running) = self.running_plot() {
            return Err(self.reject(ControllerError::ModeActive(running)));
        }

        for plot in self.plots.values_mut() {
            self.board.set_indicator(plot.id, false);
            plot.indicator_on = false;
        }
        Ok(())
    }

    fn controller(&mut self) -> Result<PlotController<'_, B>, ControllerError> {
        let id = self.active.ok_or(ControllerError::NoPlotSelected)?;
        let plot = self
            .plots
            .get_mut(&id)
            .ok_or(ControllerError::NoPlotSelected)?;
        Ok(PlotController::new(
            plot,
            &mut self.pump,
            &mut self.board,
            &self.settings,
            &mut self.events,
        ))
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::board::mock::MockBoard;
    use crate::plot::Mode;

    fn dispatcher(board: MockBoard) -> Dispatcher<MockBoard> {
        Dispatcher::new(&Config::default(), board)
    }

    // -- Menu parsing -------------------------------------------------------

    #[test]
    fn menu_choice_from_selection() {
        assert_eq!(MenuChoice::from_selection(1), Ok(MenuChoice::Manual));
        assert_eq!(MenuChoice::from_selection(2), Ok(MenuChoice::Auto));
        assert_eq!(MenuChoice::from_selection(3), Ok(MenuChoice::ViewHistory));
        assert_eq!(
            MenuChoice::from_selection(4),
            Err(ControllerError::invalid_mode(4))
        );
        assert!(MenuChoice::from_selection(0).is_err());
    }

    // -- Plot selection -------------------------------------------------------

    #[test]
    fn registry_built_from_config() {
        let d = dispatcher(MockBoard::new());
        let names: Vec<&str> = d.plots().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["sandy", "loamy", "clay"]);
        assert!(d.active_plot().is_none());
        assert!(!d.pump().current_state());
    }

    #[test]
    fn select_valid_plot_assigns_pump() {
        let mut d = dispatcher(MockBoard::new());
        let id = d.select_plot(2).unwrap();
        assert_eq!(id, PlotId::new(2));
        assert_eq!(d.active_plot().unwrap().name, "loamy");
        assert_eq!(d.pump().owner(), Some(id));
    }

    #[test]
    fn invalid_plot_changes_nothing() {
        let mut d = dispatcher(MockBoard::new());
        for bad in [4, 0, -1, 300] {
            assert_eq!(d.select_plot(bad), Err(ControllerError::invalid_plot(bad)));
        }
        assert!(d.active_plot().is_none());
        assert_eq!(d.pump().owner(), None);
        assert_eq!(d.board().output_calls(), 0);
        for p in d.plots() {
            assert!(p.is_idle());
            assert!(!p.pump_state && !p.indicator_on && !p.manual_override);
        }
    }

    #[test]
    fn invalid_plot_keeps_previous_selection() {
        let mut d = dispatcher(MockBoard::new());
        d.select_plot(1).unwrap();
        assert!(d.select_plot(9).is_err());
        assert_eq!(d.active_plot().unwrap().id, PlotId::new(1));
        assert_eq!(d.pump().owner(), Some(PlotId::new(1)));
    }

    #[test]
    fn cannot_switch_plot_while_mode_runs() {
        let mut d = dispatcher(MockBoard::new());
        d.select_plot(1).unwrap();
        d.enter_manual().unwrap();
        assert_eq!(
            d.select_plot(2),
            Err(ControllerError::ModeActive(PlotId::new(1)))
        );
        assert_eq!(d.pump().owner(), Some(PlotId::new(1)));
    }

    // -- Mode dispatch --------------------------------------------------------

    #[test]
    fn mode_requires_selected_plot() {
        let mut d = dispatcher(MockBoard::new());
        assert_eq!(d.enter_manual(), Err(ControllerError::NoPlotSelected));
        assert_eq!(d.enter_auto(300), Err(ControllerError::NoPlotSelected));
        assert_eq!(d.view_history(), Err(ControllerError::NoPlotSelected));
        assert_eq!(d.tick(false), Ok(Step::Idle));
    }

    #[test]
    fn mode_entry_clears_every_indicator() {
        let mut d = dispatcher(MockBoard::new());
        d.select_plot(3).unwrap();
        d.enter_manual().unwrap();

        let calls = &d.board().indicator_calls;
        for id in 1..=3 {
            assert!(calls.contains(&(PlotId::new(id), false)));
        }
        assert!(d.plots().all(|p| !p.indicator_on));
    }

    #[test]
    fn only_active_plot_actuates() {
        let mut d = dispatcher(MockBoard::with_moisture(&[100]));
        d.select_plot(2).unwrap();
        d.enter_auto(300).unwrap();
        d.tick(false).unwrap();

        assert!(d.plot(PlotId::new(2)).unwrap().pump_state);
        assert!(!d.plot(PlotId::new(1)).unwrap().pump_state);
        assert!(!d.plot(PlotId::new(3)).unwrap().pump_state);
        assert!(d.plot(PlotId::new(1)).unwrap().is_idle());
    }

    #[test]
    fn manual_toggle_through_dispatcher() {
        let mut board = MockBoard::new();
        board.push_buttons(&[true, false, true]);
        let mut d = dispatcher(board);
        d.select_plot(1).unwrap();
        d.enter_manual().unwrap();

        d.tick(false).unwrap();
        let p = d.active_plot().unwrap();
        assert!(p.manual_override && p.pump_state && p.indicator_on);

        d.tick(false).unwrap();
        d.tick(false).unwrap();
        let p = d.active_plot().unwrap();
        assert!(!p.manual_override && !p.pump_state && !p.indicator_on);
    }

    #[test]
    fn return_leaves_mode_and_allows_reselection() {
        let mut d = dispatcher(MockBoard::new());
        d.select_plot(1).unwrap();
        d.enter_manual().unwrap();
        assert!(d.is_running());

        assert_eq!(d.tick(true), Ok(Step::Idle));
        assert!(!d.is_running());
        assert_eq!(d.active_plot().unwrap().mode, Mode::Idle);
        d.select_plot(2).unwrap();
    }

    // -- History ----------------------------------------------------------------

    #[test]
    fn history_is_per_plot() {
        let mut d = dispatcher(MockBoard::new());
        d.select_plot(1).unwrap();
        d.enter_auto(300).unwrap();
        d.tick(true).unwrap();
        d.enter_auto(320).unwrap();
        d.tick(true).unwrap();

        d.select_plot(2).unwrap();
        d.enter_auto(600).unwrap();
        d.tick(true).unwrap();

        assert_eq!(d.view_history(), Ok(vec![600]));
        assert_eq!(d.view_directory(1), Ok(vec![300, 320]));
        assert_eq!(d.view_directory(3), Ok(vec![]));
        assert_eq!(d.view_directory(5), Err(ControllerError::invalid_plot(5)));
    }

    // -- End to end ---------------------------------------------------------------

    #[test]
    fn auto_session_end_to_end() {
        let mut d = dispatcher(MockBoard::with_moisture(&[250, 300, 350]));
        d.select_plot(1).unwrap();
        assert_eq!(d.enter_auto(300), Ok(300));

        let mut pumps = Vec::new();
        for _ in 0..3 {
            assert_eq!(
                d.tick(false),
                Ok(Step::Continue(Duration::from_millis(1000)))
            );
            pumps.push(d.pump().current_state());
        }
        assert_eq!(pumps, vec![true, false, false]);
        assert_eq!(d.view_history(), Ok(vec![300]));
        assert_eq!(d.board().pump_calls, vec![true, false, false]);
    }

    #[test]
    fn manual_exit_then_auto_reevaluates_pump() {
        let mut board = MockBoard::with_moisture(&[800]);
        board.push_buttons(&[true]);
        let mut d = dispatcher(board);
        d.select_plot(1).unwrap();
        d.enter_manual().unwrap();
        d.tick(false).unwrap();
        d.tick(true).unwrap();
        assert!(d.pump().current_state(), "pump left on after manual exit");

        d.enter_auto(300).unwrap();
        d.tick(false).unwrap();
        assert!(!d.pump().current_state());
    }

    // -- Status ---------------------------------------------------------------

    #[test]
    fn status_snapshot_reflects_state() {
        let mut d = dispatcher(MockBoard::with_moisture(&[120]));
        d.select_plot(1).unwrap();
        d.enter_auto(300).unwrap();
        d.tick(false).unwrap();

        let status = d.status();
        assert_eq!(status.active_plot, Some(PlotId::new(1)));
        assert!(status.pump_on);
        assert_eq!(status.pump_owner, Some(PlotId::new(1)));
        assert_eq!(status.plots.len(), 3);
        assert_eq!(status.plots[0].moisture, 120);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["plots"][0]["mode"], "auto");
        assert_eq!(json["events"][0]["kind"], "pump");
    }

    #[test]
    fn rejected_requests_are_logged_as_errors() {
        let mut d = dispatcher(MockBoard::new());
        assert!(d.enter_manual().is_err());
        assert!(d.select_plot(42).is_err());

        let json = serde_json::to_value(d.status()).unwrap();
        assert_eq!(json["events"][0]["kind"], "error");
        assert_eq!(json["events"][0]["detail"], "invalid plot selection: 42");
        assert_eq!(json["events"][1]["detail"], "no plot selected");
    }

    #[test]
    fn handover_clears_previous_owner_pump_state() {
        let mut d = dispatcher(MockBoard::with_moisture(&[100, 800]));
        d.select_plot(1).unwrap();
        d.enter_auto(300).unwrap();
        d.tick(false).unwrap();
        assert!(d.pump().current_state());
        d.tick(true).unwrap();

        d.select_plot(2).unwrap();
        let p1 = d.plot(PlotId::new(1)).unwrap();
        assert!(!p1.pump_state);
        assert!(p1.is_idle());

        d.enter_auto(300).unwrap();
        d.tick(false).unwrap();
        assert!(!d.pump().current_state());
        for p in d.plots() {
            assert!(!p.pump_state || d.pump().owner() == Some(p.id), "{}", p.id);
        }
        assert_eq!(
            d.plot(PlotId::new(1)).unwrap().pump_state,
            d.pump().current_state()
        );
    }

    #[test]
    fn reselecting_owner_keeps_pump_state() {
        let mut d = dispatcher(MockBoard::with_moisture(&[100]));
        d.select_plot(1).unwrap();
        d.enter_auto(300).unwrap();
        d.tick(false).unwrap();
        d.tick(true).unwrap();

        d.select_plot(1).unwrap();
        assert!(d.plot(PlotId::new(1)).unwrap().pump_state);
    }
}
