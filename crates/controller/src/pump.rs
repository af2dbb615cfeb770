//! The single pump shared by every plot. Only the plot the dispatcher has
//! selected may command it.

use tracing::{info, warn};

use crate::board::Board;
use crate::error::ControllerError;
use crate::plot::PlotId;

#[derive(Debug, Default)]
pub struct PumpActuator {
    on: bool,
    owner: Option<PlotId>,
}

impl PumpActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand the pump to `plot`. Called by the dispatcher on selection.
    pub fn assign(&mut self, plot: PlotId) {
        if self.owner != Some(plot) {
            info!(plot = %plot, previous = ?self.owner.map(PlotId::get), "pump owner changed");
        }
        self.owner = Some(plot);
    }

    pub fn owner(&self) -> Option<PlotId> {
        self.owner
    }

    pub fn current_state(&self) -> bool {
        self.on
    }

    /// Drive the pump on behalf of `caller`. The output level is re-asserted
    /// even when it already matches.
    pub fn set_state<B: Board>(
        &mut self,
        caller: PlotId,
        on: bool,
        board: &mut B,
    ) -> Result<(), ControllerError> {
        if self.owner != Some(caller) {
            warn!(plot = %caller, "pump command rejected: not the owner");
            return Err(ControllerError::NotOwner {
                caller,
                owner: self.owner,
            });
        }

        board.set_pump(on);
        if self.on != on {
            info!(plot = %caller, pump = if on { "ON" } else { "OFF" }, "pump switched");
        }
        self.on = on;
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::mock::MockBoard;

    const P1: PlotId = PlotId::new(1);
    const P2: PlotId = PlotId::new(2);

    #[test]
    fn starts_off_and_unowned() {
        let pump = PumpActuator::new();
        assert!(!pump.current_state());
        assert_eq!(pump.owner(), None);
    }

    #[test]
    fn owner_can_switch_pump() {
        let mut board = MockBoard::new();
        let mut pump = PumpActuator::new();
        pump.assign(P1);

        pump.set_state(P1, true, &mut board).unwrap();
        assert!(pump.current_state());
        pump.set_state(P1, false, &mut board).unwrap();
        assert!(!pump.current_state());
        assert_eq!(board.pump_calls, vec![true, false]);
    }

    #[test]
    fn repeated_state_is_reasserted() {
        let mut board = MockBoard::new();
        let mut pump = PumpActuator::new();
        pump.assign(P1);

        pump.set_state(P1, true, &mut board).unwrap();
        pump.set_state(P1, true, &mut board).unwrap();
        assert!(pump.current_state());
        assert_eq!(board.pump_calls, vec![true, true]);
    }

    #[test]
    fn unowned_pump_rejects_commands() {
        let mut board = MockBoard::new();
        let mut pump = PumpActuator::new();

        let err = pump.set_state(P1, true, &mut board).unwrap_err();
        assert_eq!(
            err,
            ControllerError::NotOwner {
                caller: P1,
                owner: None
            }
        );
        assert!(board.pump_calls.is_empty());
        assert!(!pump.current_state());
    }

    #[test]
    fn non_owner_is_rejected_without_touching_output() {
        let mut board = MockBoard::new();
        let mut pump = PumpActuator::new();
        pump.assign(P1);

        assert!(pump.set_state(P2, true, &mut board).is_err());
        assert!(board.pump_calls.is_empty());
    }

    #[test]
    fn reassignment_moves_ownership() {
        let mut board = MockBoard::new();
        let mut pump = PumpActuator::new();
        pump.assign(P1);
        pump.assign(P2);

        assert!(pump.set_state(P1, true, &mut board).is_err());
        pump.set_state(P2, true, &mut board).unwrap();
        assert_eq!(pump.owner(), Some(P2));
    }
}
