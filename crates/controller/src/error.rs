//! Typed errors raised by the control core. Every variant is recoverable:
//! the console prints it and repeats the prompt.

use crate::plot::PlotId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// A plot id or menu id outside the recognised set.
    #[error("invalid {what} selection: {value}")]
    InvalidSelection { what: &'static str, value: i64 },

    /// A plot tried to drive the pump without holding it.
    #[error("plot {caller} does not own the pump (owner: {})", owner_label(.owner))]
    NotOwner {
        caller: PlotId,
        owner: Option<PlotId>,
    },

    #[error("no plot selected")]
    NoPlotSelected,

    /// Plot selection was attempted while a mode loop is still running.
    #[error("plot {0} is still running a mode")]
    ModeActive(PlotId),
}

impl ControllerError {
    pub fn invalid_plot(value: i64) -> Self {
        Self::InvalidSelection {
            what: "plot",
            value,
        }
    }

    pub fn invalid_mode(value: i64) -> Self {
        Self::InvalidSelection {
            what: "mode",
            value,
        }
    }
}

fn owner_label(owner: &Option<PlotId>) -> String {
    owner.map_or_else(|| "none".to_string(), |p| p.to_string())
}
