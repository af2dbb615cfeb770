//! Hardware boundary consumed by the control core. The `gpio` feature adds
//! the Raspberry Pi board; without it the simulated board is used.

#[cfg(feature = "gpio")]
pub mod gpio;
#[cfg(test)]
pub mod mock;
pub mod sim;

use crate::plot::PlotId;

/// The single pump, button, sensor and per-plot indicators of the device.
pub trait Board {
    /// One moisture sample in `[0, sensor_max]`.
    fn read_moisture(&mut self) -> i32;

    /// One raw button sample; `true` means pressed.
    fn button_active(&mut self) -> bool;

    /// Drive the pump output. Re-asserting the current level is harmless.
    fn set_pump(&mut self, on: bool);

    fn set_indicator(&mut self, plot: PlotId, on: bool);
}
