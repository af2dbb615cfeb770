//! Simulated board for running the controller without hardware.
//!
//! Soil moisture follows a random walk with a steady drying drift and
//! per-sample sensor noise; while the pump runs, moisture climbs. Button
//! presses are injected from the console through a [`SimButton`] handle.
//! Outputs are logged instead of driven.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use super::Board;
use crate::plot::PlotId;

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal() -> f64 {
    let mut sum: f64 = 0.0;
    for _ in 0..12 {
        sum += fastrand::f64();
    }
    sum - 6.0
}

/// Sample from N(mean, sigma).
fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Button handle
// ---------------------------------------------------------------------------

/// Cloneable handle that queues physical button presses.
#[derive(Clone, Default)]
pub struct SimButton {
    pending: Arc<AtomicUsize>,
}

impl SimButton {
    pub fn press(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

pub struct SimBoard {
    /// Current "true" soil moisture in sensor units.
    level: f64,
    sensor_max: f64,

    drift_per_sample: f64,
    walk_sigma: f64,
    noise_sigma: f64,
    wet_rate: f64,

    pump_on: bool,
    indicators: BTreeMap<PlotId, bool>,

    button: SimButton,
    /// A press was reported on the previous sample; report release next.
    releasing: bool,
}

impl SimBoard {
    /// Start mid-range with a slow drying drift.
    pub fn new(sensor_max: i32) -> Self {
        let max = f64::from(sensor_max);
        info!(sensor_max, "[sim] board initialised (no hardware)");
        Self {
            level: max * 0.5,
            sensor_max: max,
            drift_per_sample: -max * 0.01,
            walk_sigma: max * 0.005,
            noise_sigma: max * 0.004,
            wet_rate: max * 0.04,
            pump_on: false,
            indicators: BTreeMap::new(),
            button: SimButton::default(),
            releasing: false,
        }
    }

    pub fn button(&self) -> SimButton {
        self.button.clone()
    }

    #[cfg(test)]
    pub fn pump_on(&self) -> bool {
        self.pump_on
    }

    #[cfg(test)]
    pub fn indicator(&self, plot: PlotId) -> bool {
        self.indicators.get(&plot).copied().unwrap_or(false)
    }
}

impl Board for SimBoard {
    fn read_moisture(&mut self) -> i32 {
        let wet = if self.pump_on { self.wet_rate } else { 0.0 };
        let walk = gaussian(0.0, self.walk_sigma);
        self.level = (self.level + self.drift_per_sample + walk + wet).clamp(0.0, self.sensor_max);

        let reading = self.level + gaussian(0.0, self.noise_sigma);
        // Bounded by sensor_max, which came from an i32.
        reading.round().clamp(0.0, self.sensor_max) as i32
    }

    fn button_active(&mut self) -> bool {
        if self.releasing {
            self.releasing = false;
            return false;
        }
        if self.button.take() {
            self.releasing = true;
            return true;
        }
        false
    }

    fn set_pump(&mut self, on: bool) {
        if self.pump_on != on {
            info!("[sim] pump set {}", if on { "ON" } else { "OFF" });
        }
        self.pump_on = on;
    }

    fn set_indicator(&mut self, plot: PlotId, on: bool) {
        let prev = self.indicators.insert(plot, on);
        if prev != Some(on) {
            debug!(plot = %plot, on, "[sim] indicator");
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
