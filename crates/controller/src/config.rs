//! TOML config file loading and validation for the controller: poll
//! cadence, sensor range, pump/button wiring, and the plot registry.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// Full-scale moisture reading of the reference sensor.
pub const SENSOR_MAX: i32 = 876;

/// BCM GPIO pins available on the Raspberry Pi 40-pin header for general
/// use. GPIO 0-1 are reserved for the ID EEPROM and must never be used.
const VALID_GPIO_PINS: &[u8] = &[
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27,
];

/// Highest single-ended ADS1115 input.
const MAX_ADC_CHANNEL: u8 = 3;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: Timing,
    pub sensor: SensorConfig,
    pub pump: PumpConfig,
    pub button: ButtonConfig,
    pub threshold_policy: ThresholdPolicy,
    pub log_filter: String,
    pub plots: Vec<PlotEntry>,
}

/// Poll cadence of the mode loops, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Baseline delay between button samples.
    pub poll_ms: u64,
    /// Extra settling delay after a press-edge.
    pub settle_ms: u64,
    /// Delay between moisture samples in Auto mode.
    pub sample_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub max: i32,
    pub i2c_addr: u16,
    pub channel: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    pub gpio_pin: u8,
    /// Many common relay boards are active-low.
    pub active_low: bool,
    /// Drive the pump OFF whenever a mode loop exits.
    pub stop_on_mode_exit: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    pub gpio_pin: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlotEntry {
    pub id: u8,
    pub name: String,
    pub indicator_gpio_pin: u8,
}

/// What to do with an Auto threshold outside `[0, sensor.max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdPolicy {
    /// Accept the value as typed.
    #[default]
    PassThrough,
    Clamp,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            sensor: SensorConfig::default(),
            pump: PumpConfig::default(),
            button: ButtonConfig::default(),
            threshold_policy: ThresholdPolicy::default(),
            log_filter: "info".to_string(),
            plots: vec![
                PlotEntry {
                    id: 1,
                    name: "sandy".into(),
                    indicator_gpio_pin: 22,
                },
                PlotEntry {
                    id: 2,
                    name: "loamy".into(),
                    indicator_gpio_pin: 23,
                },
                PlotEntry {
                    id: 3,
                    name: "clay".into(),
                    indicator_gpio_pin: 24,
                },
            ],
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_ms: 50,
            settle_ms: 200,
            sample_ms: 1000,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            max: SENSOR_MAX,
            i2c_addr: 0x48,
            channel: 0,
        }
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            gpio_pin: 17,
            active_low: true,
            stop_on_mode_exit: false,
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self { gpio_pin: 27 }
    }
}

impl Timing {
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn sample(&self) -> Duration {
        Duration::from_millis(self.sample_ms)
    }
}

impl ThresholdPolicy {
    pub fn apply(self, value: i32, sensor_max: i32) -> i32 {
        match self {
            Self::PassThrough => value,
            Self::Clamp => value.clamp(0, sensor_max),
        }
    }
}

/// The subset of the config the control core consults on every tick.
#[derive(Debug, Clone, Copy)]
pub struct ControlSettings {
    pub timing: Timing,
    pub sensor_max: i32,
    pub threshold_policy: ThresholdPolicy,
    pub stop_pump_on_exit: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Config::default().control()
    }
}

impl Config {
    pub fn control(&self) -> ControlSettings {
        ControlSettings {
            timing: self.timing,
            sensor_max: self.sensor.max,
            threshold_policy: self.threshold_policy,
            stop_pump_on_exit: self.pump.stop_on_mode_exit,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate the whole config. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_timing(&mut errors);
        self.validate_sensor(&mut errors);
        self.validate_plots(&mut errors);
        self.validate_pins(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_timing(&self, errors: &mut Vec<String>) {
        let t = &self.timing;
        for (name, value) in [
            ("poll_ms", t.poll_ms),
            ("settle_ms", t.settle_ms),
            ("sample_ms", t.sample_ms),
        ] {
            if value == 0 {
                errors.push(format!("timing: {name} must be positive"));
            }
        }
    }

    fn validate_sensor(&self, errors: &mut Vec<String>) {
        if self.sensor.max <= 0 {
            errors.push(format!(
                "sensor: max must be positive, got {}",
                self.sensor.max
            ));
        }
        if self.sensor.channel > MAX_ADC_CHANNEL {
            errors.push(format!(
                "sensor: channel {} out of range (0-{MAX_ADC_CHANNEL})",
                self.sensor.channel
            ));
        }
    }

    fn validate_plots(&self, errors: &mut Vec<String>) {
        if self.plots.is_empty() {
            errors.push("plots: at least one plot is required".to_string());
        }

        let mut seen_ids: HashSet<u8> = HashSet::new();
        for (i, p) in self.plots.iter().enumerate() {
            if p.id == 0 {
                errors.push(format!("plots[{i}]: id must be 1-255"));
            } else if !seen_ids.insert(p.id) {
                errors.push(format!("plot {}: duplicate id", p.id));
            }

            if p.name.trim().is_empty() {
                errors.push(format!("plots[{i}]: name is empty"));
            }
        }
    }

    fn validate_pins(&self, errors: &mut Vec<String>) {
        let mut pins: Vec<(String, u8)> = vec![
            ("pump".to_string(), self.pump.gpio_pin),
            ("button".to_string(), self.button.gpio_pin),
        ];
        pins.extend(
            self.plots
                .iter()
                .map(|p| (format!("plot {} indicator", p.id), p.indicator_gpio_pin)),
        );

        let mut seen: HashSet<u8> = HashSet::new();
        for (owner, pin) in &pins {
            if !VALID_GPIO_PINS.contains(pin) {
                errors.push(format!(
                    "{owner}: gpio pin {pin} is not a valid BCM GPIO pin (allowed: 2-27)"
                ));
            } else if !seen.insert(*pin) {
                errors.push(format!("{owner}: gpio pin {pin} is already in use"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file. A missing file yields the
/// default three-plot config.
pub fn load(path: &str) -> Result<Config> {
    let config = match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str::<Config>(&contents)
            .with_context(|| format!("failed to parse config: {path}"))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path, "no config file, using defaults");
            Config::default()
        }
        Err(e) => return Err(e).with_context(|| format!("failed to read config: {path}")),
    };
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
