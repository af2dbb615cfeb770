//! Raspberry Pi board: pump relay, one LED per plot, the override button,
//! and an ADS1115 ADC for the soil sensor. Requires the `gpio` feature.

use anyhow::{ensure, Context, Result};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::i2c::I2c;
use std::collections::HashMap;
use std::{thread, time::Duration};
use tracing::{error, info, warn};

use super::Board;
use crate::config::Config;
use crate::plot::PlotId;

// ── ADS1115 ─────────────────────────────────────────────────────────────────

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

/// OS=1 (start), PGA=001 (±4.096 V), MODE=1 (single-shot),
/// DR=100 (128 SPS), COMP_QUE=11 (comparator off).
const CONFIG_BASE: u16 = 0b1_000_001_1_100_0_0_0_11;
const MUX_SHIFT: u8 = 12;
const MUX_SINGLE_ENDED: [u16; 4] = [0b100, 0b101, 0b110, 0b111];

/// Conversion time at 128 SPS is ~7.8 ms.
const CONVERSION_WAIT: Duration = Duration::from_millis(9);
const OS_READY_BIT: u16 = 1 << 15;

/// Full-scale single-ended ADS1115 reading.
const ADC_MAX: i32 = 32767;

fn config_for_channel(channel: u8) -> u16 {
    CONFIG_BASE | (MUX_SINGLE_ENDED[usize::from(channel)] << MUX_SHIFT)
}

/// Linear map of a raw ADC value onto `[0, sensor_max]`.
fn scale_reading(raw: i16, sensor_max: i32) -> i32 {
    let raw = i64::from(i32::from(raw).clamp(0, ADC_MAX));
    let scaled = raw * i64::from(sensor_max) / i64::from(ADC_MAX);
    i32::try_from(scaled).unwrap_or(sensor_max)
}

// ── Board ───────────────────────────────────────────────────────────────────

pub struct GpioBoard {
    pump: OutputPin,
    active_low: bool,
    button: InputPin,
    indicators: HashMap<PlotId, OutputPin>,
    i2c: I2c,
    channel: u8,
    sensor_max: i32,
    last_reading: i32,
}

impl GpioBoard {
    pub fn new(config: &Config) -> Result<Self> {
        ensure!(
            usize::from(config.sensor.channel) < MUX_SINGLE_ENDED.len(),
            "ADS1115 channel {} out of range",
            config.sensor.channel
        );

        let gpio = Gpio::new().context("failed to open gpio")?;

        let mut pump = gpio
            .get(config.pump.gpio_pin)
            .with_context(|| format!("pump gpio {}", config.pump.gpio_pin))?
            .into_output();
        // Fail-safe: ensure "OFF" at startup
        if config.pump.active_low {
            pump.set_high();
        } else {
            pump.set_low();
        }

        let button = gpio
            .get(config.button.gpio_pin)
            .with_context(|| format!("button gpio {}", config.button.gpio_pin))?
            .into_input_pullup();

        let mut indicators = HashMap::new();
        for p in &config.plots {
            let mut pin = gpio
                .get(p.indicator_gpio_pin)
                .with_context(|| format!("plot {} indicator gpio {}", p.id, p.indicator_gpio_pin))?
                .into_output();
            pin.set_low();
            indicators.insert(PlotId::new(p.id), pin);
        }

        let mut i2c = I2c::new().context("failed to open i2c bus")?;
        i2c.set_slave_address(config.sensor.i2c_addr)
            .context("failed to address ADS1115")?;

        info!(
            pump_gpio = config.pump.gpio_pin,
            button_gpio = config.button.gpio_pin,
            indicators = indicators.len(),
            adc_addr = format_args!("0x{:02x}", config.sensor.i2c_addr),
            "gpio board initialised"
        );

        Ok(Self {
            pump,
            active_low: config.pump.active_low,
            button,
            indicators,
            i2c,
            channel: config.sensor.channel,
            sensor_max: config.sensor.max,
            last_reading: 0,
        })
    }

    fn read_channel(&mut self) -> anyhow::Result<i16> {
        let config = config_for_channel(self.channel);
        self.i2c.block_write(REG_CONFIG, &config.to_be_bytes())?;
        thread::sleep(CONVERSION_WAIT);

        for _ in 0..3 {
            let mut buf = [0u8; 2];
            self.i2c.block_read(REG_CONFIG, &mut buf)?;
            if u16::from_be_bytes(buf) & OS_READY_BIT != 0 {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }

        let mut buf = [0u8; 2];
        self.i2c.block_read(REG_CONVERSION, &mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }
}

impl Board for GpioBoard {
    fn read_moisture(&mut self) -> i32 {
        match self.read_channel() {
            Ok(raw) => {
                self.last_reading = scale_reading(raw, self.sensor_max);
            }
            Err(e) => {
                error!(channel = self.channel, "adc read failed, reusing last sample: {e}");
            }
        }
        self.last_reading
    }

    fn button_active(&mut self) -> bool {
        // Pulled up; pressing shorts to ground.
        self.button.is_low()
    }

    fn set_pump(&mut self, on: bool) {
        // active-low relay: LOW = ON, HIGH = OFF
        if on != self.active_low {
            self.pump.set_high();
        } else {
            self.pump.set_low();
        }
    }

    fn set_indicator(&mut self, plot: PlotId, on: bool) {
        if let Some(pin) = self.indicators.get_mut(&plot) {
            if on {
                pin.set_high();
            } else {
                pin.set_low();
            }
        } else {
            warn!(plot = %plot, "no indicator wired for plot");
        }
    }
}
