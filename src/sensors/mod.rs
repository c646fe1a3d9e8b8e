//! Environment sensor shield: every chip shares one I2C bus.
//!
//! | Chip    | Addr | Reading                       |
//! |---------|------|-------------------------------|
//! | BME280  | 0x77 | temperature, humidity, press. |
//! | ADS1115 | 0x48 | photocell on AIN0             |
//! | SGP40   | 0x59 | raw VOC signal                |
//! | DS1307  | 0x68 | battery-backed wall clock     |
//!
//! The drivers are free functions over `embedded_hal::i2c::I2c`; the
//! shield owns the bus and the BME280 trim.

pub mod ads1115;
pub mod bme280;
pub mod ds1307;
pub mod sgp40;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{error, info};

use crate::app::events::{GarageEvent, record};
use crate::app::ports::{ClockPort, EnvironmentReadings, EventSink, WallTime};
use crate::error::SensorError;

pub struct SensorShield<B, D> {
    bus: B,
    delay: D,
    calibration: bme280::Calibration,
}

impl<B: I2c, D: DelayNs> SensorShield<B, D> {
    /// Probe the BME280 and start it measuring.
    pub fn new(mut bus: B, delay: D) -> Result<Self, SensorError> {
        let calibration = bme280::init(&mut bus)?;
        info!("BME280 ready");
        Ok(Self { bus, delay, calibration })
    }

    /// [`new`](Self::new) for the boot path: a failure is written to the
    /// durable log before the caller restarts the board.
    pub fn new_logged(
        bus: B,
        delay: D,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) -> Result<Self, SensorError> {
        Self::new(bus, delay).inspect_err(|&e| {
            error!("Sensor shield init failed: {e}");
            record(clock, sink, GarageEvent::SensorShieldFailed(e));
        })
    }

    /// One sample of every environment channel, in dashboard units.
    pub fn read(&mut self) -> Result<EnvironmentReadings, SensorError> {
        let m = bme280::read(&mut self.bus, &self.calibration)?;
        let raw_light = ads1115::read_raw(&mut self.bus, &mut self.delay)?;
        let raw_gas = sgp40::read_raw(&mut self.bus, &mut self.delay)?;
        Ok(EnvironmentReadings {
            temperature_f: m.temperature_c * 9.0 / 5.0 + 32.0,
            humidity_pct: m.humidity_pct,
            pressure_hpa: m.pressure_pa / 100.0,
            brightness: ads1115::brightness(raw_light),
            raw_gas,
        })
    }

    pub fn read_clock(&mut self) -> Result<WallTime, SensorError> {
        ds1307::read_time(&mut self.bus)
    }
}
