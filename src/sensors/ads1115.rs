//! TI ADS1115 16-bit ADC with the photocell on AIN0.
//!
//! Each read triggers a single-shot conversion (AIN0 vs GND, ±4.096 V,
//! 128 SPS) and waits out the conversion time instead of polling the
//! OS bit.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::error::SensorError;

pub const ADDRESS: u8 = 0x48;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

/// OS=1, MUX=AIN0/GND, PGA=±4.096 V, single-shot, 128 SPS, comparator off.
const CONFIG_SINGLE_AIN0: u16 = 0xC383;

/// One 128 SPS conversion plus margin.
const CONVERSION_MS: u32 = 9;

/// Raw conversion result.
pub fn read_raw<B: I2c, D: DelayNs>(bus: &mut B, delay: &mut D) -> Result<i16, SensorError> {
    let [hi, lo] = CONFIG_SINGLE_AIN0.to_be_bytes();
    bus.write(ADDRESS, &[REG_CONFIG, hi, lo])
        .map_err(|_| SensorError::BusFault)?;
    delay.delay_ms(CONVERSION_MS);

    let mut buf = [0u8; 2];
    bus.write_read(ADDRESS, &[REG_CONVERSION], &mut buf)
        .map_err(|_| SensorError::BusFault)?;
    Ok(i16::from_be_bytes(buf))
}

/// Dashboard brightness scale.
pub fn brightness(raw: i16) -> f32 {
    f32::from(raw) / 1000.0
}
