//! Sensirion SGP40 VOC sensor, raw signal only.
//!
//! The measurement command carries fixed compensation words for 50 %RH
//! and 25 °C.  Every 16-bit word on the wire is followed by a CRC-8.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::error::SensorError;

pub const ADDRESS: u8 = 0x59;

/// sgp40_measure_raw_signal, RH = 50 % (0x8000), T = 25 °C (0x6666).
const MEASURE_RAW_DEFAULT: [u8; 8] = [0x26, 0x0F, 0x80, 0x00, 0xA2, 0x66, 0x66, 0x93];

const MEASURE_MS: u32 = 30;

/// Sensirion CRC-8: polynomial 0x31, init 0xFF, no reflection.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x31 } else { crc << 1 };
        }
    }
    crc
}

pub fn read_raw<B: I2c, D: DelayNs>(bus: &mut B, delay: &mut D) -> Result<u16, SensorError> {
    bus.write(ADDRESS, &MEASURE_RAW_DEFAULT)
        .map_err(|_| SensorError::BusFault)?;
    delay.delay_ms(MEASURE_MS);

    let mut buf = [0u8; 3];
    bus.read(ADDRESS, &mut buf).map_err(|_| SensorError::BusFault)?;
    decode_word(&buf)
}

fn decode_word(buf: &[u8; 3]) -> Result<u16, SensorError> {
    if crc8(&buf[..2]) != buf[2] {
        return Err(SensorError::CrcMismatch);
    }
    Ok(u16::from_be_bytes([buf[0], buf[1]]))
}
