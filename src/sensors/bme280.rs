//! Bosch BME280 temperature / pressure / humidity sensor.
//!
//! Runs in normal mode (x1 oversampling on every channel, 1 s standby) so
//! a read is a single burst of the data registers.  Compensation uses the
//! integer formulas from the datasheet (section 4.2.3) with the factory
//! trim read once at start-up.

use embedded_hal::i2c::I2c;

use crate::error::SensorError;

pub const ADDRESS: u8 = 0x77;

const REG_CHIP_ID: u8 = 0xD0;
const CHIP_ID: u8 = 0x60;
const REG_CALIB_00: u8 = 0x88;
const REG_CALIB_26: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

/// osrs_h = x1
const CTRL_HUM_X1: u8 = 0x01;
/// osrs_t = x1, osrs_p = x1, mode = normal
const CTRL_MEAS_NORMAL: u8 = 0x27;
/// t_sb = 1000 ms, filter off
const CONFIG_STANDBY_1S: u8 = 0xA0;

/// Factory trim words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    t1: u16,
    t2: i16,
    t3: i16,
    p1: u16,
    p2: i16,
    p3: i16,
    p4: i16,
    p5: i16,
    p6: i16,
    p7: i16,
    p8: i16,
    p9: i16,
    h1: u8,
    h2: i16,
    h3: u8,
    h4: i16,
    h5: i16,
    h6: i8,
}

impl Calibration {
    /// Decode the 0x88..=0xA1 and 0xE1..=0xE7 register blocks.
    pub fn from_registers(a: &[u8; 26], b: &[u8; 7]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([a[i], a[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([a[i], a[i + 1]]);
        Self {
            t1: u16_at(0),
            t2: i16_at(2),
            t3: i16_at(4),
            p1: u16_at(6),
            p2: i16_at(8),
            p3: i16_at(10),
            p4: i16_at(12),
            p5: i16_at(14),
            p6: i16_at(16),
            p7: i16_at(18),
            p8: i16_at(20),
            p9: i16_at(22),
            h1: a[25],
            h2: i16::from_le_bytes([b[0], b[1]]),
            h3: b[2],
            // H4 and H5 are 12-bit signed values sharing the nibbles of 0xE5.
            h4: (i16::from(b[3] as i8) << 4) | i16::from(b[4] & 0x0F),
            h5: (i16::from(b[5] as i8) << 4) | i16::from(b[4] >> 4),
            h6: b[6] as i8,
        }
    }

    /// Temperature fine value shared by all three compensations.
    fn t_fine(&self, adc_t: i32) -> i32 {
        let t1 = i32::from(self.t1);
        let var1 = (((adc_t >> 3) - (t1 << 1)) * i32::from(self.t2)) >> 11;
        let var2 = (((((adc_t >> 4) - t1) * ((adc_t >> 4) - t1)) >> 12) * i32::from(self.t3)) >> 14;
        var1 + var2
    }

    /// Pressure in Pa as Q24.8.
    fn pressure_q24_8(&self, adc_p: i32, t_fine: i32) -> u32 {
        let mut var1 = i64::from(t_fine) - 128_000;
        let mut var2 = var1 * var1 * i64::from(self.p6);
        var2 += (var1 * i64::from(self.p5)) << 17;
        var2 += i64::from(self.p4) << 35;
        var1 = ((var1 * var1 * i64::from(self.p3)) >> 8) + ((var1 * i64::from(self.p2)) << 12);
        var1 = (((1_i64 << 47) + var1) * i64::from(self.p1)) >> 33;
        if var1 == 0 {
            // avoid division by zero on a blank trim
            return 0;
        }
        let mut p = 1_048_576 - i64::from(adc_p);
        p = (((p << 31) - var2) * 3125) / var1;
        var1 = (i64::from(self.p9) * (p >> 13) * (p >> 13)) >> 25;
        var2 = (i64::from(self.p8) * p) >> 19;
        (((p + var1 + var2) >> 8) + (i64::from(self.p7) << 4)) as u32
    }

    /// Relative humidity in %RH as Q22.10.
    fn humidity_q22_10(&self, adc_h: i32, t_fine: i32) -> u32 {
        let mut v = t_fine - 76_800;
        v = ((((adc_h << 14) - (i32::from(self.h4) << 20) - (i32::from(self.h5) * v)) + 16_384) >> 15)
            * (((((((v * i32::from(self.h6)) >> 10) * (((v * i32::from(self.h3)) >> 11) + 32_768)) >> 10)
                + 2_097_152)
                * i32::from(self.h2)
                + 8_192)
                >> 14);
        v -= ((((v >> 15) * (v >> 15)) >> 7) * i32::from(self.h1)) >> 4;
        (v.clamp(0, 419_430_400) >> 12) as u32
    }

    pub fn compensate(&self, raw: RawSample) -> Measurement {
        let t_fine = self.t_fine(raw.temperature);
        Measurement {
            temperature_c: ((t_fine * 5 + 128) >> 8) as f32 / 100.0,
            pressure_pa: self.pressure_q24_8(raw.pressure, t_fine) as f32 / 256.0,
            humidity_pct: self.humidity_q22_10(raw.humidity, t_fine) as f32 / 1024.0,
        }
    }
}

/// Uncompensated ADC words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub pressure: i32,
    pub temperature: i32,
    pub humidity: i32,
}

impl RawSample {
    /// Decode the eight data registers starting at 0xF7.
    pub fn from_registers(d: &[u8; 8]) -> Self {
        let twenty_bit = |msb: u8, lsb: u8, xlsb: u8| {
            (i32::from(msb) << 12) | (i32::from(lsb) << 4) | (i32::from(xlsb) >> 4)
        };
        Self {
            pressure: twenty_bit(d[0], d[1], d[2]),
            temperature: twenty_bit(d[3], d[4], d[5]),
            humidity: (i32::from(d[6]) << 8) | i32::from(d[7]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub temperature_c: f32,
    pub pressure_pa: f32,
    pub humidity_pct: f32,
}

/// Verify the chip, read the trim and start continuous measurement.
pub fn init<B: I2c>(bus: &mut B) -> Result<Calibration, SensorError> {
    let mut id = [0u8; 1];
    bus.write_read(ADDRESS, &[REG_CHIP_ID], &mut id)
        .map_err(|_| SensorError::BusFault)?;
    if id[0] != CHIP_ID {
        return Err(SensorError::UnexpectedChip(id[0]));
    }

    let mut a = [0u8; 26];
    let mut b = [0u8; 7];
    bus.write_read(ADDRESS, &[REG_CALIB_00], &mut a)
        .map_err(|_| SensorError::BusFault)?;
    bus.write_read(ADDRESS, &[REG_CALIB_26], &mut b)
        .map_err(|_| SensorError::BusFault)?;

    // ctrl_hum only latches on the following ctrl_meas write.
    for cmd in [
        [REG_CTRL_HUM, CTRL_HUM_X1],
        [REG_CONFIG, CONFIG_STANDBY_1S],
        [REG_CTRL_MEAS, CTRL_MEAS_NORMAL],
    ] {
        bus.write(ADDRESS, &cmd).map_err(|_| SensorError::BusFault)?;
    }
    Ok(Calibration::from_registers(&a, &b))
}

pub fn read<B: I2c>(bus: &mut B, calibration: &Calibration) -> Result<Measurement, SensorError> {
    let mut data = [0u8; 8];
    bus.write_read(ADDRESS, &[REG_DATA], &mut data)
        .map_err(|_| SensorError::BusFault)?;
    Ok(calibration.compensate(RawSample::from_registers(&data)))
}
