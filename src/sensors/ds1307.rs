//! Maxim DS1307 battery-backed real-time clock.
//!
//! Only read at boot, to seed the system clock before any time-of-day
//! decision is made.  Registers 0x00..=0x06 hold BCD seconds, minutes,
//! hours, weekday, date, month and two-digit year.

use embedded_hal::i2c::I2c;

use crate::app::ports::WallTime;
use crate::error::SensorError;

pub const ADDRESS: u8 = 0x68;

const REG_SECONDS: u8 = 0x00;
/// Clock-halt flag in the seconds register.
const CH: u8 = 0x80;
/// 12-hour mode flag in the hours register.
const MODE_12H: u8 = 0x40;
const PM: u8 = 0x20;

fn bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

pub fn read_time<B: I2c>(bus: &mut B) -> Result<WallTime, SensorError> {
    let mut regs = [0u8; 7];
    bus.write_read(ADDRESS, &[REG_SECONDS], &mut regs)
        .map_err(|_| SensorError::BusFault)?;
    decode(&regs)
}

/// Decode the seven time registers.  A halted oscillator means the time
/// was never set (or the battery died) and is reported as out of range.
pub fn decode(regs: &[u8; 7]) -> Result<WallTime, SensorError> {
    if regs[0] & CH != 0 {
        return Err(SensorError::OutOfRange);
    }
    let hours = regs[2];
    let hour = if hours & MODE_12H != 0 {
        let h12 = bcd(hours & 0x1F);
        if !(1..=12).contains(&h12) {
            return Err(SensorError::OutOfRange);
        }
        (h12 % 12) + if hours & PM != 0 { 12 } else { 0 }
    } else {
        bcd(hours & 0x3F)
    };

    let time = WallTime {
        year: 2000 + u16::from(bcd(regs[6])),
        month: bcd(regs[5] & 0x1F),
        day: bcd(regs[4] & 0x3F),
        hour,
        minute: bcd(regs[1] & 0x7F),
        second: bcd(regs[0] & 0x7F),
    };
    let valid = time.year < 2100
        && (1..=12).contains(&time.month)
        && (1..=31).contains(&time.day)
        && time.hour < 24
        && time.minute < 60
        && time.second < 60;
    if valid { Ok(time) } else { Err(SensorError::OutOfRange) }
}
