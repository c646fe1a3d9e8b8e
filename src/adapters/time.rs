//! ESP32 time adapter.
//!
//! Implements [`ClockPort`] for the controller.
//!
//! - **`target_os = "espidf"`**: monotonic time from `esp_timer_get_time()`,
//!   wall time from the newlib system clock (seeded from the RTC at boot),
//!   sleeps through `FreeRtos::delay_ms` so other tasks keep running.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `thread::sleep`; the wall clock is never synced on the host.

use crate::app::ports::{ClockPort, WallTime};
use crate::error::ClockError;

/// Anything before 2020-01-01 means the system clock was never set.
#[cfg(target_os = "espidf")]
const EPOCH_2020: i64 = 1_577_836_800;

/// Time adapter for the ESP32 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Set the system clock from a trusted wall time (the battery-backed RTC).
    #[cfg(target_os = "espidf")]
    pub fn seed_wall_clock(&mut self, time: &WallTime) -> Result<(), ClockError> {
        use esp_idf_svc::sys;

        let mut tm: sys::tm = unsafe { core::mem::zeroed() };
        tm.tm_year = i32::from(time.year) - 1900;
        tm.tm_mon = i32::from(time.month) - 1;
        tm.tm_mday = i32::from(time.day);
        tm.tm_hour = i32::from(time.hour);
        tm.tm_min = i32::from(time.minute);
        tm.tm_sec = i32::from(time.second);
        tm.tm_isdst = -1;

        let secs = unsafe { sys::mktime(&mut tm) };
        if (secs as i64) < EPOCH_2020 {
            return Err(ClockError::NotSynced);
        }
        let tv = sys::timeval { tv_sec: secs, tv_usec: 0 };
        if unsafe { sys::settimeofday(&tv, core::ptr::null()) } != 0 {
            return Err(ClockError::NotSynced);
        }
        Ok(())
    }

    /// The host has no system clock to seed.
    #[cfg(not(target_os = "espidf"))]
    pub fn seed_wall_clock(&mut self, _time: &WallTime) -> Result<(), ClockError> {
        Err(ClockError::NotSynced)
    }
}

impl ClockPort for Esp32TimeAdapter {
    #[cfg(target_os = "espidf")]
    fn monotonic_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn monotonic_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[cfg(target_os = "espidf")]
    fn now(&self) -> Result<WallTime, ClockError> {
        use esp_idf_svc::sys;

        let mut tv = sys::timeval { tv_sec: 0, tv_usec: 0 };
        if unsafe { sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return Err(ClockError::NotSynced);
        }
        if (tv.tv_sec as i64) < EPOCH_2020 {
            return Err(ClockError::NotSynced);
        }
        let secs = tv.tv_sec as sys::time_t;
        let mut tm: sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { sys::localtime_r(&secs, &mut tm) }.is_null() {
            return Err(ClockError::NotSynced);
        }
        Ok(WallTime {
            year: (tm.tm_year + 1900) as u16,
            month: (tm.tm_mon + 1) as u8,
            day: tm.tm_mday as u8,
            hour: tm.tm_hour as u8,
            minute: tm.tm_min as u8,
            second: tm.tm_sec as u8,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn now(&self) -> Result<WallTime, ClockError> {
        Err(ClockError::NotSynced)
    }

    #[cfg(target_os = "espidf")]
    fn sleep_ms(&mut self, ms: u32) {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn sleep_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
