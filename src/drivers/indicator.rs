//! LED and buzzer panel.
//!
//! Three discrete LEDs (red, yellow, green) and a piezo buzzer, all
//! active-high.  Writes are best-effort: a failed pin write is logged and
//! the rest of the pattern continues.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::{BeepPattern, Led};

pub struct IndicatorPanel<P, D> {
    red: P,
    yellow: P,
    green: P,
    buzzer: P,
    delay: D,
}

impl<P: OutputPin, D: DelayNs> IndicatorPanel<P, D> {
    pub fn new(red: P, yellow: P, green: P, buzzer: P, delay: D) -> Self {
        let mut panel = Self { red, yellow, green, buzzer, delay };
        for led in [Led::Red, Led::Yellow, Led::Green] {
            panel.set(led, false);
        }
        write_pin(&mut panel.buzzer, false, "buzzer");
        panel
    }

    pub fn set(&mut self, led: Led, on: bool) {
        let (pin, name) = match led {
            Led::Red => (&mut self.red, "red LED"),
            Led::Yellow => (&mut self.yellow, "yellow LED"),
            Led::Green => (&mut self.green, "green LED"),
        };
        write_pin(pin, on, name);
    }

    /// Sound `pattern`; each beep is on for its period, then off for the same.
    pub fn beep(&mut self, pattern: BeepPattern) {
        let (count, period_ms) = pattern.shape();
        for _ in 0..count {
            write_pin(&mut self.buzzer, true, "buzzer");
            self.delay.delay_ms(period_ms);
            write_pin(&mut self.buzzer, false, "buzzer");
            self.delay.delay_ms(period_ms);
        }
    }
}

fn write_pin<P: OutputPin>(pin: &mut P, high: bool, name: &str) {
    let result = if high { pin.set_high() } else { pin.set_low() };
    if result.is_err() {
        warn!("Indicator: failed to drive {name}");
    }
}
