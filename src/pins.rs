//! GPIO / peripheral pin assignments for the garage controller board.
//!
//! Single source of truth: `main` turns the chip's typed pins into the
//! drivers through [`BoardPins::take`] and nothing else names a GPIO.
//!
//! | Signal          | GPIO | Shield          |
//! |-----------------|------|-----------------|
//! | Relay 1 (door1) | 5    | relay           |
//! | Relay 2 (door2) | 8    | relay           |
//! | Relay 3         | 12   | relay           |
//! | Relay 4         | 13   | relay           |
//! | Door 1 reed     | 10   | (pull-up input) |
//! | Door 2 reed     | 9    | (pull-up input) |
//! | Red LED         | 18   | learning        |
//! | Yellow LED      | 17   | learning        |
//! | Green LED       | 16   | learning        |
//! | Buzzer          | 6    | learning        |
//! | I2C SDA         | 3    | sensors         |
//! | I2C SCL         | 4    | sensors         |

use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, IOPin, OutputPin, Pins};

pub struct BoardPins {
    pub relays: [AnyOutputPin; 4],
    pub door1: AnyIOPin,
    pub door2: AnyIOPin,
    pub red: AnyOutputPin,
    pub yellow: AnyOutputPin,
    pub green: AnyOutputPin,
    pub buzzer: AnyOutputPin,
    pub sda: AnyIOPin,
    pub scl: AnyIOPin,
}

impl BoardPins {
    pub fn take(pins: Pins) -> Self {
        Self {
            relays: [
                pins.gpio5.downgrade_output(),
                pins.gpio8.downgrade_output(),
                pins.gpio12.downgrade_output(),
                pins.gpio13.downgrade_output(),
            ],
            door1: pins.gpio10.downgrade(),
            door2: pins.gpio9.downgrade(),
            red: pins.gpio18.downgrade_output(),
            yellow: pins.gpio17.downgrade_output(),
            green: pins.gpio16.downgrade_output(),
            buzzer: pins.gpio6.downgrade_output(),
            sda: pins.gpio3.downgrade(),
            scl: pins.gpio4.downgrade(),
        }
    }
}
