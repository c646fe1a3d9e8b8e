//! Magnetic reed switch on a door.
//!
//! The switch pulls the input to ground while the magnet is near (door
//! shut); the internal pull-up reads high once the door moves away.

use embedded_hal::digital::InputPin;

use crate::error::SensorError;

pub struct DoorSwitch<P> {
    pin: P,
}

impl<P: InputPin> DoorSwitch<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn is_open(&mut self) -> Result<bool, SensorError> {
        self.pin.is_high().map_err(|_| SensorError::GpioReadFailed)
    }
}
