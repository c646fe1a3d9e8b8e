//! Four-channel relay shield.
//!
//! The relays are active-low: driving a channel low closes its contact,
//! which shorts the door opener's push-button.  Idle is high on every
//! channel.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::app::state::RelayId;
use crate::error::ActuatorError;

/// How long the contact stays closed for one button press.
pub const PULSE_MS: u32 = 500;

pub struct RelayBoard<P, D> {
    channels: [P; 4],
    delay: D,
}

impl<P: OutputPin, D: DelayNs> RelayBoard<P, D> {
    /// Take the four channel pins (relay 1 first) and park them at idle.
    pub fn new(channels: [P; 4], delay: D) -> Result<Self, ActuatorError> {
        let mut board = Self { channels, delay };
        board.release_all()?;
        Ok(board)
    }

    /// Close `relay` for [`PULSE_MS`], then return every channel to idle.
    ///
    /// The release runs even when engaging the channel failed.
    pub fn pulse(&mut self, relay: RelayId) -> Result<(), ActuatorError> {
        let engaged = self.channels[relay.index()]
            .set_low()
            .map_err(|_| ActuatorError::GpioWriteFailed);
        if engaged.is_ok() {
            self.delay.delay_ms(PULSE_MS);
        }
        let released = self.release_all();
        engaged.and(released)
    }

    /// Drive every channel to idle, attempting all of them before reporting.
    pub fn release_all(&mut self) -> Result<(), ActuatorError> {
        let mut result = Ok(());
        for pin in &mut self.channels {
            if pin.set_high().is_err() {
                result = Err(ActuatorError::GpioWriteFailed);
            }
        }
        result
    }
}
