//! Bridges the shields to the domain port traits.
//!
//! Owns both door switches, the relay board, the LED/buzzer panel and
//! the sensor shield, exposing them through the hardware ports.  This is
//! the only module that touches real peripherals; every driver underneath
//! is generic over `embedded-hal`, so host tests instantiate the same
//! adapter with mock pins.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::I2c;

use crate::app::ports::{
    BeepPattern, DoorSensorPort, EnvironmentPort, EnvironmentReadings, IndicatorPort, Led, RelayPort,
};
use crate::app::state::{DoorId, RelayId};
use crate::drivers::door_switch::DoorSwitch;
use crate::drivers::indicator::IndicatorPanel;
use crate::drivers::relay::RelayBoard;
use crate::error::{ActuatorError, SensorError};
use crate::sensors::SensorShield;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<I, O, B, D> {
    doors: [DoorSwitch<I>; 2],
    relays: RelayBoard<O, D>,
    panel: IndicatorPanel<O, D>,
    shield: SensorShield<B, D>,
}

impl<I, O, B, D> HardwareAdapter<I, O, B, D>
where
    I: InputPin,
    O: OutputPin,
    B: I2c,
    D: DelayNs,
{
    pub fn new(
        doors: [DoorSwitch<I>; 2],
        relays: RelayBoard<O, D>,
        panel: IndicatorPanel<O, D>,
        shield: SensorShield<B, D>,
    ) -> Self {
        Self { doors, relays, panel, shield }
    }

    pub fn shield_mut(&mut self) -> &mut SensorShield<B, D> {
        &mut self.shield
    }
}

// ── DoorSensorPort ────────────────────────────────────────────

impl<I: InputPin, O, B, D> DoorSensorPort for HardwareAdapter<I, O, B, D> {
    fn is_open(&mut self, door: DoorId) -> Result<bool, SensorError> {
        let index = match door {
            DoorId::Door1 => 0,
            DoorId::Door2 => 1,
        };
        self.doors[index].is_open()
    }
}

// ── RelayPort ─────────────────────────────────────────────────

impl<I, O: OutputPin, B, D: DelayNs> RelayPort for HardwareAdapter<I, O, B, D> {
    fn pulse_relay(&mut self, relay: RelayId) -> Result<(), ActuatorError> {
        self.relays.pulse(relay)
    }

    fn reset_relays(&mut self) -> Result<(), ActuatorError> {
        self.relays.release_all()
    }
}

// ── IndicatorPort ─────────────────────────────────────────────

impl<I, O: OutputPin, B, D: DelayNs> IndicatorPort for HardwareAdapter<I, O, B, D> {
    fn set_led(&mut self, led: Led, on: bool) {
        self.panel.set(led, on);
    }

    fn beep(&mut self, pattern: BeepPattern) {
        self.panel.beep(pattern);
    }
}

// ── EnvironmentPort ───────────────────────────────────────────

impl<I, O, B: I2c, D: DelayNs> EnvironmentPort for HardwareAdapter<I, O, B, D> {
    fn read_environment(&mut self) -> Result<EnvironmentReadings, SensorError> {
        self.shield.read()
    }
}
