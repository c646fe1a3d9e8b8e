//! GPIO drivers for the relay shield, door reed switches and the
//! LED/buzzer panel.
//!
//! Every driver is generic over the `embedded-hal` 1.0 pin and delay
//! traits.  On ESP-IDF they are instantiated with `PinDriver` and
//! `FreeRtos`; tests use the in-memory doubles in [`mock`].

pub mod door_switch;
pub mod indicator;
pub mod relay;
