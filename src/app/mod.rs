//! Application core: pure domain logic, no I/O.
//!
//! This module contains the business rules for the garage controller:
//! topic routing, connectivity supervision, telemetry batching and the
//! auto-close schedule, tied together by [`controller::GarageController`].
//! All interaction with hardware and the network happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable without
//! real peripherals.

pub mod autoclose;
pub mod commands;
pub mod connection;
pub mod controller;
pub mod events;
pub mod ports;
pub mod router;
pub mod state;
pub mod telemetry;
