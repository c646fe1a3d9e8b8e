//! Night-time auto-close policy.
//!
//! The scheduler decides when an attempt is due and owns the sequence
//! timing; the controller runs the sequence itself because it needs the
//! transport and the hardware.  Arming records the attempt, so the
//! cooldown counts from the start of an attempt whatever its outcome.

use log::debug;

use crate::app::ports::{ClockPort, WallTime};
use crate::app::state::{DoorId, GarageState};
use crate::config::{CutoffTime, GarageConfig};

/// How an armed attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoCloseOutcome {
    /// Every door was already closed.
    NothingOpen,
    /// Disabled from the dashboard during the grace window.
    Cancelled,
    /// The snapshot's open doors were toggled.
    Closed(u8),
}

/// Delays used by the auto-close sequence, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoCloseTiming {
    pub grace_ms: u32,
    pub pre_actuation_ms: u32,
    pub final_warning_ms: u32,
    pub settle_ms: u32,
}

pub struct AutoCloseScheduler {
    cutoff: CutoffTime,
    cooldown_ms: u64,
    timing: AutoCloseTiming,
}

impl AutoCloseScheduler {
    pub fn new(config: &GarageConfig) -> Self {
        Self {
            cutoff: config.auto_close_cutoff,
            cooldown_ms: config.auto_close_cooldown_ms(),
            timing: AutoCloseTiming {
                grace_ms: config.grace_period_secs * 1000,
                pre_actuation_ms: config.pre_actuation_pause_secs * 1000,
                final_warning_ms: config.final_warning_pause_secs * 1000,
                settle_ms: config.actuation_settle_secs * 1000,
            },
        }
    }

    pub fn timing(&self) -> AutoCloseTiming {
        self.timing
    }

    pub fn cooldown_elapsed(&self, state: &GarageState, now_ms: u64) -> bool {
        now_ms.saturating_sub(state.last_auto_close_attempt_ms()) >= self.cooldown_ms
    }

    pub fn past_cutoff(&self, wall: &WallTime) -> bool {
        CutoffTime { hour: wall.hour, minute: wall.minute } >= self.cutoff
    }

    /// Every condition except the time of day.
    pub fn preconditions_hold(&self, state: &GarageState, now_ms: u64) -> bool {
        state.auto_close_enabled && !state.is_auto_closing() && self.cooldown_elapsed(state, now_ms)
    }

    /// Arm when due.  Returns the doors that were open at arming time.
    ///
    /// The wall clock is only read once the cheap checks pass; an
    /// unreadable clock means not due.
    pub fn try_arm(
        &self,
        state: &mut GarageState,
        now_ms: u64,
        clock: &impl ClockPort,
    ) -> Option<heapless::Vec<DoorId, 2>> {
        if !self.preconditions_hold(state, now_ms) {
            return None;
        }
        let wall = match clock.now() {
            Ok(wall) => wall,
            Err(e) => {
                debug!("Auto-close check skipped: {e}");
                return None;
            }
        };
        if !self.past_cutoff(&wall) {
            return None;
        }
        state.begin_auto_close(now_ms);
        Some(state.open_doors())
    }

    /// Back to idle.  Must follow every successful `try_arm`.
    pub fn disarm(&self, state: &mut GarageState) {
        state.end_auto_close();
    }
}
