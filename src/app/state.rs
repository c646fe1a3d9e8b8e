//! Volatile controller state.
//!
//! Everything here is rebuilt from sensors and the remote feed on boot, so
//! a restart can discard it at any tick boundary.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorId {
    Door1,
    Door2,
}

impl DoorId {
    pub const ALL: [Self; 2] = [Self::Door1, Self::Door2];

    /// Relay wired to this door's opener button.
    pub const fn relay(self) -> RelayId {
        match self {
            Self::Door1 => RelayId::One,
            Self::Door2 => RelayId::Two,
        }
    }

    pub const fn number(self) -> u8 {
        match self {
            Self::Door1 => 1,
            Self::Door2 => 2,
        }
    }

    const fn index(self) -> usize {
        self.number() as usize - 1
    }
}

impl fmt::Display for DoorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Door #{}", self.number())
    }
}

/// Relay channels on the relay shield.  `Three` and `Four` are wired but
/// reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayId {
    One,
    Two,
    Three,
    Four,
}

impl RelayId {
    pub const ALL: [Self; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    pub const fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Three => 2,
            Self::Four => 3,
        }
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relay {}", self.index() + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorState {
    /// Last sensor sample.
    pub is_open: bool,
    pub relay: RelayId,
}

/// Phase of the auto-close scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoClosePhase {
    Idle,
    Armed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarageState {
    doors: [DoorState; 2],
    /// Mirrors the dashboard toggle.
    pub auto_close_enabled: bool,
    auto_closing: bool,
    last_auto_close_attempt_ms: u64,
    last_published_ms: Option<u64>,
}

impl GarageState {
    /// Fresh state at `boot_ms`: doors assumed closed until sampled, the
    /// auto-close cooldown starts counting from boot.
    pub fn new(boot_ms: u64) -> Self {
        Self {
            doors: DoorId::ALL.map(|door| DoorState { is_open: false, relay: door.relay() }),
            auto_close_enabled: false,
            auto_closing: false,
            last_auto_close_attempt_ms: boot_ms,
            last_published_ms: None,
        }
    }

    pub fn door(&self, door: DoorId) -> DoorState {
        self.doors[door.index()]
    }

    pub fn set_door_open(&mut self, door: DoorId, is_open: bool) {
        self.doors[door.index()].is_open = is_open;
    }

    pub fn open_doors(&self) -> heapless::Vec<DoorId, 2> {
        DoorId::ALL
            .into_iter()
            .filter(|door| self.door(*door).is_open)
            .collect()
    }

    pub fn is_auto_closing(&self) -> bool {
        self.auto_closing
    }

    pub fn phase(&self) -> AutoClosePhase {
        if self.auto_closing {
            AutoClosePhase::Armed
        } else {
            AutoClosePhase::Idle
        }
    }

    pub fn last_auto_close_attempt_ms(&self) -> u64 {
        self.last_auto_close_attempt_ms
    }

    pub fn last_published_ms(&self) -> Option<u64> {
        self.last_published_ms
    }

    /// `true` between ticks: no sequence is mid-flight, so dropping the
    /// state (restart) loses nothing the next boot cannot rebuild.
    pub fn safe_to_discard(&self) -> bool {
        !self.auto_closing
    }

    pub(crate) fn begin_auto_close(&mut self, now_ms: u64) {
        self.auto_closing = true;
        self.last_auto_close_attempt_ms = now_ms;
    }

    pub(crate) fn end_auto_close(&mut self) {
        self.auto_closing = false;
    }

    pub(crate) fn mark_published(&mut self, now_ms: u64) {
        self.last_published_ms = Some(now_ms);
    }
}
