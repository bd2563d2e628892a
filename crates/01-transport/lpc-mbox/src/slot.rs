//! The single in-flight message slot.
//!
//! Every transition happens under one lock. A message taken for completion
//! leaves the slot in `Completing` until [`InFlightSlot::release`], so the
//! channel stays busy while the completion callback runs.

use crate::codec::MboxMsg;

#[cfg(feature = "loom")]
use self::loom_sync::Mutex;
#[cfg(not(feature = "loom"))]
use parking_lot::Mutex;

#[cfg(feature = "loom")]
mod loom_sync {
    /// `parking_lot`-shaped wrapper so the slot body is shared with loom builds.
    pub(crate) struct Mutex<T>(loom::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub(crate) fn new(value: T) -> Self {
            Self(loom::sync::Mutex::new(value))
        }

        pub(crate) fn lock(&self) -> loom::sync::MutexGuard<'_, T> {
            self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }
}

/// Outcome of [`InFlightSlot::take_for_completion`].
#[derive(Debug, PartialEq, Eq)]
pub enum Completion {
    Ready(MboxMsg),
    /// Another caller took the message and has not released the slot yet.
    InProgress,
    Idle,
}

#[derive(Debug)]
enum SlotState {
    Idle,
    InFlight(MboxMsg),
    Completing,
}

pub struct InFlightSlot {
    state: Mutex<SlotState>,
}

impl Default for InFlightSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl InFlightSlot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Idle),
        }
    }

    /// Claims the slot for `msg`, handing it back if the slot is occupied.
    pub fn try_claim(&self, msg: MboxMsg) -> Result<(), MboxMsg> {
        let mut state = self.state.lock();
        match *state {
            SlotState::Idle => {
                *state = SlotState::InFlight(msg);
                Ok(())
            }
            SlotState::InFlight(_) | SlotState::Completing => Err(msg),
        }
    }

    /// Moves the in-flight message out, leaving the slot occupied until
    /// [`InFlightSlot::release`].
    pub fn take_for_completion(&self) -> Completion {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, SlotState::Completing) {
            SlotState::InFlight(msg) => Completion::Ready(msg),
            SlotState::Completing => Completion::InProgress,
            SlotState::Idle => {
                *state = SlotState::Idle;
                Completion::Idle
            }
        }
    }

    /// Frees the slot after a completion.
    pub fn release(&self) {
        *self.state.lock() = SlotState::Idle;
    }

    /// Empties the slot, returning a message that never completed.
    pub fn drain(&self) -> Option<MboxMsg> {
        match std::mem::replace(&mut *self.state.lock(), SlotState::Idle) {
            SlotState::InFlight(msg) => Some(msg),
            SlotState::Idle | SlotState::Completing => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        !matches!(*self.state.lock(), SlotState::Idle)
    }
}
