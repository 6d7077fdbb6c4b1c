//! Two output slots with a single active index.

use thiserror::Error;

use crate::message::SlotId;

/// Attempted to write the slot the renderer is reading.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("slot {0} is active and cannot be written")]
pub struct SlotInUse(pub SlotId);

/// A pair of buffers where readers only ever see the active one.
///
/// Writes go to the inactive slot through [`DoubleBuffer::install`], which
/// replaces the slot's contents in full and only then flips the active index.
#[derive(Debug, Clone, Default)]
pub struct DoubleBuffer<T> {
    one: T,
    two: T,
    active: SlotId,
}

impl<T> DoubleBuffer<T> {
    /// Creates a buffer pair with slot one active.
    pub fn new(one: T, two: T) -> Self {
        Self {
            one,
            two,
            active: SlotId::One,
        }
    }

    /// Returns the slot readers currently see.
    pub fn active_slot(&self) -> SlotId {
        self.active
    }

    /// Returns the slot writers may fill.
    pub fn inactive_slot(&self) -> SlotId {
        self.active_slot().other()
    }

    /// Returns the contents of the active slot.
    pub fn active(&self) -> &T {
        self.slot(self.active_slot())
    }

    /// Returns the contents of a slot.
    pub fn slot(&self, slot: SlotId) -> &T {
        match slot {
            SlotId::One => &self.one,
            SlotId::Two => &self.two,
        }
    }

    /// Replaces the contents of `slot` and makes it active.
    ///
    /// # Errors
    ///
    /// Returns [`SlotInUse`] if `slot` is already active; the buffer is left
    /// untouched.
    pub fn install(&mut self, slot: SlotId, value: T) -> Result<(), SlotInUse> {
        if slot == self.active_slot() {
            return Err(SlotInUse(slot));
        }
        match slot {
            SlotId::One => self.one = value,
            SlotId::Two => self.two = value,
        }
        self.active = slot;
        Ok(())
    }
}

impl<T: Default> DoubleBuffer<T> {
    /// Empties both slots and makes slot one active again.
    pub fn clear(&mut self) {
        self.one = T::default();
        self.two = T::default();
        self.active = SlotId::One;
    }
}
