use super::error::SessionError;
use super::{SessionResult, Slot};

/// Tracks which of the two player slots are taken.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    occupied: [bool; 2],
}

impl PlayerRegistry {
    /// Claims the first free slot.
    pub fn assign_slot(&mut self) -> SessionResult<Slot> {
        let slot = Slot::ALL
            .into_iter()
            .find(|&slot| !self.is_occupied(slot))
            .ok_or(SessionError::NoSlotAvailable)?;
        self.occupied[Self::position(slot)] = true;
        Ok(slot)
    }

    /// Frees `slot`. Returns whether it was taken before the call.
    pub fn release_slot(&mut self, slot: Slot) -> bool {
        std::mem::replace(&mut self.occupied[Self::position(slot)], false)
    }

    pub fn is_occupied(&self, slot: Slot) -> bool {
        self.occupied[Self::position(slot)]
    }

    pub fn has_free_slot(&self) -> bool {
        self.occupied.iter().any(|taken| !taken)
    }

    fn position(slot: Slot) -> usize {
        usize::from(slot.id() - 1)
    }
}

/// Registry and presence counter, always mutated together under one lock.
///
/// Presence counts admitted connections, minus handlers that are currently waiting for
/// a rematch answer. Handlers read it to decide whether an opponent is around.
#[derive(Debug, Default)]
pub struct Lobby {
    registry: PlayerRegistry,
    presence: usize,
    away: [bool; 2],
}

impl Lobby {
    pub fn admit(&mut self) -> SessionResult<Slot> {
        let slot = self.registry.assign_slot()?;
        self.presence += 1;
        Ok(slot)
    }

    /// Releases the slot and drops it from the presence count. Calling it twice for the
    /// same slot has no further effect.
    pub fn leave(&mut self, slot: Slot) {
        self.step_back(slot);
        if self.registry.release_slot(slot) {
            self.presence = self.presence.saturating_sub(1);
        }
    }

    /// Temporarily removes `slot` from the presence count.
    pub fn step_away(&mut self, slot: Slot) {
        let away = &mut self.away[PlayerRegistry::position(slot)];
        if !*away && self.registry.is_occupied(slot) {
            *away = true;
            self.presence = self.presence.saturating_sub(1);
        }
    }

    /// Undoes [`Lobby::step_away`].
    pub fn step_back(&mut self, slot: Slot) {
        let away = &mut self.away[PlayerRegistry::position(slot)];
        if *away {
            *away = false;
            self.presence += 1;
        }
    }

    pub fn presence(&self) -> usize {
        self.presence
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn has_free_slot(&self) -> bool {
        self.registry.has_free_slot()
    }
}
