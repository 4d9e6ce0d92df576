use crate::store::RoomStore;
use crate::types::{Celsius, RoomId, RoomPatch, Thermostat};

/// An optimistic thermostat change
///
/// Captures the thermostat before and after the change so the local state
/// can be updated ahead of the remote call and restored if it fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermostatCommand {
    pub room_id: RoomId,
    pub before: Thermostat,
    pub after: Thermostat,
}

impl ThermostatCommand {
    pub fn new(room_id: RoomId, before: Thermostat, after: Thermostat) -> Self {
        Self {
            room_id,
            before,
            after,
        }
    }

    /// Power change on top of `before`
    pub fn power(room_id: RoomId, before: Thermostat, on: bool) -> Self {
        Self::new(room_id, before, before.with_power(on))
    }

    /// Target change on top of `before`
    pub fn target(room_id: RoomId, before: Thermostat, target: Celsius) -> Self {
        Self::new(room_id, before, before.with_target(target))
    }

    /// Whether applying would change anything
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }

    /// Write `after` into the store
    pub fn apply(&self, store: &RoomStore) -> bool {
        store.update_room(self.room_id, &RoomPatch::thermostat(self.after))
    }

    /// Write `before` back into the store
    pub fn revert(&self, store: &RoomStore) -> bool {
        tracing::info!(
            "Reverting thermostat of room {} to {:?}",
            self.room_id,
            self.before
        );
        store.update_room(self.room_id, &RoomPatch::thermostat(self.before))
    }
}
