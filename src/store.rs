use crate::error::{ClimateError, Result};
use crate::subscription::{StoreEvent, StoreReceiver};
use crate::types::{Room, RoomId, RoomPatch};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Snapshot of the room list. Rooms untouched by an update keep their
/// allocation across snapshots.
pub type RoomList = Arc<Vec<Arc<Room>>>;

struct StoreState {
    rooms: RoomList,
    active: Option<RoomId>,
}

/// Holds every room and the active (full-screen) selection
///
/// `update_room` and `select_room` are the only ways to change state. Each
/// update swaps in a new list, so readers never see a half-merged room.
///
/// # Example
///
/// ```
/// use climate_dash::{Room, RoomPatch, RoomStore, Thermostat};
///
/// let store = RoomStore::new(vec![
///     Room::new(1, "Living Room", "http://192.168.1.40", Thermostat::new(false, 26.0)),
/// ])
/// .unwrap();
///
/// store.select_room(Some(1));
/// store.update_room(1, &RoomPatch { temperature: Some(29.0), ..Default::default() });
/// assert_eq!(store.active_room().unwrap().temperature, 29.0);
/// ```
#[derive(Clone)]
pub struct RoomStore {
    state: Arc<RwLock<StoreState>>,
    update_tx: broadcast::Sender<StoreEvent>,
}

impl RoomStore {
    /// Create a store seeded with `rooms`; ids must be unique
    pub fn new(rooms: Vec<Room>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for room in &rooms {
            if !seen.insert(room.id) {
                return Err(ClimateError::DuplicateRoom(room.id));
            }
        }

        let (update_tx, _) = broadcast::channel(100);
        let rooms = rooms.into_iter().map(Arc::new).collect();
        Ok(Self {
            state: Arc::new(RwLock::new(StoreState {
                rooms: Arc::new(rooms),
                active: None,
            })),
            update_tx,
        })
    }

    /// Subscribe to store changes
    pub fn subscribe(&self) -> StoreReceiver {
        StoreReceiver::new(self.update_tx.subscribe())
    }

    /// Current room list
    pub fn rooms(&self) -> RoomList {
        self.state.read().rooms.clone()
    }

    /// Number of rooms
    pub fn room_count(&self) -> usize {
        self.state.read().rooms.len()
    }

    /// Copy of one room
    pub fn room(&self, id: RoomId) -> Option<Room> {
        self.state
            .read()
            .rooms
            .iter()
            .find(|r| r.id == id)
            .map(|r| Room::clone(r))
    }

    /// Id of the active room
    pub fn active_room_id(&self) -> Option<RoomId> {
        self.state.read().active
    }

    /// The active room, looked up in the current list
    pub fn active_room(&self) -> Option<Room> {
        let state = self.state.read();
        let id = state.active?;
        state.rooms.iter().find(|r| r.id == id).map(|r| Room::clone(r))
    }

    /// Make `id` the active room, or clear the selection with `None`
    ///
    /// An unknown id clears the selection.
    pub fn select_room(&self, id: Option<RoomId>) -> Option<Room> {
        let (selected, changed) = {
            let mut state = self.state.write();
            let selected = id.and_then(|id| state.rooms.iter().find(|r| r.id == id).cloned());
            let active = selected.as_ref().map(|r| r.id);
            if id.is_some() && active.is_none() {
                tracing::warn!("Cannot select unknown room {:?}", id);
            }
            let changed = state.active != active;
            state.active = active;
            (selected, changed)
        };

        if changed {
            let _ = self
                .update_tx
                .send(StoreEvent::ActiveChanged(selected.as_ref().map(|r| r.id)));
        }
        selected.map(|r| Room::clone(&r))
    }

    /// Merge `patch` into the room with `id`
    ///
    /// Every other room is left untouched. Returns `false` if no room has
    /// this id.
    pub fn update_room(&self, id: RoomId, patch: &RoomPatch) -> bool {
        {
            let mut state = self.state.write();
            let Some(index) = state.rooms.iter().position(|r| r.id == id) else {
                tracing::debug!("Ignoring update for unknown room {}", id);
                return false;
            };

            let updated = patch.apply_to(&state.rooms[index]);
            if updated == *state.rooms[index] {
                return true;
            }

            let mut rooms: Vec<Arc<Room>> = state.rooms.as_ref().clone();
            rooms[index] = Arc::new(updated);
            state.rooms = Arc::new(rooms);
        }

        let _ = self.update_tx.send(StoreEvent::RoomUpdated(id));
        true
    }
}
