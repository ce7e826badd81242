// Room orchestration: lazily spawns and tracks one room task per room name.

use crate::domain::ports::StatsRepository;
use crate::domain::room::{Room, RoomPhase};
use crate::use_cases::game::room_task;
use crate::use_cases::{GameEvent, RoomUpdate};
use axum::extract::ws::Utf8Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Notify, RwLock};
use tracing::info;

const MAX_ROOM_NAME_LEN: usize = 32;

/// Shared configuration for spawning room tasks.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Capacity for inbound player events.
    pub input_channel_capacity: usize,
    /// Capacity for broadcast room updates.
    pub update_broadcast_capacity: usize,
    /// Bot pass cadence while humans are present.
    pub tick_interval: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            input_channel_capacity: 1024,
            update_broadcast_capacity: 128,
            tick_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Room names are 1-32 characters of `[A-Za-z0-9_-]`.
    InvalidName,
}

/// Per-room channels.
#[derive(Clone)]
pub struct RoomHandle {
    pub room_id: Arc<str>,
    /// Sender for game events into the room task.
    pub input_tx: mpsc::Sender<GameEvent>,
    /// Broadcast sender for raw room updates.
    pub update_tx: broadcast::Sender<RoomUpdate>,
    /// Broadcast sender for serialized room updates.
    pub update_bytes_tx: broadcast::Sender<Utf8Bytes>,
    /// Latest serialized snapshot, replayed to lagging or new subscribers.
    pub latest_tx: watch::Sender<Utf8Bytes>,
    pub phase_rx: watch::Receiver<RoomPhase>,
    shutdown: Arc<Notify>,
}

/// Thread-safe registry of live rooms. Rooms are never removed once created.
pub struct RoomRegistry {
    settings: RoomSettings,
    stats: Arc<dyn StatsRepository>,
    rooms: RwLock<HashMap<String, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings, stats: Arc<dyn StatsRepository>) -> Self {
        Self {
            settings,
            stats,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the room's handle, creating and seeding the room on first use.
    ///
    /// `on_create` runs under the registry lock before any other caller can see the new room,
    /// so subscribers it attaches observe the room's first update. The flag is true when this
    /// call created the room.
    pub async fn get_or_create(
        &self,
        room_id: &str,
        on_create: impl FnOnce(&RoomHandle),
    ) -> Result<(RoomHandle, bool), RegistryError> {
        if !is_valid_room_name(room_id) {
            return Err(RegistryError::InvalidName);
        }
        if let Some(handle) = self.rooms.read().await.get(room_id) {
            return Ok((handle.clone(), false));
        }

        let mut rooms = self.rooms.write().await;
        // Another connection may have created it between the two locks.
        if let Some(handle) = rooms.get(room_id) {
            return Ok((handle.clone(), false));
        }

        let mut room = Room::new(room_id);
        room.seed_bots();

        let (input_tx, input_rx) = mpsc::channel::<GameEvent>(self.settings.input_channel_capacity);
        let (update_tx, _update_rx) =
            broadcast::channel::<RoomUpdate>(self.settings.update_broadcast_capacity);
        let (update_bytes_tx, _update_bytes_rx) =
            broadcast::channel::<Utf8Bytes>(self.settings.update_broadcast_capacity);
        let (latest_tx, _latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
        let (phase_tx, phase_rx) = watch::channel(room.phase());
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(room_task(
            room,
            input_rx,
            update_tx.clone(),
            phase_tx,
            Arc::clone(&self.stats),
            self.settings.tick_interval,
            Arc::clone(&shutdown),
        ));
        info!(room = room_id, "room created");

        let handle = RoomHandle {
            room_id: Arc::from(room_id),
            input_tx,
            update_tx,
            update_bytes_tx,
            latest_tx,
            phase_rx,
            shutdown,
        };
        on_create(&handle);
        rooms.insert(room_id.to_string(), handle.clone());
        Ok((handle, true))
    }

    pub async fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Room names with their current phase, sorted by name.
    pub async fn phases(&self) -> Vec<(String, RoomPhase)> {
        let rooms = self.rooms.read().await;
        let mut out: Vec<(String, RoomPhase)> = rooms
            .iter()
            .map(|(id, h)| (id.clone(), *h.phase_rx.borrow()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Stops every room task; used on server shutdown.
    pub async fn shutdown_all(&self) {
        for handle in self.rooms.read().await.values() {
            handle.shutdown.notify_one();
        }
    }
}

pub fn is_valid_room_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_ROOM_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
