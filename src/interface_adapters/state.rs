use crate::domain::ports::{IdentityProvider, StatsRepository};
use crate::use_cases::lobby::RoomRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Rooms by name, created lazily on first connection.
    pub room_registry: Arc<RoomRegistry>,
    // Room used when the client does not pass `?room=`.
    pub default_room: Arc<str>,
    // Resolves join tokens to account identities.
    pub identity: Arc<dyn IdentityProvider>,
    // Account flags and end-of-game totals.
    pub stats: Arc<dyn StatsRepository>,
}
