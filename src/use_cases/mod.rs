// Use cases layer: room workflows, moderation and the room registry.

pub mod game;
pub mod lobby;
pub mod moderation;
pub mod types;

pub use types::{CommandRequest, GameEvent, RoomUpdate};
