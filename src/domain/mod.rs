// Domain layer: core simulation types and rules.

pub mod events;
pub mod geometry;
pub mod ports;
pub mod room;
pub mod state;
pub mod systems;
pub mod tuning;

pub use events::{CommandResult, Notice, Outbox};
pub use room::{ChatOutcome, Room, RoomError, RoomPhase};
pub use state::{
    AccountFlag, AccountFlags, EntityId, EntitySnapshot, Identity, Privilege, RoomSnapshot,
};
