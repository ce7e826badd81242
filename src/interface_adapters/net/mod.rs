// Network adapter for client WebSocket sessions.

pub mod client;

pub use client::{spawn_room_serializer, ws_handler};
