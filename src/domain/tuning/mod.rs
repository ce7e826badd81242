// Gameplay tuning, kept apart from runtime/server configuration.

pub mod arena;
pub mod bot;
pub mod combat;
pub mod weapon;
