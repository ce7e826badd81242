// Per-room simulation systems operating on room state.

pub mod bots;
pub mod combat;
