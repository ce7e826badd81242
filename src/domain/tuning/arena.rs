/// Arena bounds, spawn pool and room seeding.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

/// Fixed spawn pool; joins and respawns pick uniformly from it.
pub const SPAWN_POINTS: [(f32, f32); 10] = [
    (100.0, 100.0),
    (900.0, 100.0),
    (100.0, 900.0),
    (900.0, 900.0),
    (500.0, 500.0),
    (500.0, 100.0),
    (500.0, 900.0),
    (100.0, 500.0),
    (900.0, 500.0),
    (300.0, 700.0),
];

/// Display names handed to bots by ordinal.
pub const BOT_NAMES: [&str; 5] = [
    "Dusty Pete",
    "Rattlesnake Jim",
    "Sheriff Bot",
    "Tumbleweed",
    "Calamity Kate",
];

#[derive(Debug, Clone, Copy)]
pub struct ArenaTuning {
    /// Arena width in world units; x is clamped to `0.0..=width`.
    pub width: f32,

    /// Arena height in world units; y is clamped to `0.0..=height`.
    pub height: f32,

    /// Bots seeded into a room when it is created.
    pub bot_count: usize,

    /// Maximum chat log entries kept per room.
    pub chat_log_capacity: usize,
}

impl Default for ArenaTuning {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 1000.0,
            bot_count: 5,
            chat_log_capacity: 50,
        }
    }
}

impl ArenaTuning {
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }
}
