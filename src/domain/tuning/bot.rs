use std::time::Duration;

/// Bot steering tuning.
#[derive(Debug, Clone, Copy)]
pub struct BotTuning {
    /// Minimum time between two bot passes; also the timer step per pass.
    pub update_interval: Duration,

    /// Distance travelled per pass in world units.
    pub speed: f32,

    /// Seconds a bot keeps its heading before picking a new one.
    pub direction_change_after: f32,

    /// Living entities closer than this turn the bot around.
    pub avoid_radius: f32,
}

impl Default for BotTuning {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_millis(100),
            speed: 3.0,
            direction_change_after: 3.0,
            avoid_radius: 100.0,
        }
    }
}
