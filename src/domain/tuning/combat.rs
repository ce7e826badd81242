use std::f32::consts::FRAC_PI_4;
use std::time::Duration;

/// Damage, scoring and bullet lifetime tuning.
#[derive(Debug, Clone, Copy)]
pub struct CombatTuning {
    pub max_health: i32,

    /// Damage applied when a hit report omits it.
    pub default_hit_damage: i32,

    /// Score awarded to the shooter per kill.
    pub kill_score: u32,

    /// Half-width of the frontal melee arc in radians.
    pub melee_half_arc: f32,

    /// Upper bound for client-supplied melee range.
    pub max_melee_range: f32,

    /// Bullets older than this are purged before the next snapshot.
    pub bullet_ttl: Duration,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            max_health: 100,
            default_hit_damage: 15,
            kill_score: 10,
            melee_half_arc: FRAC_PI_4,
            max_melee_range: 75.0,
            bullet_ttl: Duration::from_secs(2),
        }
    }
}

impl CombatTuning {
    /// Clamps client-supplied damage so a hit can never heal or overkill past max health.
    pub fn clamp_damage(&self, damage: i32) -> i32 {
        damage.clamp(0, self.max_health)
    }
}
