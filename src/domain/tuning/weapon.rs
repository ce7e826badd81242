/// Weapon table shared with the browser client.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponTuning {
    pub name: &'static str,
    pub damage: i32,
    /// Reach for melee weapons; `None` for guns.
    pub melee_range: Option<f32>,
}

pub const PISTOL: WeaponTuning = WeaponTuning {
    name: "pistol",
    damage: 15,
    melee_range: None,
};

pub const SHOTGUN: WeaponTuning = WeaponTuning {
    name: "shotgun",
    damage: 8,
    melee_range: None,
};

pub const SMG: WeaponTuning = WeaponTuning {
    name: "smg",
    damage: 10,
    melee_range: None,
};

pub const KNIFE: WeaponTuning = WeaponTuning {
    name: "knife",
    damage: 35,
    melee_range: Some(50.0),
};

pub const WEAPONS: [WeaponTuning; 4] = [PISTOL, SHOTGUN, SMG, KNIFE];

/// Weapon every entity starts with.
pub const DEFAULT_WEAPON: &str = PISTOL.name;

pub fn lookup(name: &str) -> Option<WeaponTuning> {
    WEAPONS.iter().copied().find(|w| w.name == name)
}
