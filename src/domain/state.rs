// Domain-level room entities, account data and snapshot types.

use std::time::Instant;

/// Roster key: a connection id for humans, `bot_<n>` for bots.
pub type EntityId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Privilege {
    Guest,
    Member,
    Moderator,
    Admin,
}

impl Privilege {
    pub fn from_flags(is_guest: bool, is_admin: bool, is_moderator: bool) -> Self {
        if is_guest {
            Privilege::Guest
        } else if is_admin {
            Privilege::Admin
        } else if is_moderator {
            Privilege::Moderator
        } else {
            Privilege::Member
        }
    }

    pub fn is_admin(self) -> bool {
        self == Privilege::Admin
    }

    pub fn can_moderate(self) -> bool {
        matches!(self, Privilege::Moderator | Privilege::Admin)
    }

    /// Marker appended to the sender name in chat.
    pub fn chat_suffix(self) -> &'static str {
        match self {
            Privilege::Admin => " [ADMIN]",
            Privilege::Moderator => " [MOD]",
            Privilege::Member | Privilege::Guest => "",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Privilege::Guest => "guest",
            Privilege::Member => "member",
            Privilege::Moderator => "moderator",
            Privilege::Admin => "admin",
        }
    }
}

/// Identity resolved from a session token by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub account_id: u64,
    pub username: String,
    pub is_guest: bool,
    pub is_admin: bool,
    pub is_moderator: bool,
}

/// Persistent per-account flags held by the stats repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountFlags {
    pub is_admin: bool,
    pub is_moderator: bool,
    pub god_mode: bool,
    /// Epoch seconds at which an active mute ends.
    pub muted_until: Option<u64>,
    pub banned_reason: Option<String>,
}

impl AccountFlags {
    pub fn privilege(&self, is_guest: bool) -> Privilege {
        Privilege::from_flags(is_guest, self.is_admin, self.is_moderator)
    }

    pub fn is_banned(&self) -> bool {
        self.banned_reason.is_some()
    }
}

/// Single flag write issued by moderation commands.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountFlag {
    GodMode(bool),
    Moderator(bool),
    MutedUntil(Option<u64>),
    Banned(Option<String>),
}

#[derive(Debug, Clone)]
pub struct HumanState {
    pub account_id: u64,
    pub is_guest: bool,
    pub privilege: Privilege,
    pub god_mode: bool,
    pub muted_until: Option<u64>,
}

impl HumanState {
    pub fn new(identity: &Identity, flags: &AccountFlags) -> Self {
        Self {
            account_id: identity.account_id,
            is_guest: identity.is_guest,
            privilege: flags.privilege(identity.is_guest),
            god_mode: flags.god_mode && !identity.is_guest,
            muted_until: flags.muted_until,
        }
    }

    pub fn is_muted(&self, now_epoch_secs: u64) -> bool {
        self.muted_until.is_some_and(|until| until > now_epoch_secs)
    }
}

#[derive(Debug, Clone)]
pub struct BotState {
    pub ordinal: usize,
    /// Seconds accumulated since the last heading change.
    pub move_timer: f32,
    pub move_direction: f32,
}

#[derive(Debug, Clone)]
pub enum EntityKind {
    Human(HumanState),
    Bot(BotState),
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub username: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,

    // Combat state.
    pub health: i32,
    pub weapon: String,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,

    pub kind: EntityKind,
}

impl Entity {
    pub fn is_bot(&self) -> bool {
        matches!(self.kind, EntityKind::Bot(_))
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn human(&self) -> Option<&HumanState> {
        match &self.kind {
            EntityKind::Human(h) => Some(h),
            EntityKind::Bot(_) => None,
        }
    }

    pub fn human_mut(&mut self) -> Option<&mut HumanState> {
        match &mut self.kind {
            EntityKind::Human(h) => Some(h),
            EntityKind::Bot(_) => None,
        }
    }

    /// God mode only ever shields humans.
    pub fn is_invulnerable(&self) -> bool {
        self.human().is_some_and(|h| h.god_mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub x: f32,
    pub y: f32,
}

/// Client-reported pose from a movement update.
#[derive(Debug, Clone)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub health: Option<i32>,
    pub weapon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BulletSpec {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub damage: i32,
    pub weapon: String,
}

pub struct Bullet {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub damage: i32,
    pub weapon: String,
    pub shooter_id: EntityId,
    pub created_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub display_name: String,
    pub text: String,
    /// Epoch milliseconds.
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub username: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub health: i32,
    pub weapon: String,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
    pub is_bot: bool,
}

#[derive(Debug, Clone)]
pub struct BulletSnapshot {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub damage: i32,
    pub weapon: String,
    pub shooter_id: EntityId,
}

#[derive(Debug, Clone, Default)]
pub struct RoomSnapshot {
    pub entities: Vec<EntitySnapshot>,
    pub bullets: Vec<BulletSnapshot>,
    pub scores: Vec<(EntityId, u32)>,
    pub chat: Vec<ChatMessage>,
}

/// Admin roster row.
#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub id: EntityId,
    pub username: String,
    pub account_id: Option<u64>,
    pub is_bot: bool,
    pub is_guest: bool,
    pub privilege: Option<Privilege>,
    pub god_mode: bool,
    pub muted_until: Option<u64>,
    pub health: i32,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
}

impl From<&Entity> for EntitySnapshot {
    fn from(e: &Entity) -> Self {
        Self {
            id: e.id.clone(),
            username: e.username.clone(),
            x: e.x,
            y: e.y,
            rotation: e.rotation,
            health: e.health,
            weapon: e.weapon.clone(),
            score: e.score,
            kills: e.kills,
            deaths: e.deaths,
            is_bot: e.is_bot(),
        }
    }
}

impl From<&Bullet> for BulletSnapshot {
    fn from(b: &Bullet) -> Self {
        Self {
            x: b.x,
            y: b.y,
            angle: b.angle,
            damage: b.damage,
            weapon: b.weapon.clone(),
            shooter_id: b.shooter_id.clone(),
        }
    }
}

impl From<&Entity> for PlayerInfo {
    fn from(e: &Entity) -> Self {
        let human = e.human();
        Self {
            id: e.id.clone(),
            username: e.username.clone(),
            account_id: human.map(|h| h.account_id),
            is_bot: e.is_bot(),
            is_guest: human.is_some_and(|h| h.is_guest),
            privilege: human.map(|h| h.privilege),
            god_mode: human.is_some_and(|h| h.god_mode),
            muted_until: human.and_then(|h| h.muted_until),
            health: e.health,
            score: e.score,
            kills: e.kills,
            deaths: e.deaths,
        }
    }
}
