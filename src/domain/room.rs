// Authoritative per-room state: roster, bullets, scores and chat log.

use super::state::{
    BotState, Bullet, BulletSnapshot, BulletSpec, ChatMessage, Entity, EntityId, EntityKind,
    EntitySnapshot, HumanState, PlayerInfo, Pose, RoomSnapshot, SpawnPoint,
};
use super::systems::bots;
use super::tuning::arena::{ArenaTuning, BOT_NAMES, SPAWN_POINTS};
use super::tuning::bot::BotTuning;
use super::tuning::combat::CombatTuning;
use super::tuning::weapon::{self, DEFAULT_WEAPON};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::f32::consts::TAU;
use std::time::Instant;

/// Longest chat line kept; longer lines are truncated.
const MAX_CHAT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Created, nothing seeded yet.
    Empty,
    /// Bots seeded, no humans connected.
    Populating,
    /// At least one human connected.
    Active,
}

impl RoomPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomPhase::Empty => "empty",
            RoomPhase::Populating => "populating",
            RoomPhase::Active => "active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    UnknownEntity,
    InvalidInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    Appended,
    Muted,
    Blank,
    UnknownSender,
}

pub struct Room {
    name: String,
    entities: HashMap<EntityId, Entity>,
    bullets: Vec<Bullet>,
    scores: HashMap<EntityId, u32>,
    chat_log: VecDeque<ChatMessage>,
    phase: RoomPhase,
    last_bot_update: Option<Instant>,
    spawn_pool: Vec<(f32, f32)>,
    rng: StdRng,
    pub arena: ArenaTuning,
    pub bot_tuning: BotTuning,
    pub combat: CombatTuning,
}

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rng(name, StdRng::from_os_rng())
    }

    /// Builds a room with a caller-provided RNG (seeded in tests).
    pub fn with_rng(name: impl Into<String>, rng: StdRng) -> Self {
        let arena = ArenaTuning::default();
        Self {
            name: name.into(),
            entities: HashMap::new(),
            bullets: Vec::new(),
            scores: HashMap::new(),
            chat_log: VecDeque::with_capacity(arena.chat_log_capacity),
            phase: RoomPhase::Empty,
            last_bot_update: None,
            spawn_pool: SPAWN_POINTS.to_vec(),
            rng,
            arena,
            bot_tuning: BotTuning::default(),
            combat: CombatTuning::default(),
        }
    }

    pub fn with_spawn_pool(mut self, pool: Vec<(f32, f32)>) -> Self {
        self.spawn_pool = pool;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub(crate) fn entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Entity ids sorted, so scans are deterministic.
    pub(crate) fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn human_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| !e.is_bot())
            .map(|e| e.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn has_humans(&self) -> bool {
        self.entities.values().any(|e| !e.is_bot())
    }

    pub fn bot_count(&self) -> usize {
        self.entities.values().filter(|e| e.is_bot()).count()
    }

    pub fn score_of(&self, id: &str) -> Option<u32> {
        self.scores.get(id).copied()
    }

    pub fn bullet_count(&self) -> usize {
        self.bullets.len()
    }

    pub fn chat_log(&self) -> Vec<ChatMessage> {
        self.chat_log.iter().cloned().collect()
    }

    /// Uniform pick from the spawn pool, or any in-bounds point when the pool is empty.
    pub fn pick_spawn(&mut self) -> SpawnPoint {
        if self.spawn_pool.is_empty() {
            return SpawnPoint {
                x: self.rng.random_range(0.0..=self.arena.width),
                y: self.rng.random_range(0.0..=self.arena.height),
            };
        }
        let (x, y) = self.spawn_pool[self.rng.random_range(0..self.spawn_pool.len())];
        SpawnPoint { x, y }
    }

    /// Seeds the fixed bot roster; only the first call on a fresh room has an effect.
    pub fn seed_bots(&mut self) {
        if self.phase != RoomPhase::Empty {
            return;
        }

        for ordinal in 0..self.arena.bot_count {
            let id = format!("bot_{ordinal}");
            let spawn = self.pick_spawn();
            let move_direction = self.rng.random_range(0.0..TAU);
            let entity = Entity {
                id: id.clone(),
                username: BOT_NAMES[ordinal % BOT_NAMES.len()].to_string(),
                x: spawn.x,
                y: spawn.y,
                rotation: move_direction,
                health: self.combat.max_health,
                weapon: DEFAULT_WEAPON.to_string(),
                score: 0,
                kills: 0,
                deaths: 0,
                kind: EntityKind::Bot(BotState {
                    ordinal,
                    move_timer: 0.0,
                    move_direction,
                }),
            };
            self.scores.insert(id.clone(), 0);
            self.entities.insert(id, entity);
        }
        self.phase = RoomPhase::Populating;
    }

    /// Adds a human at a spawn point. Returns `None` (and changes nothing) if `id` is taken.
    pub fn join(&mut self, id: EntityId, username: String, human: HumanState) -> Option<SpawnPoint> {
        if self.entities.contains_key(&id) {
            return None;
        }

        let spawn = self.pick_spawn();
        self.entities.insert(
            id.clone(),
            Entity {
                id: id.clone(),
                username,
                x: spawn.x,
                y: spawn.y,
                rotation: 0.0,
                health: self.combat.max_health,
                weapon: DEFAULT_WEAPON.to_string(),
                score: 0,
                kills: 0,
                deaths: 0,
                kind: EntityKind::Human(human),
            },
        );
        self.scores.insert(id, 0);
        self.phase = RoomPhase::Active;
        Some(spawn)
    }

    /// Removes an entity and its score entry; absent ids are a no-op.
    pub fn leave(&mut self, id: &str) -> Option<Entity> {
        let removed = self.entities.remove(id)?;
        self.scores.remove(id);
        if !self.has_humans() {
            self.phase = if self.entities.is_empty() {
                RoomPhase::Empty
            } else {
                RoomPhase::Populating
            };
            self.last_bot_update = None;
        }
        Some(removed)
    }

    /// Applies a client-reported pose, then runs a gated bot pass.
    ///
    /// Position is clamped into the arena and health may only go down; the weapon is kept
    /// when the reported one is unknown.
    pub fn apply_movement(&mut self, id: &str, pose: &Pose, now: Instant) -> Result<(), RoomError> {
        if !(pose.x.is_finite() && pose.y.is_finite() && pose.rotation.is_finite()) {
            return Err(RoomError::InvalidInput);
        }

        let arena = self.arena;
        let entity = self
            .entities
            .get_mut(id)
            .filter(|e| !e.is_bot())
            .ok_or(RoomError::UnknownEntity)?;

        let (x, y) = arena.clamp(pose.x, pose.y);
        entity.x = x;
        entity.y = y;
        entity.rotation = pose.rotation;
        if let Some(health) = pose.health {
            entity.health = health.clamp(0, entity.health);
        }
        if let Some(w) = pose.weapon.as_deref().and_then(weapon::lookup) {
            entity.weapon = w.name.to_string();
        }

        self.update_bots(now);
        Ok(())
    }

    pub fn add_bullet(&mut self, shooter_id: &str, spec: BulletSpec, now: Instant) -> Result<(), RoomError> {
        if !(spec.x.is_finite() && spec.y.is_finite() && spec.angle.is_finite()) {
            return Err(RoomError::InvalidInput);
        }
        if !self.entities.contains_key(shooter_id) {
            return Err(RoomError::UnknownEntity);
        }

        self.bullets.push(Bullet {
            x: spec.x,
            y: spec.y,
            angle: spec.angle,
            damage: self.combat.clamp_damage(spec.damage),
            weapon: spec.weapon,
            shooter_id: shooter_id.to_string(),
            created_at: now,
        });
        Ok(())
    }

    pub fn purge_expired_bullets(&mut self, now: Instant) {
        let ttl = self.combat.bullet_ttl;
        self.bullets
            .retain(|b| now.saturating_duration_since(b.created_at) < ttl);
    }

    /// Runs one bot pass unless the previous one was less than an update interval ago.
    /// Returns whether the pass ran.
    pub fn update_bots(&mut self, now: Instant) -> bool {
        let interval = self.bot_tuning.update_interval;
        if self
            .last_bot_update
            .is_some_and(|last| now.saturating_duration_since(last) < interval)
        {
            return false;
        }
        self.last_bot_update = Some(now);

        self.purge_expired_bullets(now);
        bots::tick_bots(
            &mut self.entities,
            &mut self.rng,
            &self.bot_tuning,
            &self.arena,
        );
        true
    }

    /// Appends a decorated chat line unless the sender is muted.
    pub fn chat(&mut self, id: &str, text: &str, now_epoch_millis: u64) -> ChatOutcome {
        let Some(entity) = self.entities.get(id) else {
            return ChatOutcome::UnknownSender;
        };
        let Some(human) = entity.human() else {
            return ChatOutcome::UnknownSender;
        };
        if human.is_muted(now_epoch_millis / 1000) {
            return ChatOutcome::Muted;
        }

        let text = text.trim();
        if text.is_empty() {
            return ChatOutcome::Blank;
        }

        let message = ChatMessage {
            display_name: format!("{}{}", entity.username, human.privilege.chat_suffix()),
            text: text.chars().take(MAX_CHAT_CHARS).collect(),
            timestamp: now_epoch_millis,
        };
        self.chat_log.push_back(message);
        while self.chat_log.len() > self.arena.chat_log_capacity {
            self.chat_log.pop_front();
        }
        ChatOutcome::Appended
    }

    /// Full projection sent to clients; expired bullets are dropped first.
    pub fn snapshot(&mut self, now: Instant) -> RoomSnapshot {
        self.purge_expired_bullets(now);

        let mut entities: Vec<EntitySnapshot> =
            self.entities.values().map(EntitySnapshot::from).collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));

        let mut scores: Vec<(EntityId, u32)> =
            self.scores.iter().map(|(id, s)| (id.clone(), *s)).collect();
        scores.sort();

        RoomSnapshot {
            entities,
            bullets: self.bullets.iter().map(BulletSnapshot::from).collect(),
            scores,
            chat: self.chat_log(),
        }
    }

    /// Case-insensitive exact username match, lowest id first.
    pub fn find_by_username(&self, username: &str) -> Option<EntityId> {
        self.sorted_ids().into_iter().find(|id| {
            self.entities
                .get(id)
                .is_some_and(|e| e.username.eq_ignore_ascii_case(username))
        })
    }

    /// Resolves a command target by entity id, falling back to username.
    pub fn resolve_target(&self, key: &str) -> Option<EntityId> {
        if self.entities.contains_key(key) {
            return Some(key.to_string());
        }
        self.find_by_username(key)
    }

    pub fn roster(&self) -> Vec<PlayerInfo> {
        self.sorted_ids()
            .iter()
            .filter_map(|id| self.entities.get(id))
            .map(PlayerInfo::from)
            .collect()
    }

    /// Credits a kill; returns the killer's username if still present.
    pub(crate) fn award_kill(&mut self, killer_id: &str) -> Option<String> {
        let kill_score = self.combat.kill_score;
        let killer = self.entities.get_mut(killer_id)?;
        killer.score += kill_score;
        killer.kills += 1;
        let (score, name) = (killer.score, killer.username.clone());
        self.scores.insert(killer_id.to_string(), score);
        Some(name)
    }

    /// Moves a dead entity to a fresh spawn point at full health.
    pub(crate) fn respawn(&mut self, id: &str) -> Option<SpawnPoint> {
        if !self.entities.contains_key(id) {
            return None;
        }
        let spawn = self.pick_spawn();
        let max_health = self.combat.max_health;
        let entity = self.entities.get_mut(id)?;
        entity.x = spawn.x;
        entity.y = spawn.y;
        entity.health = max_health;
        entity.deaths += 1;
        Some(spawn)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::state::Privilege;
    use std::time::Duration;

    pub(crate) fn seeded_room() -> Room {
        let mut room = Room::with_rng("main", StdRng::seed_from_u64(7));
        room.seed_bots();
        room
    }

    pub(crate) fn member(account_id: u64) -> HumanState {
        HumanState {
            account_id,
            is_guest: false,
            privilege: Privilege::Member,
            god_mode: false,
            muted_until: None,
        }
    }

    fn pose(x: f32, y: f32) -> Pose {
        Pose {
            x,
            y,
            rotation: 0.5,
            health: None,
            weapon: None,
        }
    }

    fn bullet() -> BulletSpec {
        BulletSpec {
            x: 10.0,
            y: 10.0,
            angle: 0.0,
            damage: 15,
            weapon: "pistol".to_string(),
        }
    }

    #[test]
    fn when_room_is_seeded_then_it_holds_five_bots_and_is_populating() {
        let mut room = Room::with_rng("main", StdRng::seed_from_u64(1));
        assert_eq!(room.phase(), RoomPhase::Empty);

        room.seed_bots();
        room.seed_bots();

        assert_eq!(room.bot_count(), 5);
        assert_eq!(room.phase(), RoomPhase::Populating);
        for n in 0..5 {
            let bot = room.entity(&format!("bot_{n}")).expect("bot present");
            assert_eq!(bot.username, BOT_NAMES[n]);
            assert_eq!(bot.health, 100);
        }
    }

    #[test]
    fn when_human_joins_then_spawn_comes_from_pool_and_room_is_active() {
        let mut room = seeded_room();

        let spawn = room
            .join("c1".into(), "Alice".into(), member(1))
            .expect("first join succeeds");

        assert!(SPAWN_POINTS.contains(&(spawn.x, spawn.y)));
        assert_eq!(room.phase(), RoomPhase::Active);
        let alice = room.entity("c1").expect("alice present");
        assert_eq!((alice.x, alice.y), (spawn.x, spawn.y));
        assert_eq!(alice.health, 100);
        assert_eq!(room.score_of("c1"), Some(0));
    }

    #[test]
    fn when_id_already_present_then_join_is_a_no_op() {
        let mut room = seeded_room();
        room.join("c1".into(), "Alice".into(), member(1));
        room.entity_mut("c1").unwrap().health = 40;

        assert!(room.join("c1".into(), "Mallory".into(), member(2)).is_none());
        let alice = room.entity("c1").unwrap();
        assert_eq!(alice.username, "Alice");
        assert_eq!(alice.health, 40);
    }

    #[test]
    fn when_spawn_pool_is_empty_then_spawn_is_in_bounds() {
        let mut room = Room::with_rng("main", StdRng::seed_from_u64(3)).with_spawn_pool(Vec::new());
        for _ in 0..50 {
            let spawn = room.pick_spawn();
            assert!((0.0..=1000.0).contains(&spawn.x));
            assert!((0.0..=1000.0).contains(&spawn.y));
        }
    }

    #[test]
    fn join_and_leave_keep_human_ids_in_sync() {
        let mut room = seeded_room();
        room.join("c1".into(), "Alice".into(), member(1));
        room.join("c2".into(), "Bob".into(), member(2));
        room.join("c3".into(), "Cy".into(), member(3));
        room.leave("c2");
        room.leave("c2");
        room.leave("never-joined");

        assert_eq!(room.human_ids(), vec!["c1".to_string(), "c3".to_string()]);
        assert_eq!(room.score_of("c2"), None);
        assert_eq!(room.bot_count(), 5);
    }

    #[test]
    fn when_last_human_leaves_then_room_falls_back_to_populating() {
        let mut room = seeded_room();
        room.join("c1".into(), "Alice".into(), member(1));

        let removed = room.leave("c1").expect("alice removed");

        assert_eq!(removed.username, "Alice");
        assert_eq!(room.phase(), RoomPhase::Populating);
    }

    #[test]
    fn movement_clamps_position_and_never_raises_health() {
        let mut room = seeded_room();
        room.join("c1".into(), "Alice".into(), member(1));
        let now = Instant::now();

        let mut p = pose(-50.0, 1400.0);
        p.health = Some(60);
        p.weapon = Some("shotgun".into());
        room.apply_movement("c1", &p, now).unwrap();
        let alice = room.entity("c1").unwrap();
        assert_eq!((alice.x, alice.y), (0.0, 1000.0));
        assert_eq!(alice.health, 60);
        assert_eq!(alice.weapon, "shotgun");

        let mut p = pose(10.0, 10.0);
        p.health = Some(100);
        p.weapon = Some("railgun".into());
        room.apply_movement("c1", &p, now).unwrap();
        let alice = room.entity("c1").unwrap();
        assert_eq!(alice.health, 60);
        assert_eq!(alice.weapon, "shotgun");
    }

    #[test]
    fn movement_rejects_non_finite_and_unknown_ids() {
        let mut room = seeded_room();
        room.join("c1".into(), "Alice".into(), member(1));
        let now = Instant::now();

        assert_eq!(
            room.apply_movement("c1", &pose(f32::NAN, 1.0), now),
            Err(RoomError::InvalidInput)
        );
        assert_eq!(
            room.apply_movement("ghost", &pose(1.0, 1.0), now),
            Err(RoomError::UnknownEntity)
        );
        assert_eq!(
            room.apply_movement("bot_0", &pose(1.0, 1.0), now),
            Err(RoomError::UnknownEntity)
        );
    }

    #[test]
    fn bullet_lives_for_exactly_the_ttl() {
        let mut room = seeded_room();
        room.join("c1".into(), "Alice".into(), member(1));
        let t = Instant::now();
        room.add_bullet("c1", bullet(), t).unwrap();

        assert_eq!(room.snapshot(t).bullets.len(), 1);
        assert_eq!(room.snapshot(t + Duration::from_millis(1999)).bullets.len(), 1);
        assert_eq!(room.snapshot(t + Duration::from_secs(2)).bullets.len(), 0);
    }

    #[test]
    fn bullets_from_unknown_shooters_are_rejected() {
        let mut room = seeded_room();
        assert_eq!(
            room.add_bullet("ghost", bullet(), Instant::now()),
            Err(RoomError::UnknownEntity)
        );
        assert_eq!(room.bullet_count(), 0);
    }

    #[test]
    fn chat_log_is_a_fifo_ring_of_fifty() {
        let mut room = seeded_room();
        room.join("c1".into(), "Alice".into(), member(1));

        for i in 0..60 {
            assert_eq!(room.chat("c1", &format!("msg {i}"), 1_000), ChatOutcome::Appended);
        }

        let log = room.chat_log();
        assert_eq!(log.len(), 50);
        assert_eq!(log.first().unwrap().text, "msg 10");
        assert_eq!(log.last().unwrap().text, "msg 59");
    }

    #[test]
    fn chat_display_name_carries_privilege_suffix() {
        let mut room = seeded_room();
        let mut admin = member(1);
        admin.privilege = Privilege::Admin;
        let mut moderator = member(2);
        moderator.privilege = Privilege::Moderator;
        room.join("c1".into(), "Alice".into(), admin);
        room.join("c2".into(), "Bob".into(), moderator);
        room.join("c3".into(), "Cy".into(), member(3));

        room.chat("c1", "hi", 1);
        room.chat("c2", "hey", 2);
        room.chat("c3", "yo", 3);

        let names: Vec<String> = room.chat_log().into_iter().map(|m| m.display_name).collect();
        assert_eq!(names, vec!["Alice [ADMIN]", "Bob [MOD]", "Cy"]);
    }

    #[test]
    fn muted_sender_leaves_chat_log_untouched() {
        let mut room = seeded_room();
        let mut muted = member(1);
        muted.muted_until = Some(2_000);
        room.join("c1".into(), "Alice".into(), muted);

        assert_eq!(room.chat("c1", "let me talk", 1_999_000), ChatOutcome::Muted);
        assert!(room.chat_log().is_empty());
        assert_eq!(room.chat("c1", "mute over", 2_000_000), ChatOutcome::Appended);
    }

    #[test]
    fn bot_pass_is_gated_by_update_interval() {
        let mut room = seeded_room();
        let t = Instant::now();

        assert!(room.update_bots(t));
        assert!(!room.update_bots(t + Duration::from_millis(50)));
        assert!(room.update_bots(t + Duration::from_millis(100)));
    }

    #[test]
    fn snapshot_lists_entities_scores_and_chat() {
        let mut room = seeded_room();
        room.join("c1".into(), "Alice".into(), member(1));
        room.chat("c1", "hello", 5);

        let snap = room.snapshot(Instant::now());

        assert_eq!(snap.entities.len(), 6);
        assert_eq!(snap.scores.len(), 6);
        assert_eq!(snap.chat.len(), 1);
        assert_eq!(snap.entities.iter().filter(|e| e.is_bot).count(), 5);
    }

    #[test]
    fn targets_resolve_by_id_then_case_insensitive_name() {
        let mut room = seeded_room();
        room.join("c1".into(), "Alice".into(), member(1));

        assert_eq!(room.resolve_target("c1"), Some("c1".to_string()));
        assert_eq!(room.resolve_target("aLiCe"), Some("c1".to_string()));
        assert_eq!(room.resolve_target("Ali"), None);
    }
}
