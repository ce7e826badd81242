use crate::domain::events::{Notice, Outbox};
use crate::domain::geometry::{angle_to, distance, in_arc};
use crate::domain::room::Room;
use crate::domain::state::EntityId;
use crate::domain::tuning::weapon::KNIFE;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    UnknownTarget,
    /// Target is in god mode; nothing changed.
    Shielded,
    Damaged,
    Killed,
}

/// Melee attack as reported by the attacker's client.
#[derive(Debug, Clone, Copy)]
pub struct MeleeSwing {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub range: Option<f32>,
    pub damage: Option<i32>,
}

/// Applies a client-reported ranged hit. Missing damage falls back to the default hit damage.
pub fn ranged_hit(
    room: &mut Room,
    target_id: &str,
    shooter_id: &str,
    damage: Option<i32>,
    outbox: &mut Outbox,
) -> HitOutcome {
    let damage = damage.unwrap_or(room.combat.default_hit_damage);
    apply_damage(room, target_id, Some(shooter_id), damage, outbox)
}

/// Resolves a frontal melee swing against every other entity in range.
/// Returns the ids that were hit.
pub fn melee_strike(
    room: &mut Room,
    attacker_id: &str,
    swing: MeleeSwing,
    outbox: &mut Outbox,
) -> Vec<EntityId> {
    if room.entity(attacker_id).is_none()
        || !(swing.x.is_finite() && swing.y.is_finite() && swing.rotation.is_finite())
    {
        return Vec::new();
    }

    let reach = KNIFE.melee_range.unwrap_or(room.combat.max_melee_range);
    let range = swing
        .range
        .filter(|r| r.is_finite())
        .unwrap_or(reach)
        .clamp(0.0, room.combat.max_melee_range);
    let damage = swing.damage.unwrap_or(KNIFE.damage);
    let half_arc = room.combat.melee_half_arc;

    let targets: Vec<EntityId> = room
        .sorted_ids()
        .into_iter()
        .filter(|id| id != attacker_id)
        .filter(|id| {
            room.entity(id).is_some_and(|target| {
                distance(swing.x, swing.y, target.x, target.y) <= range
                    && in_arc(
                        swing.rotation,
                        angle_to(swing.x, swing.y, target.x, target.y),
                        half_arc,
                    )
            })
        })
        .collect();

    for target_id in &targets {
        apply_damage(room, target_id, Some(attacker_id), damage, outbox);
    }
    targets
}

/// Forces a target to zero health and runs death handling without crediting anyone.
pub fn force_kill(room: &mut Room, target_id: &str, outbox: &mut Outbox) -> bool {
    let Some(target) = room.entity_mut(target_id) else {
        return false;
    };
    target.health = 0;
    resolve_death(room, target_id, None, outbox);
    true
}

/// Client self-report of death; honoured only when server-side health is already zero.
pub fn reported_death(room: &mut Room, id: &str, outbox: &mut Outbox) -> bool {
    if room.entity(id).is_none_or(|e| e.is_alive()) {
        return false;
    }
    resolve_death(room, id, None, outbox);
    true
}

fn apply_damage(
    room: &mut Room,
    target_id: &str,
    attacker_id: Option<&str>,
    damage: i32,
    outbox: &mut Outbox,
) -> HitOutcome {
    let damage = room.combat.clamp_damage(damage);
    let Some(target) = room.entity_mut(target_id) else {
        return HitOutcome::UnknownTarget;
    };
    if target.is_invulnerable() {
        return HitOutcome::Shielded;
    }

    target.health = (target.health - damage).max(0);
    let dead = target.health <= 0;
    if !target.is_bot() {
        outbox.push(target_id, Notice::Hit { damage });
    }

    if dead {
        resolve_death(room, target_id, attacker_id, outbox);
        HitOutcome::Killed
    } else {
        HitOutcome::Damaged
    }
}

/// Credits the killer (if still present and not the victim), then respawns the victim.
/// Bots respawn silently.
fn resolve_death(room: &mut Room, victim_id: &str, killer_id: Option<&str>, outbox: &mut Outbox) {
    let Some(victim) = room.entity(victim_id) else {
        return;
    };
    if victim.is_alive() {
        return;
    }
    let victim_name = victim.username.clone();
    let victim_is_human = !victim.is_bot();

    let mut killer_name = None;
    if let Some(killer_id) = killer_id.filter(|k| *k != victim_id) {
        killer_name = room.award_kill(killer_id);
        if killer_name.is_some() && room.entity(killer_id).is_some_and(|k| !k.is_bot()) {
            outbox.push(
                killer_id,
                Notice::Kill {
                    victim: victim_name.clone(),
                },
            );
        }
    }

    if victim_is_human {
        outbox.push(
            victim_id,
            Notice::Died {
                killer: killer_name.clone(),
            },
        );
    }

    let Some(spawn) = room.respawn(victim_id) else {
        return;
    };
    if victim_is_human {
        outbox.push(
            victim_id,
            Notice::Respawn {
                x: spawn.x,
                y: spawn.y,
            },
        );
    }

    info!(
        room = room.name(),
        victim = %victim_name,
        killer = killer_name.as_deref().unwrap_or("-"),
        "entity killed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::room::tests::{member, seeded_room};
    use crate::domain::tuning::arena::SPAWN_POINTS;
    use std::f32::consts::PI;

    fn place(room: &mut Room, id: &str, x: f32, y: f32) {
        let e = room.entity_mut(id).expect("entity present");
        e.x = x;
        e.y = y;
    }

    /// Room with one human at the origin and every bot parked far away.
    fn duel_room() -> Room {
        let mut room = seeded_room();
        room.join("c1".into(), "Alice".into(), member(1));
        room.join("c2".into(), "Bob".into(), member(2));
        place(&mut room, "c1", 0.0, 0.0);
        for n in 0..5 {
            place(&mut room, &format!("bot_{n}"), 900.0, 900.0);
        }
        room
    }

    fn swing(rotation: f32, range: f32) -> MeleeSwing {
        MeleeSwing {
            x: 0.0,
            y: 0.0,
            rotation,
            range: Some(range),
            damage: Some(35),
        }
    }

    #[test]
    fn ranged_hit_without_damage_uses_default() {
        let mut room = duel_room();
        let mut outbox = Outbox::new();

        let outcome = ranged_hit(&mut room, "c2", "c1", None, &mut outbox);

        assert_eq!(outcome, HitOutcome::Damaged);
        assert_eq!(room.entity("c2").unwrap().health, 85);
        assert!(matches!(
            outbox.for_target("c2").next(),
            Some(Notice::Hit { damage: 15 })
        ));
    }

    #[test]
    fn health_never_leaves_zero_to_hundred() {
        let mut room = duel_room();
        let mut outbox = Outbox::new();

        for damage in [40, -500, 70, 1_000, 3] {
            ranged_hit(&mut room, "c2", "c1", Some(damage), &mut outbox);
            let health = room.entity("c2").unwrap().health;
            assert!((0..=100).contains(&health), "health {health}");
        }
    }

    #[test]
    fn god_mode_target_ignores_hits() {
        let mut room = duel_room();
        room.entity_mut("c2").unwrap().human_mut().unwrap().god_mode = true;
        let mut outbox = Outbox::new();

        let outcome = ranged_hit(&mut room, "c2", "c1", Some(100), &mut outbox);

        assert_eq!(outcome, HitOutcome::Shielded);
        assert_eq!(room.entity("c2").unwrap().health, 100);
        assert!(outbox.is_empty());
    }

    #[test]
    fn unknown_target_is_a_no_op() {
        let mut room = duel_room();
        let mut outbox = Outbox::new();
        assert_eq!(
            ranged_hit(&mut room, "ghost", "c1", Some(10), &mut outbox),
            HitOutcome::UnknownTarget
        );
        assert!(outbox.is_empty());
    }

    #[test]
    fn lethal_hit_on_bot_respawns_it_and_credits_shooter() {
        let mut room = duel_room();
        let mut outbox = Outbox::new();

        let outcome = ranged_hit(&mut room, "bot_2", "c1", Some(100), &mut outbox);

        assert_eq!(outcome, HitOutcome::Killed);
        let bot = room.entity("bot_2").unwrap();
        assert_eq!(bot.health, 100);
        assert_eq!(bot.deaths, 1);
        assert!(SPAWN_POINTS.contains(&(bot.x, bot.y)));

        let shooter = room.entity("c1").unwrap();
        assert_eq!(shooter.score, 10);
        assert_eq!(shooter.kills, 1);
        assert_eq!(room.score_of("c1"), Some(10));

        // Bots respawn silently; only the killer hears about it.
        assert!(outbox.for_target("bot_2").next().is_none());
        assert!(matches!(
            outbox.for_target("c1").next(),
            Some(Notice::Kill { victim }) if victim == "Sheriff Bot"
        ));
    }

    #[test]
    fn lethal_hit_on_human_sends_hit_died_and_respawn() {
        let mut room = duel_room();
        let mut outbox = Outbox::new();

        ranged_hit(&mut room, "c2", "c1", Some(100), &mut outbox);

        let notices: Vec<&Notice> = outbox.for_target("c2").collect();
        assert!(matches!(notices[0], Notice::Hit { damage: 100 }));
        assert!(matches!(notices[1], Notice::Died { killer: Some(k) } if k == "Alice"));
        assert!(matches!(notices[2], Notice::Respawn { .. }));
        assert_eq!(room.entity("c2").unwrap().deaths, 1);
    }

    #[test]
    fn departed_shooter_gets_no_credit() {
        let mut room = duel_room();
        room.leave("c1");
        let mut outbox = Outbox::new();

        ranged_hit(&mut room, "c2", "c1", Some(100), &mut outbox);

        assert!(matches!(
            outbox.for_target("c2").nth(1),
            Some(Notice::Died { killer: None })
        ));
        assert_eq!(room.entity("c2").unwrap().health, 100);
    }

    #[test]
    fn melee_hits_target_in_front_within_range() {
        let mut room = duel_room();
        place(&mut room, "c2", 50.0, 0.0);
        let mut outbox = Outbox::new();

        let hits = melee_strike(&mut room, "c1", swing(0.0, 60.0), &mut outbox);

        assert_eq!(hits, vec!["c2".to_string()]);
        assert_eq!(room.entity("c2").unwrap().health, 65);
    }

    #[test]
    fn melee_rejects_target_off_to_the_side() {
        let mut room = duel_room();
        place(&mut room, "c2", 0.0, 50.0);
        let mut outbox = Outbox::new();

        let hits = melee_strike(&mut room, "c1", swing(0.0, 60.0), &mut outbox);

        assert!(hits.is_empty());
        assert_eq!(room.entity("c2").unwrap().health, 100);
    }

    #[test]
    fn melee_rejects_target_out_of_range() {
        let mut room = duel_room();
        place(&mut room, "c2", 61.0, 0.0);
        let mut outbox = Outbox::new();

        assert!(melee_strike(&mut room, "c1", swing(0.0, 60.0), &mut outbox).is_empty());
    }

    #[test]
    fn melee_arc_wraps_across_pi() {
        let mut room = duel_room();
        // Target sits just below the negative x axis: atan2 ≈ -π + 0.02.
        place(&mut room, "c2", -40.0, -0.8);
        let mut outbox = Outbox::new();

        let hits = melee_strike(&mut room, "c1", swing(PI - 0.05, 60.0), &mut outbox);

        assert_eq!(hits, vec!["c2".to_string()]);
    }

    #[test]
    fn melee_range_is_capped() {
        let mut room = duel_room();
        place(&mut room, "c2", 200.0, 0.0);
        let mut outbox = Outbox::new();

        assert!(melee_strike(&mut room, "c1", swing(0.0, 10_000.0), &mut outbox).is_empty());
    }

    #[test]
    fn force_kill_ignores_god_mode_and_credits_nobody() {
        let mut room = duel_room();
        room.entity_mut("c2").unwrap().human_mut().unwrap().god_mode = true;
        let mut outbox = Outbox::new();

        assert!(force_kill(&mut room, "c2", &mut outbox));

        let bob = room.entity("c2").unwrap();
        assert_eq!(bob.health, 100);
        assert_eq!(bob.deaths, 1);
        assert_eq!(room.entity("c1").unwrap().kills, 0);
    }

    #[test]
    fn reported_death_only_respawns_when_already_dead() {
        let mut room = duel_room();
        let mut outbox = Outbox::new();

        assert!(!reported_death(&mut room, "c2", &mut outbox));
        assert_eq!(room.entity("c2").unwrap().deaths, 0);

        room.entity_mut("c2").unwrap().health = 0;
        assert!(reported_death(&mut room, "c2", &mut outbox));
        assert_eq!(room.entity("c2").unwrap().health, 100);
        assert_eq!(room.entity("c2").unwrap().deaths, 1);
    }
}
