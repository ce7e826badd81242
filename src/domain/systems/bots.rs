use crate::domain::geometry::distance;
use crate::domain::state::{Entity, EntityId, EntityKind};
use crate::domain::tuning::arena::ArenaTuning;
use crate::domain::tuning::bot::BotTuning;
use rand::Rng;
use std::collections::HashMap;
use std::f32::consts::{PI, TAU};

/// One steering pass over every living bot.
///
/// Bots wander on a heading that changes every few seconds and turn around (π per neighbour)
/// when any other living entity is within the avoid radius (inclusive). Nothing stops bots from
/// overlapping; this is steering only.
pub fn tick_bots<R: Rng>(
    entities: &mut HashMap<EntityId, Entity>,
    rng: &mut R,
    cfg: &BotTuning,
    arena: &ArenaTuning,
) {
    let step = cfg.update_interval.as_secs_f32();

    let mut bot_ids: Vec<EntityId> = entities
        .values()
        .filter(|e| e.is_bot() && e.is_alive())
        .map(|e| e.id.clone())
        .collect();
    bot_ids.sort();

    for id in bot_ids {
        let Some(bot) = entities.get_mut(&id) else {
            continue;
        };
        let EntityKind::Bot(state) = &mut bot.kind else {
            continue;
        };

        state.move_timer += step;
        if state.move_timer >= cfg.direction_change_after {
            state.move_direction = rng.random_range(0.0..TAU);
            state.move_timer = 0.0;
        }

        let heading = state.move_direction;
        let (x, y) = arena.clamp(
            bot.x + cfg.speed * heading.cos(),
            bot.y + cfg.speed * heading.sin(),
        );
        bot.x = x;
        bot.y = y;
        bot.rotation = heading;

        // Every close living neighbour flips the heading once, so two cancel out.
        let close = entities
            .values()
            .filter(|other| other.id != id && other.is_alive())
            .filter(|other| distance(x, y, other.x, other.y) <= cfg.avoid_radius)
            .count();
        if close == 0 {
            continue;
        }
        if let Some(Entity {
            kind: EntityKind::Bot(state),
            ..
        }) = entities.get_mut(&id)
        {
            state.move_direction = (state.move_direction + PI * close as f32).rem_euclid(TAU);
        }
    }
}
