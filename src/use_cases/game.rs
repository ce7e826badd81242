use super::moderation;
use super::types::{CommandRequest, GameEvent, RoomUpdate};
use crate::domain::events::{CommandResult, Notice, Outbox};
use crate::domain::ports::StatsRepository;
use crate::domain::room::{ChatOutcome, Room, RoomPhase};
use crate::domain::state::{AccountFlag, EntityId, HumanState, Privilege};
use crate::domain::systems::combat;
use crate::domain::tuning::weapon;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Authoritative loop for one room.
///
/// Every inbound event is applied immediately and followed by a fresh snapshot broadcast.
/// While at least one human is present a bot pass also runs on `tick_interval`.
pub async fn room_task(
    room: Room,
    mut input_rx: mpsc::Receiver<GameEvent>,
    update_tx: broadcast::Sender<RoomUpdate>,
    phase_tx: watch::Sender<RoomPhase>,
    stats: Arc<dyn StatsRepository>,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
) {
    let mut actor = RoomActor {
        room,
        members: HashMap::new(),
        update_tx,
        phase_tx,
        stats,
    };
    actor.publish_phase();

    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let active = actor.room.phase() == RoomPhase::Active;
        tokio::select! {
            _ = shutdown.notified() => {
                info!(room = actor.room.name(), "room shutting down");
                break;
            }
            maybe_event = input_rx.recv() => {
                let Some(event) = maybe_event else {
                    break;
                };
                let was_active = active;
                actor.handle(event);
                if !was_active && actor.room.phase() == RoomPhase::Active {
                    // Start the bot clock fresh instead of firing stale ticks.
                    interval.reset();
                }
            }
            deadline = interval.tick(), if active => {
                if actor.room.update_bots(deadline.into_std()) {
                    actor.broadcast_snapshot();
                }
            }
        }
    }
}

struct RoomActor {
    room: Room,
    /// Per-connection notice channels, keyed by entity id.
    members: HashMap<EntityId, mpsc::Sender<Notice>>,
    update_tx: broadcast::Sender<RoomUpdate>,
    phase_tx: watch::Sender<RoomPhase>,
    stats: Arc<dyn StatsRepository>,
}

impl RoomActor {
    fn handle(&mut self, event: GameEvent) {
        let now = Instant::now();
        match event {
            GameEvent::Join {
                player_id,
                identity,
                flags,
                notices,
            } => {
                let human = HumanState::new(&identity, &flags);
                let privilege = human.privilege;
                let Some(spawn) = self.room.join(player_id.clone(), identity.username.clone(), human)
                else {
                    warn!(player_id, "duplicate join ignored");
                    return;
                };
                info!(
                    room = self.room.name(),
                    player_id,
                    username = %identity.username,
                    privilege = privilege.as_str(),
                    x = spawn.x,
                    y = spawn.y,
                    "player joined"
                );
                self.members.insert(player_id.clone(), notices);
                self.notify(
                    &player_id,
                    Notice::System {
                        text: moderation::help_text(privilege),
                    },
                );
                self.publish_phase();
                self.broadcast_snapshot();
            }
            GameEvent::Leave { player_id } => {
                self.members.remove(&player_id);
                let Some(entity) = self.room.leave(&player_id) else {
                    return;
                };
                info!(room = self.room.name(), player_id, "player left");
                if let Some(human) = entity.human().filter(|h| !h.is_guest) {
                    self.record_game_end(human.account_id, entity.score, entity.kills);
                }
                self.publish_phase();
                self.broadcast_snapshot();
            }
            GameEvent::Move { player_id, pose } => {
                match self.room.apply_movement(&player_id, &pose, now) {
                    Ok(()) => self.broadcast_snapshot(),
                    Err(err) => debug!(player_id, ?err, "movement rejected"),
                }
            }
            GameEvent::Shoot { player_id, bullet } => {
                match self.room.add_bullet(&player_id, bullet, now) {
                    Ok(()) => self.broadcast_snapshot(),
                    Err(err) => debug!(player_id, ?err, "shot rejected"),
                }
            }
            GameEvent::Melee { player_id, swing } => {
                let mut outbox = Outbox::new();
                let hit = combat::melee_strike(&mut self.room, &player_id, swing, &mut outbox);
                debug!(player_id, hits = hit.len(), "melee resolved");
                self.deliver(outbox);
                self.broadcast_snapshot();
            }
            GameEvent::Hit {
                player_id,
                target_id,
                shooter_id,
                damage,
            } => {
                let mut outbox = Outbox::new();
                let outcome =
                    combat::ranged_hit(&mut self.room, &target_id, &shooter_id, damage, &mut outbox);
                debug!(player_id, target_id, shooter_id, ?outcome, "hit resolved");
                self.deliver(outbox);
                self.broadcast_snapshot();
            }
            GameEvent::Died { player_id } => {
                let mut outbox = Outbox::new();
                if combat::reported_death(&mut self.room, &player_id, &mut outbox) {
                    self.deliver(outbox);
                    self.broadcast_snapshot();
                } else {
                    debug!(player_id, "death report ignored, player still alive");
                }
            }
            GameEvent::Chat {
                player_id,
                text,
                issuer,
            } => {
                // Slash text never reaches the chat log, even when it does not parse.
                if text.trim_start().starts_with('/') {
                    match moderation::parse_command(&text) {
                        Some(request) => self.run_command(&player_id, issuer, &request),
                        None => self.notify(
                            &player_id,
                            Notice::CommandResult(CommandResult::err("Unknown command")),
                        ),
                    }
                    return;
                }
                match self.room.chat(&player_id, &text, epoch_millis()) {
                    ChatOutcome::Appended => {
                        let _ = self.update_tx.send(RoomUpdate::Chat(self.room.chat_log()));
                        self.broadcast_snapshot();
                    }
                    ChatOutcome::Muted => debug!(player_id, "muted chat dropped"),
                    ChatOutcome::Blank | ChatOutcome::UnknownSender => {}
                }
            }
            GameEvent::Command {
                player_id,
                request,
                issuer,
            } => self.run_command(&player_id, issuer, &request),
            GameEvent::PlayerInfo { player_id, issuer } => {
                let notice = if issuer.is_admin() {
                    Notice::PlayerInfo(self.room.roster())
                } else {
                    Notice::CommandResult(CommandResult::err("Insufficient permissions"))
                };
                self.notify(&player_id, notice);
            }
        }
    }

    fn run_command(&mut self, issuer_id: &str, issuer: Privilege, request: &CommandRequest) {
        let mut outbox = Outbox::new();
        let dispatch = moderation::dispatch(
            &mut self.room,
            issuer_id,
            issuer,
            request,
            epoch_millis() / 1000,
            &mut outbox,
        );
        info!(
            room = self.room.name(),
            issuer_id,
            command = %request.name,
            target = request.target.as_deref().unwrap_or(""),
            success = dispatch.result.success,
            "command dispatched"
        );

        let success = dispatch.result.success;
        self.notify(issuer_id, Notice::CommandResult(dispatch.result));

        // Kick and ban close the target's socket, so they wait for the account write; a
        // banned player reconnecting right away must already be refused.
        let (closing, immediate): (Vec<_>, Vec<_>) =
            outbox.drain().partition(|(_, notice)| notice.ends_session());
        for (to, notice) in immediate {
            self.notify(&to, notice);
        }
        self.persist_then_notify(dispatch.flag_writes, closing);
        if success {
            self.broadcast_snapshot();
        }
    }

    fn deliver(&self, mut outbox: Outbox) {
        for (to, notice) in outbox.drain() {
            self.notify(&to, notice);
        }
    }

    /// Best-effort send to a single member; bots and departed players are skipped.
    fn notify(&self, to: &str, notice: Notice) {
        let Some(tx) = self.members.get(to) else {
            return;
        };
        match tx.try_send(notice) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(player_id = to, "notice queue full, dropping"),
            Err(TrySendError::Closed(_)) => debug!(player_id = to, "notice receiver gone"),
        }
    }

    fn broadcast_snapshot(&mut self) {
        let snapshot = self.room.snapshot(Instant::now());
        // No subscribers just means nobody is connected yet.
        let _ = self.update_tx.send(RoomUpdate::Snapshot(snapshot));
    }

    fn publish_phase(&self) {
        self.phase_tx.send_if_modified(|phase| {
            let next = self.room.phase();
            let changed = *phase != next;
            *phase = next;
            changed
        });
    }

    fn persist_then_notify(&self, writes: Vec<(u64, AccountFlag)>, notices: Vec<(EntityId, Notice)>) {
        if writes.is_empty() && notices.is_empty() {
            return;
        }
        let pending: Vec<(mpsc::Sender<Notice>, EntityId, Notice)> = notices
            .into_iter()
            .filter_map(|(to, notice)| self.members.get(&to).map(|tx| (tx.clone(), to, notice)))
            .collect();
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            for (account_id, flag) in writes {
                if let Err(err) = stats.set_flag(account_id, flag.clone()).await {
                    warn!(account_id, ?flag, error = %err, "failed to persist account flag");
                }
            }
            for (tx, to, notice) in pending {
                if tx.send(notice).await.is_err() {
                    debug!(player_id = %to, "notice receiver gone");
                }
            }
        });
    }

    fn record_game_end(&self, account_id: u64, score: u32, kills: u32) {
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            if let Err(err) = stats.record_game_end(account_id, score, kills).await {
                warn!(account_id, error = %err, "failed to record game end");
            }
        });
    }
}

/// Weapon damage applied when a shot carries no explicit damage.
pub fn default_shot_damage(weapon_name: &str) -> i32 {
    weapon::lookup(weapon_name)
        .unwrap_or(weapon::PISTOL)
        .damage
}

pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
