// Use-case level inputs/outputs for the room loop.

use crate::domain::state::{AccountFlags, BulletSpec, ChatMessage, EntityId, Identity, Pose};
use crate::domain::systems::combat::MeleeSwing;
use crate::domain::{Notice, Privilege, RoomSnapshot};
use tokio::sync::mpsc;

/// Parsed moderation command: `/<name> [<target>] [<extra>...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub name: String,
    pub target: Option<String>,
    pub extra: Vec<String>,
}

#[derive(Debug)]
pub enum GameEvent {
    Join {
        player_id: EntityId,
        identity: Identity,
        flags: AccountFlags,
        // Direct channel for notices addressed to this player only.
        notices: mpsc::Sender<Notice>,
    },
    Leave {
        player_id: EntityId,
    },
    Move {
        player_id: EntityId,
        pose: Pose,
    },
    Shoot {
        player_id: EntityId,
        bullet: BulletSpec,
    },
    Melee {
        player_id: EntityId,
        swing: MeleeSwing,
    },
    Hit {
        player_id: EntityId,
        target_id: EntityId,
        shooter_id: EntityId,
        damage: Option<i32>,
    },
    Died {
        player_id: EntityId,
    },
    // `issuer` is read from the account record when the text is a command.
    Chat {
        player_id: EntityId,
        text: String,
        issuer: Privilege,
    },
    Command {
        player_id: EntityId,
        request: CommandRequest,
        issuer: Privilege,
    },
    PlayerInfo {
        player_id: EntityId,
        issuer: Privilege,
    },
}

/// Room-wide updates fanned out to every subscriber.
#[derive(Debug, Clone)]
pub enum RoomUpdate {
    Snapshot(RoomSnapshot),
    Chat(Vec<ChatMessage>),
}
