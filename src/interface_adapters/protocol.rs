// Wire protocol DTOs and conversions for public game server messages.

use crate::domain::state::{
    BulletSnapshot, BulletSpec, ChatMessage, EntitySnapshot, PlayerInfo, Pose,
};
use crate::domain::systems::combat::MeleeSwing;
use crate::domain::{CommandResult, Notice, RoomSnapshot};
use crate::use_cases::CommandRequest;
use crate::use_cases::moderation::Command;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Display name used for server-authored chat lines.
pub const SYSTEM_SENDER: &str = "System";

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    // Assigned entity id for the connection after join is accepted.
    Identity(IdentityDto),
    GameState(GameStateDto),
    ChatUpdate(ChatUpdateDto),
    PlayerHit(DamageDto),
    PlayerKill(KillDto),
    PlayerRespawn(RespawnDto),
    PlayerDied(DiedDto),
    GodModeUpdate(GodModeDto),
    ModeratorStatus(ModeratorStatusDto),
    Kicked(ReasonDto),
    Muted(MutedDto),
    Banned(ReasonDto),
    AdminCommandResult(CommandResultDto),
    PlayerInfo(PlayerInfoListDto),
    EventRejected(ReasonDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    // Initial handshake; must be the first message.
    Join(JoinPayload),
    PlayerUpdate(PlayerUpdateDto),
    PlayerShoot(PlayerShootDto),
    PlayerMelee(PlayerMeleeDto),
    PlayerHit(PlayerHitDto),
    PlayerDied(EmptyPayload),
    ChatMessage(ChatMessageDto),
    AdminCommand(AdminCommandDto),
    GetPlayerInfo(EmptyPayload),
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    pub token: String,
}

/// Payload for events that carry no fields (`"data": {}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmptyPayload {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdateDto {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub health: Option<i32>,
    #[serde(default)]
    pub weapon: Option<String>,
}

impl From<PlayerUpdateDto> for Pose {
    fn from(dto: PlayerUpdateDto) -> Self {
        Self {
            x: dto.x,
            y: dto.y,
            rotation: dto.rotation,
            health: dto.health,
            weapon: dto.weapon,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerShootDto {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    #[serde(default)]
    pub damage: Option<i32>,
    #[serde(default)]
    pub weapon: Option<String>,
}

impl PlayerShootDto {
    /// Fills in the weapon and its damage when the client omitted them.
    pub fn into_spec(self, equipped: &str, default_damage: impl Fn(&str) -> i32) -> BulletSpec {
        let weapon = self.weapon.unwrap_or_else(|| equipped.to_string());
        let damage = self.damage.unwrap_or_else(|| default_damage(&weapon));
        BulletSpec {
            x: self.x,
            y: self.y,
            angle: self.angle,
            damage,
            weapon,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMeleeDto {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub range: Option<f32>,
    #[serde(default)]
    pub damage: Option<i32>,
}

impl From<PlayerMeleeDto> for MeleeSwing {
    fn from(dto: PlayerMeleeDto) -> Self {
        Self {
            x: dto.x,
            y: dto.y,
            rotation: dto.rotation,
            range: dto.range,
            damage: dto.damage,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerHitDto {
    pub target_id: String,
    pub shooter_id: String,
    #[serde(default)]
    pub damage: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageDto {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCommandDto {
    pub command: String,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub duration: Option<serde_json::Value>,
}

impl From<AdminCommandDto> for CommandRequest {
    fn from(dto: AdminCommandDto) -> Self {
        let name = dto
            .command
            .trim()
            .trim_start_matches('/')
            .to_ascii_lowercase();
        // Durations may arrive as numbers or strings; both end up as text for parsing.
        let duration = match dto.duration {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        // Only the argument the command actually reads is forwarded.
        let extra = match Command::parse(&name) {
            Some(Command::Mute) => duration.into_iter().collect(),
            Some(Command::Kick | Command::Ban) => dto.reason.into_iter().collect(),
            _ => Vec::new(),
        };
        Self {
            name,
            target: dto.target_id,
            extra,
        }
    }
}

/// Parses one client frame. Events without a payload may omit `data` altogether.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, serde_json::Error> {
    let mut frame: serde_json::Value = serde_json::from_str(text)?;
    if let Some(fields) = frame.as_object_mut() {
        fields
            .entry("data")
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_value(frame)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDto {
    pub player_id: String,
}

/// Full room snapshot keyed by entity id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateDto {
    pub players: BTreeMap<String, PlayerStateDto>,
    pub bullets: Vec<BulletStateDto>,
    pub scores: BTreeMap<String, u32>,
    pub chat_messages: Vec<ChatMessageOutDto>,
}

impl From<RoomSnapshot> for GameStateDto {
    fn from(snapshot: RoomSnapshot) -> Self {
        Self {
            players: snapshot
                .entities
                .iter()
                .map(|e| (e.id.clone(), PlayerStateDto::from(e)))
                .collect(),
            bullets: snapshot.bullets.iter().map(BulletStateDto::from).collect(),
            scores: snapshot.scores.into_iter().collect(),
            chat_messages: snapshot.chat.iter().map(ChatMessageOutDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateDto {
    pub id: String,
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

impl From<&EntitySnapshot> for PlayerStateDto {
    fn from(e: &EntitySnapshot) -> Self {
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
            is_bot: e.is_bot,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletStateDto {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub damage: i32,
    pub weapon: String,
    pub shooter_id: String,
}

impl From<&BulletSnapshot> for BulletStateDto {
    fn from(b: &BulletSnapshot) -> Self {
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

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageOutDto {
    pub display_name: String,
    pub text: String,
    pub timestamp: u64,
}

impl From<&ChatMessage> for ChatMessageOutDto {
    fn from(m: &ChatMessage) -> Self {
        Self {
            display_name: m.display_name.clone(),
            text: m.text.clone(),
            timestamp: m.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatUpdateDto {
    pub messages: Vec<ChatMessageOutDto>,
}

impl From<&[ChatMessage]> for ChatUpdateDto {
    fn from(log: &[ChatMessage]) -> Self {
        Self {
            messages: log.iter().map(ChatMessageOutDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DamageDto {
    pub damage: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct KillDto {
    pub victim: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RespawnDto {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiedDto {
    pub killer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GodModeDto {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeratorStatusDto {
    pub is_moderator: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasonDto {
    pub reason: String,
}

/// Mute length in minutes.
#[derive(Debug, Clone, Serialize)]
pub struct MutedDto {
    pub duration: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResultDto {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<CommandResult> for CommandResultDto {
    fn from(r: CommandResult) -> Self {
        Self {
            success: r.success,
            error: r.error,
            message: r.message,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerInfoListDto {
    pub players: Vec<PlayerInfoDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfoDto {
    pub id: String,
    pub username: String,
    pub account_id: Option<u64>,
    pub is_bot: bool,
    pub is_guest: bool,
    pub privilege: Option<&'static str>,
    pub god_mode: bool,
    pub muted_until: Option<u64>,
    pub health: i32,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
}

impl From<PlayerInfo> for PlayerInfoDto {
    fn from(p: PlayerInfo) -> Self {
        Self {
            id: p.id,
            username: p.username,
            account_id: p.account_id,
            is_bot: p.is_bot,
            is_guest: p.is_guest,
            privilege: p.privilege.map(|pr| pr.as_str()),
            god_mode: p.god_mode,
            muted_until: p.muted_until,
            health: p.health,
            score: p.score,
            kills: p.kills,
            deaths: p.deaths,
        }
    }
}

impl ServerMessage {
    pub fn rejected(reason: impl Into<String>) -> Self {
        ServerMessage::EventRejected(ReasonDto {
            reason: reason.into(),
        })
    }

    /// Maps a targeted notice to its wire message; `now_millis` stamps system chat lines.
    pub fn from_notice(notice: Notice, now_millis: u64) -> Self {
        match notice {
            Notice::Hit { damage } => ServerMessage::PlayerHit(DamageDto { damage }),
            Notice::Kill { victim } => ServerMessage::PlayerKill(KillDto { victim }),
            Notice::Died { killer } => ServerMessage::PlayerDied(DiedDto { killer }),
            Notice::Respawn { x, y } => ServerMessage::PlayerRespawn(RespawnDto { x, y }),
            Notice::GodMode { enabled } => ServerMessage::GodModeUpdate(GodModeDto { enabled }),
            Notice::ModeratorStatus { is_moderator } => {
                ServerMessage::ModeratorStatus(ModeratorStatusDto { is_moderator })
            }
            Notice::Kicked { reason } => ServerMessage::Kicked(ReasonDto { reason }),
            Notice::Muted { minutes } => ServerMessage::Muted(MutedDto { duration: minutes }),
            Notice::Banned { reason } => ServerMessage::Banned(ReasonDto { reason }),
            Notice::CommandResult(result) => ServerMessage::AdminCommandResult(result.into()),
            Notice::PlayerInfo(players) => ServerMessage::PlayerInfo(PlayerInfoListDto {
                players: players.into_iter().map(PlayerInfoDto::from).collect(),
            }),
            Notice::System { text } => ServerMessage::ChatUpdate(ChatUpdateDto {
                messages: vec![ChatMessageOutDto {
                    display_name: SYSTEM_SENDER.to_string(),
                    text,
                    timestamp: now_millis,
                }],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn when_join_frame_is_parsed_then_token_is_extracted() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join","data":{"token":"abc"}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Join(JoinPayload { token }) if token == "abc"));
    }

    #[test]
    fn when_hit_frame_uses_camel_case_then_ids_are_read() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "player_hit",
            "data": { "targetId": "bot_1", "shooterId": "c7", "damage": 100 }
        }))
        .unwrap();
        match msg {
            ClientMessage::PlayerHit(hit) => {
                assert_eq!(hit.target_id, "bot_1");
                assert_eq!(hit.shooter_id, "c7");
                assert_eq!(hit.damage, Some(100));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn when_payload_is_empty_then_unit_events_still_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"get_player_info","data":{}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::GetPlayerInfo(_)));
    }

    #[test]
    fn when_data_is_omitted_then_unit_events_still_parse() {
        let died = parse_client_message(r#"{"type":"player_died"}"#).unwrap();
        assert!(matches!(died, ClientMessage::PlayerDied(_)));
        let info = parse_client_message(r#"{"type":"get_player_info"}"#).unwrap();
        assert!(matches!(info, ClientMessage::GetPlayerInfo(_)));
        let with_data = parse_client_message(r#"{"type":"player_died","data":{}}"#).unwrap();
        assert!(matches!(with_data, ClientMessage::PlayerDied(_)));
    }

    #[test]
    fn when_data_is_omitted_from_a_payload_event_then_parse_fails() {
        assert!(parse_client_message(r#"{"type":"chat_message"}"#).is_err());
        assert!(parse_client_message("not json").is_err());
    }

    #[test]
    fn when_update_lacks_coordinates_then_parse_fails() {
        let res = serde_json::from_str::<ClientMessage>(
            r#"{"type":"player_update","data":{"rotation":1.0}}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn shot_without_damage_takes_weapon_damage() {
        let dto = PlayerShootDto {
            x: 1.0,
            y: 2.0,
            angle: 0.5,
            damage: None,
            weapon: Some("smg".into()),
        };
        let spec = dto.into_spec("pistol", |w| if w == "smg" { 10 } else { 15 });
        assert_eq!(spec.damage, 10);
        assert_eq!(spec.weapon, "smg");
    }

    #[test]
    fn mute_command_forwards_its_duration() {
        let dto: AdminCommandDto = serde_json::from_value(json!({
            "command": "/MUTE",
            "targetId": "c2",
            "duration": 10
        }))
        .unwrap();
        let req = CommandRequest::from(dto);
        assert_eq!(req.name, "mute");
        assert_eq!(req.target.as_deref(), Some("c2"));
        assert_eq!(req.extra, vec!["10".to_string()]);
    }

    #[test]
    fn when_mute_carries_only_a_reason_then_no_duration_is_forwarded() {
        let dto: AdminCommandDto = serde_json::from_value(json!({
            "command": "mute",
            "targetId": "c2",
            "reason": "spam"
        }))
        .unwrap();
        assert!(CommandRequest::from(dto).extra.is_empty());
    }

    #[test]
    fn when_kick_carries_a_duration_then_only_the_reason_is_forwarded() {
        let dto: AdminCommandDto = serde_json::from_value(json!({
            "command": "kick",
            "targetId": "c2",
            "reason": "camping",
            "duration": 10
        }))
        .unwrap();
        assert_eq!(CommandRequest::from(dto).extra, vec!["camping".to_string()]);
    }

    #[test]
    fn game_state_serializes_with_camel_case_and_keyed_players() {
        let snapshot = RoomSnapshot {
            entities: vec![EntitySnapshot {
                id: "bot_0".into(),
                username: "Dusty Pete".into(),
                x: 1.0,
                y: 2.0,
                rotation: 0.0,
                health: 100,
                weapon: "pistol".into(),
                score: 0,
                kills: 0,
                deaths: 0,
                is_bot: true,
            }],
            bullets: Vec::new(),
            scores: vec![("bot_0".into(), 0)],
            chat: Vec::new(),
        };
        let value =
            serde_json::to_value(ServerMessage::GameState(GameStateDto::from(snapshot))).unwrap();

        assert_eq!(value["type"], "game_state");
        assert_eq!(value["data"]["players"]["bot_0"]["isBot"], true);
        assert_eq!(value["data"]["scores"]["bot_0"], 0);
        assert!(value["data"]["chatMessages"].as_array().unwrap().is_empty());
    }

    #[test]
    fn notices_map_to_snake_case_events() {
        let value = serde_json::to_value(ServerMessage::from_notice(
            Notice::ModeratorStatus { is_moderator: true },
            0,
        ))
        .unwrap();
        assert_eq!(value, json!({"type": "moderator_status", "data": {"isModerator": true}}));

        let value = serde_json::to_value(ServerMessage::from_notice(
            Notice::CommandResult(CommandResult::err("Player not found")),
            0,
        ))
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "admin_command_result", "data": {"success": false, "error": "Player not found"}})
        );
    }

    #[test]
    fn system_notice_becomes_a_single_chat_line() {
        let value = serde_json::to_value(ServerMessage::from_notice(
            Notice::System {
                text: "hi".into(),
            },
            42,
        ))
        .unwrap();
        assert_eq!(value["type"], "chat_update");
        assert_eq!(value["data"]["messages"][0]["displayName"], SYSTEM_SENDER);
        assert_eq!(value["data"]["messages"][0]["timestamp"], 42);
    }
}
