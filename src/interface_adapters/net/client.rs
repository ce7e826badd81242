use crate::domain::ports::{IdentityError, IdentityProvider, StatsRepository};
use crate::domain::state::{AccountFlags, EntityId, Identity, Privilege};
use crate::domain::tuning::weapon::DEFAULT_WEAPON;
use crate::domain::Notice;
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::protocol::{
    ChatUpdateDto, ClientMessage, GameStateDto, IdentityDto, ReasonDto, ServerMessage,
    parse_client_message,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::connection_id;
use crate::use_cases::game::{default_shot_damage, epoch_millis};
use crate::use_cases::lobby::{is_valid_room_name, RoomHandle};
use crate::use_cases::{GameEvent, RoomUpdate};

use axum::{
    Error, Json,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    UpdatesClosed,
    NoticesClosed,
    JoinRequired,
    JoinTimeout,
    AuthVerify,
    Banned,
    RoomUnavailable,
    ClosedBeforeJoin,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct RoomQuery {
    // The room the client wants to play in.
    #[serde(default)]
    room: Option<String>,
}

pub async fn room_update_serializer(
    mut update_rx: broadcast::Receiver<RoomUpdate>,
    update_bytes_tx: broadcast::Sender<Utf8Bytes>,
    latest_tx: watch::Sender<Utf8Bytes>,
) {
    // Serialize each room update once and broadcast the shared bytes.
    loop {
        match update_rx.recv().await {
            Ok(update) => {
                let is_snapshot = matches!(update, RoomUpdate::Snapshot(_));
                let msg = match update {
                    RoomUpdate::Snapshot(snapshot) => {
                        ServerMessage::GameState(GameStateDto::from(snapshot))
                    }
                    RoomUpdate::Chat(log) => {
                        ServerMessage::ChatUpdate(ChatUpdateDto::from(log.as_slice()))
                    }
                };
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize room update");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                // Only full snapshots are useful for lag recovery.
                if is_snapshot {
                    let _ = latest_tx.send(bytes.clone());
                }
                let _ = update_bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "room serializer lagged; skipping to latest update");
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("room updates channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub fn spawn_room_serializer(room: &RoomHandle) {
    tokio::spawn(room_update_serializer(
        room.update_tx.subscribe(),
        room.update_bytes_tx.clone(),
        room.latest_tx.clone(),
    ));
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoomQuery>,
) -> impl IntoResponse {
    let room_id = query
        .room
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| state.default_room.to_string());

    if !is_valid_room_name(&room_id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "invalid room name".to_string(),
            }),
        )
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, room_id: String) {
    // Separate connection id for correlating logs before/after the player joins.
    let conn_id = connection_id();
    let player_id: EntityId = format!("conn_{conn_id}");
    let span = info_span!(
        "conn",
        conn_id,
        room = %room_id,
        account_id = tracing::field::Empty
    );

    async move {
        let mut ctx = match bootstrap_connection(&mut socket, &state, &room_id, player_id).await {
            Ok(ctx) => ctx,
            Err(NetError::ClosedBeforeJoin) => {
                info!("client disconnected before join handshake");
                return;
            }
            Err(e) => {
                // Policy violations already sent their own close frame.
                warn!(error = ?e, "failed to bootstrap connection");
                let _ = socket.close().await;
                return;
            }
        };

        tracing::Span::current().record("account_id", ctx.identity.account_id);
        info!(
            player_id = %ctx.player_id,
            username = %ctx.identity.username,
            guest = ctx.identity.is_guest,
            "client connected"
        );

        if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
            warn!(error = ?e, "client loop exited with error");
        }
    }
    .instrument(span)
    .await
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

struct ConnCtx {
    pub player_id: EntityId,
    pub identity: Identity,
    pub stats: Arc<dyn StatsRepository>,
    pub input_tx: mpsc::Sender<GameEvent>,
    pub update_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub latest_rx: watch::Receiver<Utf8Bytes>,
    pub notices_rx: mpsc::Receiver<Notice>,
    // Last weapon the client reported, used for shots that omit it.
    pub weapon: String,
    // Count lag recovery snapshots sent to this client.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,

    pub last_input_full_log: Instant,
    pub last_update_lag_log: Instant,
    pub last_invalid_input_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

#[derive(Debug)]
struct JoinHandshake {
    identity: Identity,
    bytes_in: u64,
    msgs_in: u64,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &AppState,
    room_id: &str,
    player_id: EntityId,
) -> Result<ConnCtx, NetError> {
    // Authenticate the very first client message before touching any room.
    let join = match timeout(
        JOIN_HANDSHAKE_TIMEOUT,
        read_join_handshake(socket, state.identity.as_ref()),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };
    let identity = join.identity;

    let flags = load_account(state.stats.as_ref(), &identity).await;
    if let Some(reason) = flags.banned_reason.clone() {
        let _ = send_message(socket, &ServerMessage::Banned(ReasonDto { reason })).await;
        let _ = send_close_with_reason(socket, close_code::POLICY, "banned").await;
        return Err(NetError::Banned);
    }

    let room = match state
        .room_registry
        .get_or_create(room_id, spawn_room_serializer)
        .await
    {
        Ok((room, _created)) => room,
        Err(err) => {
            warn!(?err, "room unavailable");
            let _ = send_close_with_reason(socket, close_code::POLICY, "room unavailable").await;
            return Err(NetError::RoomUnavailable);
        }
    };

    // Subscribe before joining so the join snapshot is not missed.
    let update_bytes_rx = room.update_bytes_tx.subscribe();
    let latest_rx = room.latest_tx.subscribe();
    let (notices_tx, notices_rx) = mpsc::channel::<Notice>(NOTICE_CHANNEL_CAPACITY);

    let identity_msg = ServerMessage::Identity(IdentityDto {
        player_id: player_id.clone(),
    });
    send_message(socket, &identity_msg).await?;

    // Join happens after identity so the client can recognise itself in the first snapshot.
    room.input_tx
        .send(GameEvent::Join {
            player_id: player_id.clone(),
            identity: identity.clone(),
            flags,
            notices: notices_tx,
        })
        .await
        .map_err(|_| NetError::InputClosed)?;

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        player_id,
        identity,
        stats: Arc::clone(&state.stats),
        input_tx: room.input_tx.clone(),
        update_bytes_rx,
        latest_rx,
        notices_rx,
        weapon: DEFAULT_WEAPON.to_string(),
        lag_recovery_count: 0,

        msgs_in: join.msgs_in,
        msgs_out: 0,
        bytes_in: join.bytes_in,
        bytes_out: 0,

        invalid_json: 0,

        last_input_full_log: now,
        last_update_lag_log: now,
        last_invalid_input_log: now,

        close_frame: None,
    })
}

/// Ensures the account exists and returns its flags.
///
/// Identity-provider roles are seeded into the record when it is first created; after that the
/// stored flags are authoritative so moderation changes stick.
async fn load_account(stats: &dyn StatsRepository, identity: &Identity) -> AccountFlags {
    if identity.is_guest {
        return AccountFlags::default();
    }
    if let Err(err) = stats.ensure_account(identity).await {
        warn!(error = %err, "failed to ensure account");
    }
    stored_flags(stats, identity).await
}

/// Reads stored flags without touching the account; identity roles stand in only when storage fails.
async fn stored_flags(stats: &dyn StatsRepository, identity: &Identity) -> AccountFlags {
    match stats.account_flags(identity.account_id).await {
        Ok(flags) => flags,
        Err(err) => {
            warn!(error = %err, "failed to load account flags; using identity roles");
            AccountFlags {
                is_admin: identity.is_admin,
                is_moderator: identity.is_moderator,
                ..AccountFlags::default()
            }
        }
    }
}

/// Privilege as currently stored, read fresh for every privileged request.
async fn current_privilege(stats: &dyn StatsRepository, identity: &Identity) -> Privilege {
    if identity.is_guest {
        return Privilege::Guest;
    }
    stored_flags(stats, identity).await.privilege(false)
}

enum LoopControl {
    Continue,
    Disconnect,
}

enum Step {
    Incoming(Option<Result<Message, Error>>),
    Update(Result<Utf8Bytes, broadcast::error::RecvError>),
    Notice(Option<Notice>),
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const MAX_SESSION_TOKEN_LEN: usize = 4096;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const NOTICE_CHANNEL_CAPACITY: usize = 64;

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

async fn read_join_handshake(
    socket: &mut WebSocket,
    identity_provider: &dyn IdentityProvider,
) -> Result<JoinHandshake, NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        let message = incoming.map_err(NetError::Ws)?;
        match message {
            Message::Text(text) => {
                let bytes_in = text.len() as u64;
                let payload = match parse_client_message(&text) {
                    Ok(ClientMessage::Join(payload)) => payload,
                    Ok(_) => {
                        let _ = send_close_with_reason(socket, close_code::POLICY, "join required")
                            .await;
                        return Err(NetError::JoinRequired);
                    }
                    Err(_) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid join payload",
                        )
                        .await;
                        return Err(NetError::JoinRequired);
                    }
                };

                let token = payload.token.trim();
                if token.is_empty() || token.len() > MAX_SESSION_TOKEN_LEN {
                    let _ =
                        send_close_with_reason(socket, close_code::POLICY, "invalid session token")
                            .await;
                    return Err(NetError::AuthVerify);
                }

                let identity = match identity_provider.resolve_session(token).await {
                    Ok(identity) => identity,
                    Err(IdentityError::InvalidToken) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid session token",
                        )
                        .await;
                        return Err(NetError::AuthVerify);
                    }
                    Err(IdentityError::SessionExpired) => {
                        let _ =
                            send_close_with_reason(socket, close_code::POLICY, "session expired")
                                .await;
                        return Err(NetError::AuthVerify);
                    }
                    Err(IdentityError::UpstreamUnavailable) => {
                        let _ =
                            send_close_with_reason(socket, close_code::ERROR, "auth unavailable")
                                .await;
                        return Err(NetError::AuthVerify);
                    }
                };

                return Ok(JoinHandshake {
                    identity,
                    bytes_in,
                    msgs_in: 1,
                });
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

fn all_finite(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        let step = tokio::select! {
            incoming = socket.recv() => Step::Incoming(incoming),
            update = ctx.update_bytes_rx.recv() => Step::Update(update),
            notice = ctx.notices_rx.recv() => Step::Notice(notice),
        };

        let control = match step {
            Step::Incoming(incoming) => match handle_incoming_ws(socket, incoming, ctx).await {
                Ok(control) => control,
                Err(e) => {
                    fatal = Some(e);
                    LoopControl::Disconnect
                }
            },
            Step::Update(Ok(bytes)) => forward_bytes(bytes, socket, ctx).await,
            Step::Update(Err(broadcast::error::RecvError::Lagged(n))) => {
                if should_log(&mut ctx.last_update_lag_log) {
                    warn!(missed = n, "room updates lagged; sending snapshot");
                }
                // Resync strategy: send the latest full snapshot.
                let latest = ctx.latest_rx.borrow().clone();
                if latest.is_empty() {
                    LoopControl::Continue
                } else {
                    ctx.lag_recovery_count += 1;
                    debug!(count = ctx.lag_recovery_count, "sent lag recovery snapshot");
                    forward_bytes(latest, socket, ctx).await
                }
            }
            Step::Update(Err(broadcast::error::RecvError::Closed)) => {
                fatal = Some(NetError::UpdatesClosed);
                LoopControl::Disconnect
            }
            Step::Notice(Some(notice)) => forward_notice(notice, socket, ctx).await,
            Step::Notice(None) => {
                fatal = Some(NetError::NoticesClosed);
                LoopControl::Disconnect
            }
        };

        if let LoopControl::Disconnect = control {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(ctx).await {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    socket: &mut WebSocket,
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match parse_client_message(&text) {
                    Ok(message) => route_message(socket, message, ctx).await,
                    Err(parse_err) => {
                        ctx.invalid_json += 1;
                        if should_log(&mut ctx.last_invalid_input_log) {
                            warn!(
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if ctx.invalid_json > MAX_INVALID_JSON {
                            ctx.close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }
                        Ok(reject(socket, ctx, format!("malformed event: {parse_err}")).await)
                    }
                }
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

/// Translates a parsed client message into a room event.
async fn route_message(
    socket: &mut WebSocket,
    message: ClientMessage,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    let player_id = ctx.player_id.clone();
    let event = match message {
        ClientMessage::Join(_) => {
            return Ok(reject(socket, ctx, "already joined".to_string()).await);
        }
        ClientMessage::PlayerUpdate(update) => {
            if !all_finite(&[update.x, update.y, update.rotation]) {
                return Ok(reject(socket, ctx, "non-finite position".to_string()).await);
            }
            if let Some(weapon) = update.weapon.as_deref() {
                ctx.weapon = weapon.to_string();
            }
            GameEvent::Move {
                player_id,
                pose: update.into(),
            }
        }
        ClientMessage::PlayerShoot(shot) => {
            if !all_finite(&[shot.x, shot.y, shot.angle]) {
                return Ok(reject(socket, ctx, "non-finite shot".to_string()).await);
            }
            GameEvent::Shoot {
                player_id,
                bullet: shot.into_spec(&ctx.weapon, default_shot_damage),
            }
        }
        ClientMessage::PlayerMelee(melee) => {
            if !all_finite(&[melee.x, melee.y, melee.rotation]) {
                return Ok(reject(socket, ctx, "non-finite melee".to_string()).await);
            }
            GameEvent::Melee {
                player_id,
                swing: melee.into(),
            }
        }
        ClientMessage::PlayerHit(hit) => GameEvent::Hit {
            player_id,
            target_id: hit.target_id,
            shooter_id: hit.shooter_id,
            damage: hit.damage,
        },
        ClientMessage::PlayerDied(_) => GameEvent::Died { player_id },
        ClientMessage::ChatMessage(chat) => {
            // Plain chat does not need a storage round-trip.
            let issuer = if chat.message.trim_start().starts_with('/') {
                current_privilege(ctx.stats.as_ref(), &ctx.identity).await
            } else {
                Privilege::Guest
            };
            GameEvent::Chat {
                player_id,
                text: chat.message,
                issuer,
            }
        }
        ClientMessage::AdminCommand(command) => GameEvent::Command {
            player_id,
            request: command.into(),
            issuer: current_privilege(ctx.stats.as_ref(), &ctx.identity).await,
        },
        ClientMessage::GetPlayerInfo(_) => GameEvent::PlayerInfo {
            player_id,
            issuer: current_privilege(ctx.stats.as_ref(), &ctx.identity).await,
        },
    };

    match ctx.input_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(TrySendError::Full(_)) => {
            if should_log(&mut ctx.last_input_full_log) {
                warn!("room input channel full; dropping event");
            }
            Ok(LoopControl::Continue)
        }
        Err(TrySendError::Closed(_)) => Err(NetError::InputClosed),
    }
}

async fn reject(socket: &mut WebSocket, ctx: &mut ConnCtx, reason: String) -> LoopControl {
    match send_message(socket, &ServerMessage::rejected(reason)).await {
        Ok(bytes) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes as u64;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to send rejection");
            LoopControl::Disconnect
        }
    }
}

async fn forward_bytes(bytes: Utf8Bytes, socket: &mut WebSocket, ctx: &mut ConnCtx) -> LoopControl {
    let bytes_len = bytes.len();
    match socket.send(Message::Text(bytes)).await.map_err(NetError::Ws) {
        Ok(()) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Disconnect will follow immediately.
            warn!(error = ?err, "failed to send room update");
            LoopControl::Disconnect
        }
    }
}

/// Sends a targeted notice; kick and ban close the connection after delivery.
async fn forward_notice(notice: Notice, socket: &mut WebSocket, ctx: &mut ConnCtx) -> LoopControl {
    let ends_session = notice.ends_session();
    let close_reason = match &notice {
        Notice::Banned { .. } => "banned",
        _ => "kicked",
    };
    let msg = ServerMessage::from_notice(notice, epoch_millis());
    match send_message(socket, &msg).await {
        Ok(bytes) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes as u64;
        }
        Err(err) => {
            warn!(error = ?err, "failed to send notice");
            return LoopControl::Disconnect;
        }
    }

    if ends_session {
        info!(reason = close_reason, "closing connection on moderation action");
        ctx.close_frame = Some(CloseFrame {
            code: close_code::POLICY,
            reason: close_reason.into(),
        });
        return LoopControl::Disconnect;
    }
    LoopControl::Continue
}

async fn disconnect_cleanup(ctx: &ConnCtx) -> Result<(), NetError> {
    // Leave is idempotent in the room, so a kicked player's cleanup is safe too.
    ctx.input_tx
        .send(GameEvent::Leave {
            player_id: ctx.player_id.clone(),
        })
        .await
        .map_err(|_| NetError::InputClosed)?;

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_json = ctx.invalid_json,
        lag_recovery_count = ctx.lag_recovery_count,
        "connection stats"
    );
    info!(player_id = %ctx.player_id, "client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::domain::state::AccountFlag;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedFlags {
        flags: Mutex<AccountFlags>,
        fail: bool,
        ensures: AtomicUsize,
    }

    impl FixedFlags {
        fn new(flags: AccountFlags, fail: bool) -> Self {
            Self {
                flags: Mutex::new(flags),
                fail,
                ensures: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StatsRepository for FixedFlags {
        async fn ensure_account(&self, _identity: &Identity) -> Result<(), String> {
            self.ensures.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn account_flags(&self, _account_id: u64) -> Result<AccountFlags, String> {
            if self.fail {
                return Err("db down".into());
            }
            Ok(self.flags.lock().unwrap().clone())
        }

        async fn set_flag(&self, _account_id: u64, flag: AccountFlag) -> Result<(), String> {
            if let AccountFlag::Moderator(on) = flag {
                self.flags.lock().unwrap().is_moderator = on;
            }
            Ok(())
        }

        async fn record_game_end(&self, _account_id: u64, _score: u32, _kills: u32) -> Result<(), String> {
            Ok(())
        }
    }

    fn identity(is_guest: bool, is_admin: bool) -> Identity {
        Identity {
            account_id: 5,
            username: "alice".into(),
            is_guest,
            is_admin,
            is_moderator: false,
        }
    }

    #[tokio::test]
    async fn when_flags_grant_moderator_then_privilege_follows_storage() {
        let stats = FixedFlags::new(
            AccountFlags {
                is_moderator: true,
                ..AccountFlags::default()
            },
            false,
        );
        assert_eq!(
            current_privilege(&stats, &identity(false, false)).await,
            Privilege::Moderator
        );

        stats.flags.lock().unwrap().is_moderator = false;
        assert_eq!(
            current_privilege(&stats, &identity(false, false)).await,
            Privilege::Member
        );
    }

    #[tokio::test]
    async fn when_provider_moderator_is_demoted_then_stored_flag_wins() {
        let stats = FixedFlags::new(
            AccountFlags {
                is_moderator: true,
                ..AccountFlags::default()
            },
            false,
        );
        let moderator = Identity {
            is_moderator: true,
            ..identity(false, false)
        };

        stats.set_flag(5, AccountFlag::Moderator(false)).await.unwrap();

        assert_eq!(current_privilege(&stats, &moderator).await, Privilege::Member);
    }

    #[tokio::test]
    async fn when_privilege_is_checked_then_account_is_not_touched() {
        let stats = FixedFlags::new(AccountFlags::default(), false);

        current_privilege(&stats, &identity(false, false)).await;
        assert_eq!(stats.ensures.load(Ordering::Relaxed), 0);

        load_account(&stats, &identity(false, false)).await;
        assert_eq!(stats.ensures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn when_storage_fails_then_identity_roles_still_apply() {
        let stats = FixedFlags::new(AccountFlags::default(), true);
        assert_eq!(
            current_privilege(&stats, &identity(false, true)).await,
            Privilege::Admin
        );
    }

    #[tokio::test]
    async fn when_guest_then_storage_is_ignored() {
        let stats = FixedFlags::new(
            AccountFlags {
                is_admin: true,
                ..AccountFlags::default()
            },
            false,
        );
        assert_eq!(
            current_privilege(&stats, &identity(true, true)).await,
            Privilege::Guest
        );
        assert_eq!(load_account(&stats, &identity(true, true)).await, AccountFlags::default());
    }

    #[test]
    fn non_finite_values_are_detected() {
        assert!(all_finite(&[1.0, 2.0]));
        assert!(!all_finite(&[1.0, f32::INFINITY]));
        assert!(!all_finite(&[f32::NAN]));
    }
}
