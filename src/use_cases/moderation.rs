// Chat command parsing and privileged moderation actions.

use super::types::CommandRequest;
use crate::domain::events::{CommandResult, Notice, Outbox};
use crate::domain::room::Room;
use crate::domain::state::{AccountFlag, Privilege};
use crate::domain::systems::combat;

const DEFAULT_MUTE_MINUTES: u32 = 5;
const DEFAULT_KICK_REASON: &str = "Kicked by a moderator";
const DEFAULT_BAN_REASON: &str = "Banned by an administrator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    God,
    Kill,
    Mod,
    Kick,
    Mute,
    Ban,
    Help,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::God,
        Command::Kill,
        Command::Mod,
        Command::Kick,
        Command::Mute,
        Command::Ban,
        Command::Help,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::God => "god",
            Command::Kill => "kill",
            Command::Mod => "mod",
            Command::Kick => "kick",
            Command::Mute => "mute",
            Command::Ban => "ban",
            Command::Help => "help",
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            Command::God => "/god <player> - toggle god mode",
            Command::Kill => "/kill <player> - kill a player",
            Command::Mod => "/mod <player> - toggle moderator",
            Command::Kick => "/kick <player> [reason] - disconnect a player",
            Command::Mute => "/mute <player> [minutes] - mute a player",
            Command::Ban => "/ban <player> [reason] - ban a player",
            Command::Help => "/help - list your commands",
        }
    }

    pub fn allowed(self, issuer: Privilege) -> bool {
        match self {
            Command::God | Command::Kill | Command::Mod | Command::Ban => issuer.is_admin(),
            Command::Kick | Command::Mute => issuer.can_moderate(),
            Command::Help => issuer != Privilege::Guest,
        }
    }
}

/// Splits `/<name> [<target>] [<extra>...]`; `None` when the text is not a command.
pub fn parse_command(text: &str) -> Option<CommandRequest> {
    let body = text.trim().strip_prefix('/')?;
    let mut parts = body.split_whitespace();
    let name = parts.next()?.to_ascii_lowercase();
    let target = parts.next().map(str::to_string);
    let extra = parts.map(str::to_string).collect();
    Some(CommandRequest {
        name,
        target,
        extra,
    })
}

pub fn available_commands(issuer: Privilege) -> Vec<Command> {
    Command::ALL
        .into_iter()
        .filter(|c| c.allowed(issuer))
        .collect()
}

/// One-time help text sent on join.
pub fn help_text(issuer: Privilege) -> String {
    let commands = available_commands(issuer);
    if commands.is_empty() {
        return "Welcome! Sign in to use chat commands.".to_string();
    }
    let lines: Vec<&str> = commands.iter().map(|c| c.usage()).collect();
    format!("Welcome! Available commands: {}", lines.join("; "))
}

/// Outcome of one dispatched command. Flag writes still need persisting.
#[derive(Debug)]
pub struct Dispatch {
    pub result: CommandResult,
    pub flag_writes: Vec<(u64, AccountFlag)>,
}

impl Dispatch {
    fn fail(error: &str) -> Self {
        Self {
            result: CommandResult::err(error),
            flag_writes: Vec::new(),
        }
    }

    fn ok(message: String) -> Self {
        Self {
            result: CommandResult::ok(message),
            flag_writes: Vec::new(),
        }
    }

    fn with_write(mut self, account_id: Option<u64>, flag: AccountFlag) -> Self {
        if let Some(account_id) = account_id {
            self.flag_writes.push((account_id, flag));
        }
        self
    }
}

/// Checks privilege, resolves the target and applies the command to the room.
/// Notices for affected players are pushed to `outbox`; the issuer's result is returned.
pub fn dispatch(
    room: &mut Room,
    issuer_id: &str,
    issuer: Privilege,
    request: &CommandRequest,
    now_epoch_secs: u64,
    outbox: &mut Outbox,
) -> Dispatch {
    if issuer == Privilege::Guest {
        return Dispatch::fail("Guests cannot use commands");
    }
    let Some(command) = Command::parse(&request.name) else {
        return Dispatch::fail("Unknown command");
    };
    if !command.allowed(issuer) {
        return Dispatch::fail("Insufficient permissions");
    }
    if command == Command::Help {
        return Dispatch::ok(help_text(issuer));
    }

    let Some(target_key) = request.target.as_deref() else {
        return Dispatch::fail("Missing target");
    };
    let Some(target_id) = room.resolve_target(target_key) else {
        return Dispatch::fail("Player not found");
    };

    let Some(target) = room.entity(&target_id) else {
        return Dispatch::fail("Player not found");
    };
    let target_name = target.username.clone();
    let target_human = target.human().cloned();

    if command == Command::Kill {
        combat::force_kill(room, &target_id, outbox);
        return Dispatch::ok(format!("Killed {target_name}"));
    }

    // Everything below acts on an account.
    let Some(human) = target_human else {
        return Dispatch::fail("Target is a bot");
    };
    if !issuer.is_admin() && human.privilege.can_moderate() && target_id != issuer_id {
        return Dispatch::fail("Insufficient permissions");
    }
    // Guests have no persistent account to write to.
    let account = (!human.is_guest).then_some(human.account_id);

    match command {
        Command::God => {
            let enabled = !human.god_mode;
            if let Some(h) = room.entity_mut(&target_id).and_then(|e| e.human_mut()) {
                h.god_mode = enabled;
            }
            outbox.push(target_id.as_str(), Notice::GodMode { enabled });
            let state = if enabled { "enabled" } else { "disabled" };
            Dispatch::ok(format!("God mode {state} for {target_name}"))
                .with_write(account, AccountFlag::GodMode(enabled))
        }
        Command::Mod => {
            let next = match human.privilege {
                Privilege::Member => Privilege::Moderator,
                Privilege::Moderator => Privilege::Member,
                Privilege::Guest => return Dispatch::fail("Guests cannot be moderators"),
                Privilege::Admin => return Dispatch::fail("Target is an admin"),
            };
            if let Some(h) = room.entity_mut(&target_id).and_then(|e| e.human_mut()) {
                h.privilege = next;
            }
            let is_moderator = next == Privilege::Moderator;
            outbox.push(target_id.as_str(), Notice::ModeratorStatus { is_moderator });
            let verb = if is_moderator { "is now" } else { "is no longer" };
            Dispatch::ok(format!("{target_name} {verb} a moderator"))
                .with_write(account, AccountFlag::Moderator(is_moderator))
        }
        Command::Kick => {
            let reason = reason_or(&request.extra, DEFAULT_KICK_REASON);
            outbox.push(target_id.as_str(), Notice::Kicked { reason });
            Dispatch::ok(format!("Kicked {target_name}"))
        }
        Command::Mute => {
            let minutes = match request.extra.first() {
                None => DEFAULT_MUTE_MINUTES,
                Some(raw) => match raw.parse::<u32>() {
                    Ok(m) if m > 0 => m,
                    _ => return Dispatch::fail("Invalid duration"),
                },
            };
            let until = now_epoch_secs + u64::from(minutes) * 60;
            if let Some(h) = room.entity_mut(&target_id).and_then(|e| e.human_mut()) {
                h.muted_until = Some(until);
            }
            outbox.push(target_id.as_str(), Notice::Muted { minutes });
            Dispatch::ok(format!("Muted {target_name} for {minutes} minutes"))
                .with_write(account, AccountFlag::MutedUntil(Some(until)))
        }
        Command::Ban => {
            let reason = reason_or(&request.extra, DEFAULT_BAN_REASON);
            outbox.push(
                target_id.as_str(),
                Notice::Banned {
                    reason: reason.clone(),
                },
            );
            Dispatch::ok(format!("Banned {target_name}"))
                .with_write(account, AccountFlag::Banned(Some(reason)))
        }
        Command::Kill | Command::Help => Dispatch::fail("Unknown command"),
    }
}

fn reason_or(extra: &[String], default: &str) -> String {
    if extra.is_empty() {
        default.to_string()
    } else {
        extra.join(" ")
    }
}
