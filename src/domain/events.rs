// Targeted notices produced by room mutations, delivered to a single connection.

use super::state::{EntityId, PlayerInfo};

#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub success: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            error: None,
            message: Some(message.into()),
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            message: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Notice {
    Hit { damage: i32 },
    Kill { victim: String },
    Died { killer: Option<String> },
    Respawn { x: f32, y: f32 },
    GodMode { enabled: bool },
    ModeratorStatus { is_moderator: bool },
    Kicked { reason: String },
    Muted { minutes: u32 },
    Banned { reason: String },
    CommandResult(CommandResult),
    PlayerInfo(Vec<PlayerInfo>),
    /// System text shown only to the recipient (join help).
    System { text: String },
}

impl Notice {
    /// Notices after which the recipient's connection is closed.
    pub fn ends_session(&self) -> bool {
        matches!(self, Notice::Kicked { .. } | Notice::Banned { .. })
    }
}

/// Notices collected during one mutation, in emission order.
#[derive(Debug, Default)]
pub struct Outbox {
    notices: Vec<(EntityId, Notice)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, to: impl Into<EntityId>, notice: Notice) {
        self.notices.push((to.into(), notice));
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(EntityId, Notice)> {
        self.notices.iter()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (EntityId, Notice)> + '_ {
        self.notices.drain(..)
    }

    /// Notices addressed to `id`, for assertions and logging.
    pub fn for_target<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Notice> + 'a {
        self.notices
            .iter()
            .filter(move |(to, _)| to == id)
            .map(|(_, n)| n)
    }
}
