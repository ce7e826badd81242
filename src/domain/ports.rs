use async_trait::async_trait;

use crate::domain::state::{AccountFlag, AccountFlags, Identity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    InvalidToken,
    SessionExpired,
    UpstreamUnavailable,
}

// Port for resolving a connection's session token to an account identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve_session(&self, token: &str) -> Result<Identity, IdentityError>;
}

// Port for persistent account flags and end-of-game statistics.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Creates the account record if missing; existing flags are left untouched.
    async fn ensure_account(&self, identity: &Identity) -> Result<(), String>;
    async fn account_flags(&self, account_id: u64) -> Result<AccountFlags, String>;
    async fn set_flag(&self, account_id: u64, flag: AccountFlag) -> Result<(), String>;
    /// Adds one played game plus the session's score and kills to the account totals.
    async fn record_game_end(&self, account_id: u64, score: u32, kills: u32) -> Result<(), String>;
}
