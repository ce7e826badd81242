use crate::domain::ports::{IdentityError, IdentityProvider};
use crate::domain::state::Identity;
use crate::interface_adapters::utils::ids::guest_account_id;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Prefix for self-issued guest tokens: `guest:<name>`.
pub const GUEST_TOKEN_PREFIX: &str = "guest:";
const MAX_GUEST_NAME_CHARS: usize = 24;

// In-memory identity provider for tests and local development.
#[derive(Clone, Default)]
pub struct InMemoryIdentityProvider {
    sessions: Arc<Mutex<HashMap<String, Identity>>>,
    allow_guest_tokens: bool,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also accept `guest:<name>` tokens, each resolving to a fresh guest identity.
    pub fn with_guest_tokens(mut self) -> Self {
        self.allow_guest_tokens = true;
        self
    }

    pub async fn insert(&self, token: impl Into<String>, identity: Identity) {
        self.sessions.lock().await.insert(token.into(), identity);
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.lock().await.remove(token).is_some()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn resolve_session(&self, token: &str) -> Result<Identity, IdentityError> {
        if let Some(identity) = self.sessions.lock().await.get(token) {
            return Ok(identity.clone());
        }

        let guest_name = token
            .strip_prefix(GUEST_TOKEN_PREFIX)
            .map(str::trim)
            .filter(|name| self.allow_guest_tokens && !name.is_empty());
        match guest_name {
            Some(name) => Ok(Identity {
                account_id: guest_account_id(),
                username: name.chars().take(MAX_GUEST_NAME_CHARS).collect(),
                is_guest: true,
                is_admin: false,
                is_moderator: false,
            }),
            None => Err(IdentityError::InvalidToken),
        }
    }
}
