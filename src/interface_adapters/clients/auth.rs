use crate::domain::ports::{IdentityError, IdentityProvider};
use crate::domain::state::Identity;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Auth verification response consumed by the game server join path.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedIdentity {
    pub user_id: u64,
    pub display_name: String,
    pub session_id: String,
    pub expires_at: u64,
    #[serde(default)]
    pub is_guest: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_moderator: bool,
}

impl From<VerifiedIdentity> for Identity {
    fn from(v: VerifiedIdentity) -> Self {
        Self {
            account_id: v.user_id,
            username: v.display_name,
            is_guest: v.is_guest,
            is_admin: v.is_admin,
            is_moderator: v.is_moderator,
        }
    }
}

#[derive(Debug, Serialize)]
struct VerifyTokenRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

// Thin reqwest client for auth token verification.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let url = format!("{}/auth/verify-token", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .json(&VerifyTokenRequest { token })
            .send()
            .await
            .map_err(|_| IdentityError::UpstreamUnavailable)?;

        if response.status().is_success() {
            return response
                .json::<VerifiedIdentity>()
                .await
                .map_err(|_| IdentityError::UpstreamUnavailable);
        }

        if response.status() == StatusCode::UNAUTHORIZED {
            let error = response
                .json::<ErrorResponse>()
                .await
                .map_err(|_| IdentityError::UpstreamUnavailable)?;

            // TODO: switch to stable machine-readable error codes from auth.
            if error.message == "session expired" {
                return Err(IdentityError::SessionExpired);
            }
            return Err(IdentityError::InvalidToken);
        }

        Err(IdentityError::UpstreamUnavailable)
    }
}

#[async_trait]
impl IdentityProvider for AuthClient {
    async fn resolve_session(&self, token: &str) -> Result<Identity, IdentityError> {
        self.verify_token(token).await.map(Identity::from)
    }
}
