//! services/api/src/adapters/token_cache.rs
//!
//! This module contains the OAuth2 client-credentials token cache for the
//! forum API. It implements the `TokenProvider` port from the `core` crate.

use async_trait::async_trait;
use forum_answers_core::{
    domain::Credential,
    ports::{Clock, PortError, PortResult, TokenProvider},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

//=========================================================================================
// Wire Types
//=========================================================================================

/// Token endpoint response. Only `access_token` matters; everything is optional
/// so a malformed body surfaces as an auth error rather than a decode panic.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Client credentials used against the token endpoint.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Caches a single bearer credential and refreshes it when it expires.
///
/// The cache lock is held across the refresh, so concurrent callers that find
/// an expired credential wait for one upstream call instead of racing.
pub struct TokenCache {
    http: reqwest::Client,
    token_url: String,
    user_agent: String,
    credentials: ClientCredentials,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<Credential>>,
}

impl TokenCache {
    /// Creates a new `TokenCache`. `http` should carry the per-call timeout.
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        user_agent: impl Into<String>,
        credentials: ClientCredentials,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            user_agent: user_agent.into(),
            credentials,
            clock,
            cached: Mutex::new(None),
        }
    }

    async fn request_token(&self) -> PortResult<String> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| PortError::Auth(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Token endpoint returned {}", status);
            return Err(PortError::Auth(format!(
                "token endpoint returned {status}: {}",
                body.trim()
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| PortError::Auth(format!("unreadable token response: {e}")))?;

        match parsed.access_token.filter(|t| !t.is_empty()) {
            Some(token) => Ok(token),
            None => Err(PortError::Auth(format!(
                "token response did not contain an access token{}",
                parsed.error.map(|e| format!(" ({e})")).unwrap_or_default()
            ))),
        }
    }
}

//=========================================================================================
// `TokenProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl TokenProvider for TokenCache {
    async fn get_token(&self) -> PortResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(credential) = cached.as_ref() {
            if credential.is_valid_at(self.clock.now()) {
                debug!("Reusing cached forum token");
                return Ok(credential.token.clone());
            }
        }

        let token = self.request_token().await?;
        let credential = Credential::issued(token, self.clock.now());
        info!("Obtained forum token valid until {}", credential.expires_at);
        let token = credential.token.clone();
        *cached = Some(credential);
        Ok(token)
    }

    async fn invalidate(&self, token: &str) {
        let mut cached = self.cached.lock().await;
        // A concurrent caller may already have replaced the rejected token.
        if cached.as_ref().is_some_and(|c| c.token == token) {
            warn!("Discarding forum token rejected by the API");
            *cached = None;
        }
    }
}
