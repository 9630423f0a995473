//! GitHub App installation token manager.
//!
//! Every API call authenticates with one organization installation token. The token is
//! minted by signing a short-lived RS256 JWT with the app's private key and exchanging it
//! at `POST /app/installations/{id}/access_tokens`.
//!
//! - JWT `iat` is backdated 60s for clock drift, `exp` is 9 minutes out (GitHub caps
//!   app JWTs at 10 minutes)
//! - The installation token is treated as expired 5 minutes before GitHub says it is
//! - Concurrent callers on a cache miss share one exchange
//! - Exchange failures are returned to the caller, never retried here

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, GitHubError};

use super::clock::Clock;
use super::github_client::{USER_AGENT_VALUE, error_for_response};
use super::refresh_cache::RefreshCache;

/// Seconds the JWT `iat` is moved into the past.
pub const JWT_BACKDATE_SECS: i64 = 60;

/// Seconds from now until the JWT expires.
pub const JWT_LIFETIME_SECS: i64 = 9 * 60;

/// Installation tokens are refreshed this long before their real expiry.
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 5 * 60;

/// HTTP timeouts for the token exchange.
const EXCHANGE_CONNECT_TIMEOUT: StdDuration = StdDuration::from_secs(5);
const EXCHANGE_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(15);

/// Claims of the app JWT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppJwtClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// An installation access token as returned by GitHub.
#[derive(Clone)]
pub struct InstallationToken {
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Exchanges a signed app JWT for an installation token.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(
        &self,
        app_jwt: &str,
        installation_id: u64,
    ) -> Result<InstallationToken, GitHubError>;
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

/// [`TokenExchange`] against the GitHub Apps REST endpoint.
pub struct GitHubAppTokenExchange {
    api_url: String,
    http_client: reqwest::Client,
}

impl GitHubAppTokenExchange {
    pub fn new(api_url: &str) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(EXCHANGE_CONNECT_TIMEOUT)
            .timeout(EXCHANGE_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::Authentication(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl TokenExchange for GitHubAppTokenExchange {
    async fn exchange(
        &self,
        app_jwt: &str,
        installation_id: u64,
    ) -> Result<InstallationToken, GitHubError> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(app_jwt)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, USER_AGENT_VALUE)
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|e| GitHubError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_for_response(response, &url).await);
        }

        let body: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| GitHubError::Decode(format!("access token response: {}", e)))?;

        Ok(InstallationToken {
            token: SecretString::from(body.token),
            expires_at: body.expires_at,
        })
    }
}

/// Mints and caches the organization installation token.
pub struct TokenManager {
    app_id: String,
    installation_id: u64,
    signing_key: EncodingKey,
    exchange: Arc<dyn TokenExchange>,
    clock: Arc<dyn Clock>,
    cache: RefreshCache<SecretString>,
}

impl TokenManager {
    /// Build a manager from the app's PEM private key.
    pub fn new(
        app_id: impl Into<String>,
        installation_id: u64,
        private_key_pem: &SecretString,
        exchange: Arc<dyn TokenExchange>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        let signing_key = EncodingKey::from_rsa_pem(private_key_pem.expose_secret().as_bytes())
            .map_err(|e| AppError::Authentication(format!("Invalid GitHub App private key: {}", e)))?;

        let app_id = app_id.into();
        info!(
            "GitHub App token manager initialized (app_id={}, installation_id={})",
            app_id, installation_id
        );

        Ok(Self {
            app_id,
            installation_id,
            signing_key,
            exchange,
            cache: RefreshCache::new(clock.clone()),
            clock,
        })
    }

    /// Sign a fresh app JWT.
    pub fn sign_app_jwt(&self) -> AppResult<String> {
        let now = self.clock.now().timestamp();
        let claims = AppJwtClaims {
            iat: now - JWT_BACKDATE_SECS,
            exp: now + JWT_LIFETIME_SECS,
            iss: self.app_id.clone(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| AppError::Authentication(format!("Failed to sign app JWT: {}", e)))
    }

    /// Current installation token, minting a new one on miss or expiry.
    pub async fn get_token(&self) -> AppResult<SecretString> {
        self.cache
            .get_or_refresh(false, || async {
                debug!("Installation token missing or expired, exchanging app JWT");
                let jwt = self.sign_app_jwt()?;
                let token = self
                    .exchange
                    .exchange(&jwt, self.installation_id)
                    .await
                    .map_err(|e| {
                        warn!("Installation token exchange failed: {}", e);
                        AppError::Authentication(e.to_string())
                    })?;

                let refresh_after = token.expires_at - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS);
                info!(
                    "Obtained installation token (expires_at={}, refresh_after={})",
                    token.expires_at, refresh_after
                );
                Ok((token.token, refresh_after))
            })
            .await
    }

    /// Forget the cached token, e.g. after GitHub rejected it.
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }
}
