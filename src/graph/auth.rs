//! OAuth2 bearer tokens for Microsoft Graph.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::error::{GraphError, GraphResult};
use crate::config::GraphConfig;

/// Refresh this long before the token actually expires.
const DEFAULT_GRACE_PERIOD_MINUTES: i64 = 5;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Client credentials for the token endpoint.
#[derive(Debug)]
pub struct ClientCredentials {
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Application (client) id.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
}

/// Caches a client-credentials token and refreshes it shortly before expiry.
#[derive(Debug)]
pub struct TokenCache {
    credentials: ClientCredentials,
    token_url: String,
    scope: String,
    http_client: reqwest::Client,
    cached_token: RwLock<Option<CachedToken>>,
    grace_period: Duration,
}

impl TokenCache {
    /// Create a cache against `login_base_url` requesting `<graph_root>/.default`.
    pub fn new(
        credentials: ClientCredentials,
        login_base_url: &str,
        graph_root: &str,
        http_client: reqwest::Client,
    ) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            login_base_url.trim_end_matches('/'),
            urlencoding::encode(&credentials.tenant_id)
        );
        Self {
            credentials,
            token_url,
            scope: format!("{}/.default", graph_root.trim_end_matches('/')),
            http_client,
            cached_token: RwLock::new(None),
            grace_period: Duration::minutes(DEFAULT_GRACE_PERIOD_MINUTES),
        }
    }

    /// Return a valid token, fetching a new one when the cached token is
    /// missing or inside the grace period.
    #[instrument(skip(self), fields(tenant_id = %self.credentials.tenant_id))]
    pub async fn get_token(&self) -> GraphResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(token) = cache.as_ref() {
                if !token.is_expired(self.grace_period) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cache = self.cached_token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cache.as_ref() {
            if !token.is_expired(self.grace_period) {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Refreshing access token");
        let token = self.acquire_token().await?;
        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }

    async fn acquire_token(&self) -> GraphResult<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| GraphError::Auth(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Auth(format!(
                "Token request failed with status {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Auth(format!("Failed to parse token response: {}", e)))?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        debug!(expires_at = %expires_at.format("%Y-%m-%d %H:%M:%S UTC"), "Acquired new token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached_token.write().await = None;
    }
}

/// Where bearer tokens come from.
#[derive(Debug)]
pub enum TokenSource {
    /// A pre-acquired token used as is.
    Static(SecretString),
    /// Client-credentials flow with caching.
    ClientCredentials(TokenCache),
}

impl TokenSource {
    /// Pick a token source from the resolved configuration.
    ///
    /// A configured access token wins over client credentials.
    pub fn from_config(config: &GraphConfig, http_client: reqwest::Client) -> GraphResult<Self> {
        if let Some(token) = &config.access_token {
            return Ok(Self::Static(SecretString::from(token.expose_secret().to_string())));
        }

        match (&config.tenant_id, &config.client_id, &config.client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                let credentials = ClientCredentials {
                    tenant_id: tenant_id.clone(),
                    client_id: client_id.clone(),
                    client_secret: SecretString::from(client_secret.expose_secret().to_string()),
                };
                Ok(Self::ClientCredentials(TokenCache::new(
                    credentials,
                    &config.login_base_url(),
                    config.graph_root(),
                    http_client,
                )))
            },
            _ => Err(GraphError::Auth(
                "No access_token and incomplete client credentials".to_string(),
            )),
        }
    }

    /// Current bearer token.
    pub async fn token(&self) -> GraphResult<String> {
        match self {
            Self::Static(token) => Ok(token.expose_secret().to_string()),
            Self::ClientCredentials(cache) => cache.get_token().await,
        }
    }

    /// Forget any cached token. No-op for static tokens.
    pub async fn invalidate(&self) {
        if let Self::ClientCredentials(cache) = self {
            cache.invalidate().await;
        }
    }
}
