//! Identity provider
//!
//! Resolves a web-session bearer token to the user it belongs to. The
//! production provider asks the hosted auth service's `/auth/v1/user`
//! endpoint.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::DesktopAuthError;
use crate::config::IdentityConfig;
use crate::models::AuthenticatedUser;

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Resolves web-session tokens to users
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the token is not (or no longer) recognised
    async fn resolve(&self, access_token: &str) -> Result<Option<AuthenticatedUser>>;
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Identity provider backed by the hosted auth service
#[derive(Clone)]
pub struct RemoteIdentityProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RemoteIdentityProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build identity HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &IdentityConfig) -> Result<Self> {
        Self::new(&config.url, &config.api_key)
    }

    /// Create a boxed provider for use with dependency injection
    pub fn boxed(self) -> Arc<dyn IdentityProvider> {
        Arc::new(self)
    }
}

#[async_trait]
impl IdentityProvider for RemoteIdentityProvider {
    async fn resolve(&self, access_token: &str) -> Result<Option<AuthenticatedUser>> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .send()
            .await
            .context("Failed to reach identity provider")?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("Identity provider rejected access token");
                Ok(None)
            }
            status if status.is_success() => {
                let user: UserResponse = response
                    .json()
                    .await
                    .context("Failed to parse identity provider response")?;
                Ok(Some(AuthenticatedUser::new(
                    user.id,
                    user.email.unwrap_or_default(),
                )))
            }
            status => anyhow::bail!("Identity provider returned HTTP {}", status),
        }
    }
}

/// Resolve the caller of a request from its (optional) bearer token
pub async fn authenticate(
    provider: &dyn IdentityProvider,
    bearer: Option<&str>,
) -> Result<AuthenticatedUser, DesktopAuthError> {
    let token = bearer
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(DesktopAuthError::Unauthenticated)?;

    provider
        .resolve(token)
        .await
        .map_err(DesktopAuthError::Internal)?
        .ok_or(DesktopAuthError::Unauthenticated)
}

/// Fixed token-to-user table
#[cfg(test)]
pub(crate) struct StaticIdentityProvider {
    users: std::collections::HashMap<String, AuthenticatedUser>,
}

#[cfg(test)]
impl StaticIdentityProvider {
    pub(crate) fn new() -> Self {
        Self {
            users: std::collections::HashMap::new(),
        }
    }

    pub(crate) fn with_user(mut self, access_token: &str, id: &str, email: &str) -> Self {
        self.users
            .insert(access_token.to_string(), AuthenticatedUser::new(id, email));
        self
    }
}

#[cfg(test)]
#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, access_token: &str) -> Result<Option<AuthenticatedUser>> {
        Ok(self.users.get(access_token).cloned())
    }
}
