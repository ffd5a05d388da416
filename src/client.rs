//! HTTP client for the desktop auth endpoints.
//!
//! Used by the `pair` command and by desktop clients embedding this crate.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::AuthenticatedUser;
use crate::services::{DesktopAuthError, IssuedToken, TokenIssuer, VerifiedToken};

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    app_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    user: AuthenticatedUser,
    app_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Client for a running desktop auth server
#[derive(Clone)]
pub struct DesktopAuthClient {
    client: Client,
    base_url: String,
}

impl DesktopAuthClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Exchange a web session for a desktop token
    pub async fn generate_token(
        &self,
        access_token: &str,
        app_id: Option<&str>,
    ) -> Result<IssuedToken, DesktopAuthError> {
        let url = format!("{}/generate-desktop-token", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .json(&GenerateRequest { app_id })
            .send()
            .await
            .context("Failed to send token request")?;

        let response = Self::check_response(response).await?;
        let issued = response
            .json::<IssuedToken>()
            .await
            .context("Failed to parse token response")?;

        Ok(issued)
    }

    /// Check a desktop token against the server
    pub async fn verify_token(&self, token: &str) -> Result<VerifiedToken, DesktopAuthError> {
        let url = format!("{}/verify-desktop-token", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&VerifyRequest { token })
            .send()
            .await
            .context("Failed to send verify request")?;

        let response = Self::check_response(response).await?;
        let body = response
            .json::<VerifyResponse>()
            .await
            .context("Failed to parse verify response")?;

        Ok(VerifiedToken {
            user: body.user,
            app_id: body.app_id,
        })
    }

    async fn check_response(response: Response) -> Result<Response, DesktopAuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|body| body.error)
            .unwrap_or_default();
        debug!(status = %status, message = %message, "Desktop auth request failed");

        Err(match status {
            StatusCode::BAD_REQUEST => DesktopAuthError::BadRequest(message),
            StatusCode::UNAUTHORIZED => DesktopAuthError::from_unauthorized_message(&message),
            _ => DesktopAuthError::Internal(anyhow::anyhow!(
                "Server returned HTTP {}: {}",
                status,
                message
            )),
        })
    }
}

#[async_trait]
impl TokenIssuer for DesktopAuthClient {
    async fn issue_token(
        &self,
        access_token: &str,
        app_id: Option<&str>,
    ) -> Result<IssuedToken, DesktopAuthError> {
        self.generate_token(access_token, app_id).await
    }
}
