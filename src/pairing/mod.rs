//! Desktop pairing flow
//!
//! Drives the browser side of pairing:
//! 1. The user signs in to the web account (or already is)
//! 2. A desktop token is issued for the requesting app
//! 3. The token is handed to the desktop client through a custom URI
//!    scheme, with the token itself available for manual copy
//!
//! The flow is a plain state machine; callers feed it events and the
//! transitions that make no sense are rejected with `InvalidTransition`.

pub mod delivery;

pub use delivery::{DeliveryChannel, RecordingChannel, SystemUriOpener};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::DEFAULT_APP_ID;
use crate::services::TokenIssuer;

/// Characters of the token shown in the manual-copy preview
pub const TOKEN_PREVIEW_LEN: usize = 50;

/// Message shown to the user when issuance fails
const ISSUE_FAILED_MESSAGE: &str = "Failed to generate desktop token. Please try again.";

/// Pairing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairingError {
    #[error("Cannot {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}

/// Token delivered to the desktop client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingDelivery {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub app_id: String,
    pub callback_url: String,
}

impl PairingDelivery {
    /// The full token, for pasting into the desktop client by hand
    pub fn manual_copy_token(&self) -> &str {
        &self.token
    }

    /// Shortened token for display
    pub fn token_preview(&self) -> String {
        if self.token.chars().count() <= TOKEN_PREVIEW_LEN {
            return self.token.clone();
        }
        let head: String = self.token.chars().take(TOKEN_PREVIEW_LEN).collect();
        format!("{}...", head)
    }
}

/// Issuance failure, kept so the user can retry with the same web session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingFailure {
    access_token: String,
    /// Error kind code, for diagnostics
    pub code: &'static str,
    /// User-facing message
    pub message: String,
}

/// Pairing state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingState {
    Unauthenticated,
    Authenticating,
    Issuing { access_token: String },
    Delivered(PairingDelivery),
    Failed(PairingFailure),
}

impl PairingState {
    fn name(&self) -> &'static str {
        match self {
            PairingState::Unauthenticated => "unauthenticated",
            PairingState::Authenticating => "authenticating",
            PairingState::Issuing { .. } => "issuing",
            PairingState::Delivered(_) => "delivered",
            PairingState::Failed(_) => "failed",
        }
    }
}

/// Build `{scheme}://auth-callback?token=..&app_id=..`
pub fn callback_url(scheme: &str, token: &str, app_id: &str) -> String {
    format!(
        "{}://auth-callback?token={}&app_id={}",
        scheme,
        urlencoding::encode(token),
        urlencoding::encode(app_id)
    )
}

/// One pairing attempt for one desktop app
#[derive(Debug, Clone)]
pub struct PairingFlow {
    app_id: String,
    scheme: String,
    state: PairingState,
}

impl PairingFlow {
    /// Start the flow, skipping sign-in when a web session already exists
    pub fn start(
        app_id: Option<&str>,
        scheme: impl Into<String>,
        existing_session: Option<String>,
    ) -> Self {
        let app_id = app_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(DEFAULT_APP_ID)
            .to_string();

        let state = match existing_session {
            Some(access_token) if !access_token.is_empty() => PairingState::Issuing { access_token },
            _ => PairingState::Unauthenticated,
        };

        Self {
            app_id,
            scheme: scheme.into(),
            state,
        }
    }

    pub fn state(&self) -> &PairingState {
        &self.state
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    fn invalid(&self, event: &'static str) -> PairingError {
        PairingError::InvalidTransition {
            state: self.state.name(),
            event,
        }
    }

    /// The user chose to sign in
    pub fn begin_sign_in(&mut self) -> Result<(), PairingError> {
        match self.state {
            PairingState::Unauthenticated | PairingState::Failed(_) => {
                self.state = PairingState::Authenticating;
                Ok(())
            }
            _ => Err(self.invalid("sign in")),
        }
    }

    /// Sign-in completed with a web session
    pub fn signed_in(&mut self, access_token: impl Into<String>) -> Result<(), PairingError> {
        match self.state {
            PairingState::Authenticating => {
                self.state = PairingState::Issuing {
                    access_token: access_token.into(),
                };
                Ok(())
            }
            _ => Err(self.invalid("complete sign in")),
        }
    }

    /// Issue the token and hand it to the desktop client
    ///
    /// Delivery failures are logged only; the token stays available for
    /// manual copy either way.
    pub async fn issue(
        &mut self,
        issuer: &dyn TokenIssuer,
        channel: &dyn DeliveryChannel,
    ) -> Result<&PairingState, PairingError> {
        let access_token = match &self.state {
            PairingState::Issuing { access_token } => access_token.clone(),
            _ => return Err(self.invalid("issue a token")),
        };

        self.state = match issuer.issue_token(&access_token, Some(&self.app_id)).await {
            Ok(issued) => {
                let callback_url = callback_url(&self.scheme, &issued.token, &self.app_id);
                if let Err(e) = channel.open(&callback_url) {
                    warn!(app_id = %self.app_id, error = %e, "Failed to open desktop callback");
                }
                info!(app_id = %self.app_id, "Desktop token delivered");
                PairingState::Delivered(PairingDelivery {
                    token: issued.token,
                    expires_at: issued.expires_at,
                    app_id: self.app_id.clone(),
                    callback_url,
                })
            }
            Err(e) => {
                warn!(app_id = %self.app_id, code = e.code(), "Desktop token issuance failed");
                PairingState::Failed(PairingFailure {
                    access_token,
                    code: e.code(),
                    message: ISSUE_FAILED_MESSAGE.to_string(),
                })
            }
        };

        Ok(&self.state)
    }

    /// Try issuance again with the same web session
    pub fn retry(&mut self) -> Result<(), PairingError> {
        match &self.state {
            PairingState::Failed(failure) => {
                self.state = PairingState::Issuing {
                    access_token: failure.access_token.clone(),
                };
                Ok(())
            }
            _ => Err(self.invalid("retry")),
        }
    }

    /// Drop the web session after a failure
    pub fn sign_out(&mut self) -> Result<(), PairingError> {
        match self.state {
            PairingState::Failed(_) => {
                self.state = PairingState::Unauthenticated;
                Ok(())
            }
            _ => Err(self.invalid("sign out")),
        }
    }
}
