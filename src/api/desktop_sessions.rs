//! Desktop session management API endpoints
//!
//! - GET /desktop-sessions - List the caller's desktop sessions
//! - DELETE /desktop-sessions/{id} - Revoke one of them

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{AuthenticatedUser, DesktopSession, DesktopSessionStatus};
use crate::services::DesktopAuthError;

/// One session as shown on the dashboard (never includes the token)
#[derive(Debug, Serialize)]
pub struct DesktopSessionResponse {
    pub id: String,
    pub app_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub status: DesktopSessionStatus,
}

impl DesktopSessionResponse {
    fn from_session(session: DesktopSession, now: DateTime<Utc>) -> Self {
        let status = session.status_at(now);
        Self {
            id: session.id,
            app_id: session.app_id,
            created_at: session.created_at,
            expires_at: session.expires_at,
            used_at: session.used_at,
            status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DesktopSessionListResponse {
    pub sessions: Vec<DesktopSessionResponse>,
}

/// GET /desktop-sessions
pub async fn list_desktop_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<DesktopSessionListResponse>, ApiError> {
    let now = Utc::now();
    let sessions = state
        .sessions
        .list_for_user(&user.id)
        .await?
        .into_iter()
        .map(|s| DesktopSessionResponse::from_session(s, now))
        .collect();

    Ok(Json(DesktopSessionListResponse { sessions }))
}

/// DELETE /desktop-sessions/{id}
///
/// Revoking a session that is already gone is not an error.
pub async fn revoke_desktop_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.sessions.revoke(&user.id, &id).await {
        Ok(()) | Err(DesktopAuthError::NotFound) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into()),
    }
}
