//! Desktop token API endpoints
//!
//! - POST /generate-desktop-token - Exchange a web session for a desktop token
//! - POST /verify-desktop-token - Check a desktop token

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::api::middleware::{extract_bearer, ApiError, AppState};
use crate::models::AuthenticatedUser;
use crate::services::{authenticate, IssuedToken};

/// Request body for token generation (the body itself is optional)
#[derive(Debug, Default, Deserialize)]
pub struct GenerateTokenRequest {
    #[serde(default)]
    pub app_id: Option<String>,
}

/// Request body for token verification
#[derive(Debug, Default, Deserialize)]
pub struct VerifyTokenRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// Response for a verified token
#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    pub user: AuthenticatedUser,
    pub app_id: String,
}

/// Parse an optional JSON body; an empty body is the default value
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid request body"))
}

/// POST /generate-desktop-token
pub async fn generate_desktop_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IssuedToken>, ApiError> {
    let bearer = extract_bearer(&headers);
    let user = authenticate(state.identity.as_ref(), bearer.as_deref()).await?;

    let request: GenerateTokenRequest = parse_body(&body)?;
    let issued = state
        .issuance
        .issue_for(&user, request.app_id.as_deref())
        .await?;

    Ok(Json(issued))
}

/// POST /verify-desktop-token
pub async fn verify_desktop_token(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<VerifyTokenResponse>, ApiError> {
    let request: VerifyTokenRequest = parse_body(&body)?;
    let token = request
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Token is required"))?;

    let verified = state.verification.verify(&token).await?;

    Ok(Json(VerifyTokenResponse {
        valid: true,
        user: verified.user,
        app_id: verified.app_id,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use crate::db::repositories::DesktopSessionRepository;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_generate_and_verify() {
        let ctx = TestContext::new().await;

        let response = ctx
            .server
            .post("/generate-desktop-token")
            .add_header(AUTHORIZATION, bearer("web-session"))
            .json(&json!({"app_id": "ide-plugin"}))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["user"]["id"], "u1");
        assert_eq!(body["user"]["email"], "a@b.c");
        let token = body["token"].as_str().unwrap().to_string();
        assert!(body["expires_at"].as_str().is_some());

        let response = ctx
            .server
            .post("/verify-desktop-token")
            .json(&json!({"token": token}))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["valid"], true);
        assert_eq!(body["user"]["id"], "u1");
        assert_eq!(body["app_id"], "ide-plugin");
    }

    #[tokio::test]
    async fn test_generate_without_body_uses_default_app() {
        let ctx = TestContext::new().await;

        let response = ctx
            .server
            .post("/generate-desktop-token")
            .add_header(AUTHORIZATION, bearer("web-session"))
            .await;
        response.assert_status_ok();

        let rows = ctx.repo.find_by_user("u1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].app_id, "default");
    }

    #[tokio::test]
    async fn test_generate_without_authorization_writes_nothing() {
        let ctx = TestContext::new().await;

        let response = ctx
            .server
            .post("/generate-desktop-token")
            .json(&json!({"app_id": "ide-plugin"}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Unauthorized");
        assert!(ctx.repo.find_by_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_rejects_long_app_id() {
        let ctx = TestContext::new().await;

        let response = ctx
            .server
            .post("/generate-desktop-token")
            .add_header(AUTHORIZATION, bearer("web-session"))
            .json(&json!({"app_id": "x".repeat(129)}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_missing_token() {
        let ctx = TestContext::new().await;

        let response = ctx.server.post("/verify-desktop-token").json(&json!({})).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Token is required");
    }

    #[tokio::test]
    async fn test_verify_rejections_are_unauthorized() {
        let ctx = TestContext::new().await;

        let response = ctx
            .server
            .post("/verify-desktop-token")
            .json(&json!({"token": "garbage"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Malformed token");

        let issued = ctx.issue("web-session", None).await;
        let merged = issued.token.replacen('.', "A", 1);
        let response = ctx
            .server
            .post("/verify-desktop-token")
            .json(&json!({"token": merged}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Invalid token");

        let row = ctx.repo.find_by_token(&issued.token).await.unwrap().unwrap();
        ctx.repo.delete(&row.id).await.unwrap();

        let response = ctx
            .server
            .post("/verify-desktop-token")
            .json(&json!({"token": issued.token}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Session not found");
    }
}
