//! API layer - HTTP handlers and routing
//!
//! This module contains the HTTP endpoints of the desktop pairing backend:
//! - Desktop token issuance and verification
//! - Desktop session listing and revocation

pub mod desktop_sessions;
pub mod desktop_token;
pub mod middleware;

use axum::{
    http::{header, HeaderName, Method},
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, ErrorBody};

/// Build the API routes
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Dashboard routes (need a web session)
    let protected_routes = Router::new()
        .route("/desktop-sessions", get(desktop_sessions::list_desktop_sessions))
        .route(
            "/desktop-sessions/{id}",
            delete(desktop_sessions::revoke_desktop_session),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Token routes authenticate on their own
    Router::new()
        .route("/generate-desktop-token", post(desktop_token::generate_desktop_token))
        .route("/verify-desktop-token", post(desktop_token::verify_desktop_token))
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    // Desktop clients and browser pages call from any origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ]);

    Router::new()
        .merge(build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use axum_test::TestServer;

    pub(crate) use axum::http::header::AUTHORIZATION;

    use super::{build_router, AppState};
    use crate::db::repositories::DesktopSessionRepository;
    use crate::services::issuance::test_support::{identity, issuance, setup_repo, TEST_SECRET};
    use crate::services::{
        DesktopSessionService, IssuanceService, IssuedToken, TokenCodec, VerificationService,
    };

    pub(crate) struct TestContext {
        pub server: TestServer,
        pub repo: Arc<dyn DesktopSessionRepository>,
        pub issuance: Arc<IssuanceService>,
    }

    impl TestContext {
        pub(crate) async fn new() -> Self {
            let repo = setup_repo().await;
            let issuance = Arc::new(issuance(repo.clone()));
            let state = AppState {
                identity: identity(),
                issuance: issuance.clone(),
                verification: Arc::new(VerificationService::new(
                    TokenCodec::new(TEST_SECRET),
                    repo.clone(),
                )),
                sessions: Arc::new(DesktopSessionService::new(repo.clone())),
            };
            let server = TestServer::new(build_router(state)).expect("Failed to start test server");

            Self {
                server,
                repo,
                issuance,
            }
        }

        pub(crate) async fn issue(&self, access_token: &str, app_id: Option<&str>) -> IssuedToken {
            self.issuance
                .issue(Some(access_token), app_id)
                .await
                .expect("Failed to issue token")
        }
    }

    pub(crate) fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).expect("Invalid header value")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::http::{header, Method};

    #[tokio::test]
    async fn test_cors_preflight_allows_any_origin() {
        let ctx = TestContext::new().await;

        let response = ctx
            .server
            .method(Method::OPTIONS, "/generate-desktop-token")
            .add_header(header::ORIGIN, header::HeaderValue::from_static("https://example.com"))
            .add_header(
                header::ACCESS_CONTROL_REQUEST_METHOD,
                header::HeaderValue::from_static("POST"),
            )
            .add_header(
                header::ACCESS_CONTROL_REQUEST_HEADERS,
                header::HeaderValue::from_static("authorization,content-type"),
            )
            .await;

        assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
        let allowed = response.header(header::ACCESS_CONTROL_ALLOW_HEADERS);
        let allowed = allowed.to_str().unwrap();
        assert!(allowed.contains("authorization"));
        assert!(allowed.contains("apikey"));
        assert!(allowed.contains("x-client-info"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let ctx = TestContext::new().await;

        ctx.server
            .get("/nope")
            .await
            .assert_status(axum::http::StatusCode::NOT_FOUND);
    }
}
