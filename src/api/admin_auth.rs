//! Bearer-token authentication for the admin introspection surface.
//!
//! When `[server].admin_token_env` names a set environment variable, every
//! `/admin/*` route requires an `Authorization: Bearer <token>` header
//! matching its value. Requests with a missing or incorrect token are
//! rejected with `401 Unauthorized`.
//!
//! When no token is configured the middleware is a no-op — admin auth is
//! disabled. This is only appropriate when the admin port is strictly
//! firewalled to trusted hosts.

use std::sync::Arc;

use axum::{
    extract::{FromRef, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::runtime::RuntimeConfigService;

/// Shared state for the admin router: the runtime config service plus the
/// resolved admin token (if auth is enabled). `Arc<RuntimeConfigService>`
/// is extracted from this via [`FromRef`] so existing handlers keep using
/// `State<Arc<RuntimeConfigService>>` unchanged.
#[derive(Clone)]
pub struct AdminState {
    pub service: Arc<RuntimeConfigService>,
    pub admin_token: Option<String>,
}

impl FromRef<AdminState> for Arc<RuntimeConfigService> {
    fn from_ref(state: &AdminState) -> Self {
        Arc::clone(&state.service)
    }
}

/// Axum middleware: requires a valid `Authorization: Bearer <token>` header
/// on every admin route when `state.admin_token` is set.
pub async fn admin_auth_middleware(State(state): State<AdminState>, req: Request, next: Next) -> Response {
    let Some(expected) = &state.admin_token else {
        return next.run(req).await;
    };

    let provided = req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected.as_str() => next.run(req).await,
        Some(_) => {
            (StatusCode::UNAUTHORIZED, [(header::WWW_AUTHENTICATE, "Bearer realm=\"connector-configd admin\"")], "Invalid admin token.")
                .into_response()
        }
        None => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer realm=\"connector-configd admin\"")],
            "Admin API requires Authorization: Bearer <token>.",
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn make_router(admin_token: Option<String>) -> Router {
        let service = Arc::new(RuntimeConfigService::new(Arc::new(crate::cache::TenantConfigCache::new(std::time::Duration::from_secs(60))), false));
        let state = AdminState { service, admin_token };
        Router::new()
            .route("/admin/probe", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
            .with_state(state)
    }

    #[tokio::test]
    async fn disabled_auth_passes_through_without_a_header() {
        let app = make_router(None);
        let response = app.oneshot(HttpRequest::builder().uri("/admin/probe").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_header_is_rejected_when_token_configured() {
        let app = make_router(Some("secret".to_string()));
        let response = app.oneshot(HttpRequest::builder().uri("/admin/probe").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_token_is_rejected() {
        let app = make_router(Some("secret".to_string()));
        let response = app
            .oneshot(HttpRequest::builder().uri("/admin/probe").header(header::AUTHORIZATION, "Bearer wrong").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_token_is_accepted() {
        let app = make_router(Some("secret".to_string()));
        let response = app
            .oneshot(HttpRequest::builder().uri("/admin/probe").header(header::AUTHORIZATION, "Bearer secret").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
