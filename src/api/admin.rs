//! Operator-facing admin routes: cache stats and tenant configuration
//! introspection. Credentials are always rendered through
//! `redacted_credentials()` — never the live value (spec §3, §7).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::api::admin_auth::{admin_auth_middleware, AdminState};
use crate::runtime::RuntimeConfigService;
use crate::security::log_sanitize::sanitize;

/// Builds the admin router, gated by [`admin_auth_middleware`] whenever
/// `state.admin_token` is set. Callers merge this into the top-level router
/// alongside ungated routes like `/healthz`.
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/cache/stats", get(cache_stats))
        .route("/admin/tenants/{tenant}/connectors", get(tenant_connectors))
        .route("/admin/tenants/{tenant}/llm-providers", get(tenant_llm_providers))
        .layer(axum::middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// GET /admin/cache/stats
async fn cache_stats(State(service): State<Arc<RuntimeConfigService>>) -> impl IntoResponse {
    let stats = service.cache().stats();
    Json(json!({
        "hits": stats.hits,
        "misses": stats.misses,
        "evictions": stats.evictions,
        "hit_rate": service.cache().hit_rate(),
    }))
}

/// GET /admin/tenants/:tenant/connectors — resolved connector configs for
/// `tenant`, credentials redacted.
async fn tenant_connectors(State(service): State<Arc<RuntimeConfigService>>, Path(tenant): Path<String>) -> impl IntoResponse {
    match service.get_connector_configs(&tenant).await {
        Ok((configs, source)) => {
            let entries: Vec<_> = configs
                .iter()
                .map(|c| {
                    json!({
                        "name": c.name,
                        "type": c.connector_type.as_str(),
                        "display_name": c.display_name,
                        "connection_url": c.connection_url,
                        "credentials": c.redacted_credentials(),
                        "tenant_id": c.tenant_id,
                        "timeout_ms": c.timeout.as_millis() as u64,
                        "max_retries": c.max_retries,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "source": source.as_str(), "connectors": entries }))).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %sanitize(&e.to_string()), tenant = %sanitize(&tenant), "tenant connector lookup failed");
            (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

/// GET /admin/tenants/:tenant/llm-providers — resolved LLM provider
/// configs for `tenant`, sorted by priority/weight, credentials redacted.
async fn tenant_llm_providers(State(service): State<Arc<RuntimeConfigService>>, Path(tenant): Path<String>) -> impl IntoResponse {
    match service.get_llm_provider_configs(&tenant).await {
        Ok((providers, source)) => {
            let entries: Vec<_> = providers
                .iter()
                .map(|p| {
                    json!({
                        "provider_name": p.provider_name.as_str(),
                        "display_name": p.display_name,
                        "priority": p.priority,
                        "weight": p.weight,
                        "enabled": p.enabled,
                        "health_status": p.health_status,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "source": source.as_str(), "llm_providers": entries }))).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %sanitize(&e.to_string()), tenant = %sanitize(&tenant), "tenant llm provider lookup failed");
            (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}
