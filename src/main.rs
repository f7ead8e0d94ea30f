use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{routing::get, Router};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use connector_core::cache::TenantConfigCache;
use connector_core::file_loader::FileLoader;
use connector_core::runtime::RuntimeConfigService;
use connector_core::secrets::{EnvPrefixSecretResolver, SecretResolver};
use connector_core::store::{ConnectorStore, PostgresConnectorStore};

mod api;
mod config;

pub use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "connector_core=info,tower_http=warn".into()))
        .init();

    let config_path = std::env::var("CONNECTOR_CONFIGD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/connector-configd/config.toml"));

    let config = if config_path.exists() {
        Config::load(&config_path).with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        info!(path = %config_path.display(), "no bootstrap config file found, using defaults");
        Config::default()
    };

    info!(admin_port = config.server.admin_port, "connector-configd starting");

    let cache = Arc::new(TenantConfigCache::new(config.cache_ttl()));
    let mut service = RuntimeConfigService::new(Arc::clone(&cache), config.runtime.self_hosted);

    if let Some(database_url_env) = &config.paths.database_url_env {
        if let Ok(database_url) = std::env::var(database_url_env) {
            match PostgresConnectorStore::connect(&database_url).await {
                Ok(store) => {
                    let store: Arc<dyn ConnectorStore> = Arc::new(store);
                    service = service.with_store(store);
                    info!("persistent connector store connected");
                }
                Err(e) => tracing::warn!(error = %e.sanitized(), "failed to connect persistent connector store, continuing without it"),
            }
        }
    }

    let secret_resolver: Arc<dyn SecretResolver> = Arc::new(EnvPrefixSecretResolver::new(config.runtime.secret_env_prefix.clone()));
    service = service.with_secret_resolver(secret_resolver);

    let service = Arc::new(service);

    if let Some(connectors_file) = &config.paths.connectors_file {
        service.set_file_loader(Arc::new(FileLoader::new(connectors_file))).await;
        info!(path = %connectors_file.display(), "declarative connectors file configured");
    }

    let shutdown = CancellationToken::new();
    service.start_periodic_cleanup(config.cleanup_interval(), shutdown.clone());

    let admin_addr: SocketAddr = format!("0.0.0.0:{}", config.server.admin_port).parse()?;
    let listener = tokio::net::TcpListener::bind(admin_addr).await?;
    info!(%admin_addr, "admin introspection surface listening");

    let admin_token = config
        .server
        .admin_token_env
        .as_ref()
        .and_then(|var| match std::env::var(var) {
            Ok(token) => Some(token),
            Err(_) => {
                tracing::warn!(env_var = %var, "admin_token_env configured but not set, admin auth disabled");
                None
            }
        });
    if admin_token.is_none() {
        tracing::warn!("admin authentication disabled, admin surface is unauthenticated");
    }
    let admin_state = api::admin_auth::AdminState { service: Arc::clone(&service), admin_token };

    let trace_layer = tower_http::trace::TraceLayer::new_for_http()
        .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO));

    let app = Router::new()
        .route("/healthz", get(api::health::healthz))
        .merge(api::admin::router(admin_state))
        .layer(axum::middleware::from_fn(api::request_id::request_id_middleware))
        .layer(trace_layer);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("admin server error")?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    shutdown.cancel();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
