//! Runtime configuration service (spec §4.7) — the central orchestrator
//! that resolves a tenant's connector and LLM provider configuration
//! through the store → file → environment chain, hydrates credentials via
//! the secret resolver, and mediates all cache access. Background cleanup
//! is spawned the same way the gateway's own `main.rs` spawns its
//! `tokio::select!`-shaped background tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::cache::{ConfigSource, TenantConfigCache};
use crate::connector::config::{ConnectorConfig, ConnectorType};
use crate::env_loaders;
use crate::error::{ConnectorError, ErrorKind};
use crate::file_loader::FileLoader;
use crate::llm::{sort_and_filter_enabled, LLMProviderConfig, LLMProviderName};
use crate::secrets::SecretResolver;
use crate::security::log_sanitize::sanitize;
use crate::store::{ConnectorStore, StoredConnectorRow, StoredProviderRow};

pub struct RuntimeConfigService {
    store: Option<Arc<dyn ConnectorStore>>,
    cache: Arc<TenantConfigCache>,
    secret_resolver: Option<Arc<dyn SecretResolver>>,
    file_loader: RwLock<Option<Arc<FileLoader>>>,
    self_hosted: bool,
}

impl RuntimeConfigService {
    pub fn new(cache: Arc<TenantConfigCache>, self_hosted: bool) -> Self {
        Self { store: None, cache, secret_resolver: None, file_loader: RwLock::new(None), self_hosted }
    }

    pub fn with_store(mut self, store: Arc<dyn ConnectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_secret_resolver(mut self, resolver: Arc<dyn SecretResolver>) -> Self {
        self.secret_resolver = Some(resolver);
        self
    }

    /// File loader is set after construction (spec §4.7) — e.g. once the
    /// declarative document path is known from the bootstrap config.
    pub async fn set_file_loader(&self, loader: Arc<FileLoader>) {
        *self.file_loader.write().await = Some(loader);
    }

    async fn hydrate_connector(&self, row: StoredConnectorRow) -> ConnectorConfig {
        let mut credentials = HashMap::new();
        if let (Some(arn), Some(resolver)) = (&row.credentials_secret_arn, &self.secret_resolver) {
            match resolver.get_secret(arn).await {
                Ok(secret) => credentials = secret,
                Err(e) => tracing::warn!(error = %sanitize(&e.to_string()), "failed to resolve connector credentials secret"),
            }
        }

        let mut options = row.options;
        if !row.blocked_operations.is_empty() {
            options.insert(
                "blocked_operations".to_string(),
                Value::Array(row.blocked_operations.into_iter().map(Value::String).collect()),
            );
        }

        let connector_type = row.connector_type.parse().unwrap_or(ConnectorType::Custom);

        ConnectorConfig {
            name: row.connector_name,
            connector_type,
            display_name: row.display_name,
            description: row.description,
            connection_url: row.connection_url,
            credentials,
            options,
            timeout: row.timeout(),
            max_retries: row.max_retries.max(0) as u32,
            tenant_id: row.tenant_id,
        }
    }

    async fn hydrate_provider(&self, row: StoredProviderRow) -> LLMProviderConfig {
        let mut credentials = HashMap::new();
        if let (Some(arn), Some(resolver)) = (&row.credentials_secret_arn, &self.secret_resolver) {
            match resolver.get_secret(arn).await {
                Ok(secret) => credentials = secret,
                Err(e) => tracing::warn!(error = %sanitize(&e.to_string()), "failed to resolve llm provider credentials secret"),
            }
        }

        LLMProviderConfig {
            provider_name: row.provider_name.parse().unwrap_or(LLMProviderName::Openai),
            display_name: row.display_name,
            config: row.config,
            credentials,
            priority: row.priority,
            weight: row.weight,
            enabled: row.enabled,
            health_status: row.health_status,
            cost_per_1k_input_tokens: row.cost_per_1k_input_tokens,
            cost_per_1k_output_tokens: row.cost_per_1k_output_tokens,
        }
    }

    /// Store → file → env resolution chain (spec §4.7). A source that
    /// errors is logged and the chain continues; only exhaustion of all
    /// sources raises an error.
    pub async fn get_connector_configs(&self, tenant: &str) -> Result<(Vec<ConnectorConfig>, ConfigSource), ConnectorError> {
        let (cached, source) = self.cache.get_connectors(tenant).await;
        if let Some(source) = source {
            return Ok((cached, source));
        }

        if let Some(store) = &self.store {
            if !self.self_hosted {
                match store.list_connector_configs(tenant).await {
                    Ok(rows) if !rows.is_empty() => {
                        let mut configs = Vec::with_capacity(rows.len());
                        for row in rows {
                            configs.push(self.hydrate_connector(row).await);
                        }
                        self.cache.set_connectors(tenant, configs.clone(), ConfigSource::Store).await;
                        return Ok((configs, ConfigSource::Store));
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %sanitize(&e.to_string()), "connector store lookup failed, continuing to file source"),
                }
            }
        }

        if let Some(loader) = self.file_loader.read().await.clone() {
            match loader.load_connectors(tenant) {
                Ok(configs) if !configs.is_empty() => {
                    self.cache.set_connectors(tenant, configs.clone(), ConfigSource::File).await;
                    return Ok((configs, ConfigSource::File));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %sanitize(&e.to_string()), "file loader lookup failed, continuing to env source"),
            }
        }

        let mut configs = Vec::new();
        if let Some(c) = env_loaders::load_postgres_from_env("postgres").or_else(|| env_loaders::load_postgres_global_fallback("postgres")) {
            configs.push(c);
        }
        if let Some(c) = env_loaders::load_cassandra_from_env("cassandra") {
            configs.push(c);
        }
        if let Some(c) = env_loaders::load_salesforce_from_env("salesforce") {
            configs.push(c);
        }
        if let Some(c) = env_loaders::load_slack_from_env("slack") {
            configs.push(c);
        }
        if let Some(c) = env_loaders::load_snowflake_from_env("snowflake") {
            configs.push(c);
        }
        if let Some(c) = env_loaders::load_amadeus_from_env("amadeus").or_else(|| env_loaders::load_amadeus_global_fallback("amadeus")) {
            configs.push(c);
        }
        if !configs.is_empty() {
            self.cache.set_connectors(tenant, configs.clone(), ConfigSource::Env).await;
            return Ok((configs, ConfigSource::Env));
        }

        Err(ConnectorError::new("runtime-config", "get_connector_configs", ErrorKind::NotFound, format!("no configurations found for tenant `{tenant}`")))
    }

    pub async fn get_connector_config(&self, tenant: &str, name: &str) -> Result<ConnectorConfig, ConnectorError> {
        let (configs, _) = self.get_connector_configs(tenant).await?;
        configs
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ConnectorError::new("runtime-config", "get_connector_config", ErrorKind::NotFound, format!("no connector named `{name}` for tenant `{tenant}`")))
    }

    pub async fn get_llm_provider_configs(&self, tenant: &str) -> Result<(Vec<LLMProviderConfig>, ConfigSource), ConnectorError> {
        let (cached, source) = self.cache.get_llm_providers(tenant).await;
        if let Some(source) = source {
            return Ok((sort_and_filter_enabled(cached), source));
        }

        if let Some(store) = &self.store {
            if !self.self_hosted {
                match store.list_llm_provider_configs(tenant).await {
                    Ok(rows) if !rows.is_empty() => {
                        let mut providers = Vec::with_capacity(rows.len());
                        for row in rows {
                            providers.push(self.hydrate_provider(row).await);
                        }
                        self.cache.set_llm_providers(tenant, providers.clone(), ConfigSource::Store).await;
                        return Ok((sort_and_filter_enabled(providers), ConfigSource::Store));
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %sanitize(&e.to_string()), "llm provider store lookup failed, continuing to file source"),
                }
            }
        }

        if let Some(loader) = self.file_loader.read().await.clone() {
            match loader.load_llm_providers(tenant) {
                Ok(providers) if !providers.is_empty() => {
                    self.cache.set_llm_providers(tenant, providers.clone(), ConfigSource::File).await;
                    return Ok((sort_and_filter_enabled(providers), ConfigSource::File));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %sanitize(&e.to_string()), "file loader llm provider lookup failed, continuing to env source"),
            }
        }

        let mut providers = Vec::new();
        if let Some(p) = env_loaders::load_bedrock_provider() {
            providers.push(p);
        }
        if let Some(p) = env_loaders::load_ollama_provider() {
            providers.push(p);
        }
        if let Some(p) = env_loaders::load_openai_provider() {
            providers.push(p);
        }
        if let Some(p) = env_loaders::load_anthropic_provider() {
            providers.push(p);
        }
        if !providers.is_empty() {
            self.cache.set_llm_providers(tenant, providers.clone(), ConfigSource::Env).await;
            return Ok((sort_and_filter_enabled(providers), ConfigSource::Env));
        }

        Err(ConnectorError::new("runtime-config", "get_llm_provider_configs", ErrorKind::NotFound, format!("no llm provider configurations found for tenant `{tenant}`")))
    }

    pub async fn refresh_connector_config(&self, tenant: &str, name: &str) {
        self.cache.invalidate_connector(tenant, name).await;
    }

    pub async fn refresh_llm_provider_config(&self, tenant: &str, provider: &str) {
        self.cache.invalidate_llm_provider(tenant, provider).await;
    }

    pub async fn refresh_all_configs(&self) {
        self.cache.invalidate_all().await;
    }

    pub fn start_periodic_cleanup(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        self.cache.clone().start_periodic_cleanup(interval, shutdown)
    }

    pub fn cache(&self) -> &Arc<TenantConfigCache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    struct EmptyStore;

    #[async_trait]
    impl ConnectorStore for EmptyStore {
        async fn list_connector_configs(&self, _tenant: &str) -> Result<Vec<StoredConnectorRow>, ConnectorError> {
            Ok(Vec::new())
        }
        async fn list_llm_provider_configs(&self, _tenant: &str) -> Result<Vec<StoredProviderRow>, ConnectorError> {
            Ok(Vec::new())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ConnectorStore for FailingStore {
        async fn list_connector_configs(&self, _tenant: &str) -> Result<Vec<StoredConnectorRow>, ConnectorError> {
            Err(ConnectorError::new("store", "list", ErrorKind::Connectivity, "unreachable"))
        }
        async fn list_llm_provider_configs(&self, _tenant: &str) -> Result<Vec<StoredProviderRow>, ConnectorError> {
            Err(ConnectorError::new("store", "list", ErrorKind::Connectivity, "unreachable"))
        }
    }

    fn cache() -> Arc<TenantConfigCache> {
        Arc::new(TenantConfigCache::new(Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn falls_through_to_env_when_no_other_source_configured() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("OPENAI_API_KEY", "sk-runtime-test");
        let service = RuntimeConfigService::new(cache(), true);
        let (providers, source) = service.get_llm_provider_configs("acme").await.unwrap();
        assert_eq!(source, ConfigSource::Env);
        assert!(providers.iter().any(|p| p.provider_name.as_str() == "openai"));
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[tokio::test]
    async fn errors_when_no_source_yields_anything() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("ANTHROPIC_API_KEY");
        std::env::remove_var("BEDROCK_REGION");
        std::env::remove_var("AWS_REGION");
        std::env::remove_var("OLLAMA_ENDPOINT");
        let service = RuntimeConfigService::new(cache(), true);
        let err = service.get_llm_provider_configs("acme").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn self_hosted_mode_skips_store_lookup_even_when_populated() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("OPENAI_API_KEY", "sk-runtime-test-2");
        let service = RuntimeConfigService::new(cache(), true).with_store(Arc::new(FailingStore));
        let (_, source) = service.get_llm_provider_configs("acme").await.unwrap();
        assert_eq!(source, ConfigSource::Env);
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[tokio::test]
    async fn store_error_falls_through_to_env_without_failing_the_call() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("OPENAI_API_KEY", "sk-runtime-test-3");
        let service = RuntimeConfigService::new(cache(), false).with_store(Arc::new(FailingStore));
        let (_, source) = service.get_llm_provider_configs("acme").await.unwrap();
        assert_eq!(source, ConfigSource::Env);
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache_and_reports_its_true_source() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("OPENAI_API_KEY", "sk-runtime-test-4");
        let service = RuntimeConfigService::new(cache(), true);
        service.get_llm_provider_configs("acme").await.unwrap();
        std::env::remove_var("OPENAI_API_KEY");
        // Still resolves on the second call even with the env var gone, proving
        // this came from the cache rather than a fresh env lookup — and the
        // source tag is the original `Env`, not a generic cache marker.
        let (_, source) = service.get_llm_provider_configs("acme").await.unwrap();
        assert_eq!(source, ConfigSource::Env);
    }

    #[tokio::test]
    async fn refresh_all_configs_forces_a_fresh_resolution() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("OPENAI_API_KEY", "sk-runtime-test-5");
        let service = RuntimeConfigService::new(cache(), true);
        service.get_llm_provider_configs("acme").await.unwrap();
        service.refresh_all_configs().await;
        std::env::remove_var("OPENAI_API_KEY");
        let err = service.get_llm_provider_configs("acme").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn empty_store_falls_through_to_env() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("OPENAI_API_KEY", "sk-runtime-test-6");
        let service = RuntimeConfigService::new(cache(), false).with_store(Arc::new(EmptyStore));
        let (_, source) = service.get_llm_provider_configs("acme").await.unwrap();
        assert_eq!(source, ConfigSource::Env);
        std::env::remove_var("OPENAI_API_KEY");
    }
}
