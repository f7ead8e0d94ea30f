//! Persistent store (spec §4.7's "persistent-store handle", wire schema
//! §6). `ConnectorStore` is the trait [`crate::runtime::RuntimeConfigService`]
//! depends on; `PostgresConnectorStore` is the one real implementation,
//! grounded on the same `sqlx::PgPool` usage as
//! [`crate::connector::postgres::PostgresConnector`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::error::{ConnectorError, ErrorKind};

/// One row materialised from `connector_configs` joined against
/// `connector_dangerous_operations` (spec §6). Kept distinct from
/// [`crate::connector::config::ConnectorConfig`] because it still carries
/// the secret reference rather than hydrated credentials, and
/// `blocked_operations` has no place in the immutable `ConnectorConfig`
/// shape (spec §3) — see DESIGN.md.
#[derive(Debug, Clone)]
pub struct StoredConnectorRow {
    pub tenant_id: String,
    pub connector_name: String,
    pub connector_type: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub connection_url: Option<String>,
    pub options: HashMap<String, Value>,
    pub credentials_secret_arn: Option<String>,
    pub credentials_secret_version: Option<String>,
    pub timeout_ms: i64,
    pub max_retries: i32,
    pub enabled: bool,
    pub health_status: Option<String>,
    pub blocked_operations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StoredProviderRow {
    pub tenant_id: String,
    pub provider_name: String,
    pub display_name: Option<String>,
    pub config: HashMap<String, Value>,
    pub credentials_secret_arn: Option<String>,
    pub priority: i32,
    pub weight: f64,
    pub enabled: bool,
    pub health_status: Option<String>,
    pub cost_per_1k_input_tokens: Option<f64>,
    pub cost_per_1k_output_tokens: Option<f64>,
}

#[async_trait]
pub trait ConnectorStore: Send + Sync {
    /// Connector rows for `tenant`, blocked-operations coalesced
    /// tenant-specific over global, `enabled = true` only (spec §6).
    async fn list_connector_configs(&self, tenant: &str) -> Result<Vec<StoredConnectorRow>, ConnectorError>;

    /// LLM provider rows for `tenant`, ordered by `priority DESC, weight
    /// DESC`, `enabled = true` only (spec §6).
    async fn list_llm_provider_configs(&self, tenant: &str) -> Result<Vec<StoredProviderRow>, ConnectorError>;
}

pub struct PostgresConnectorStore {
    pool: PgPool,
}

impl PostgresConnectorStore {
    pub async fn connect(database_url: &str) -> Result<Self, ConnectorError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| ConnectorError::new("connector-store", "connect", ErrorKind::Connectivity, e.to_string()).with_cause(e))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CONNECTOR_QUERY: &str = r#"
SELECT
    cc.tenant_id,
    cc.connector_name,
    cc.connector_type,
    cc.display_name,
    cc.description,
    cc.connection_url,
    cc.options,
    cc.credentials_secret_arn,
    cc.credentials_secret_version,
    cc.timeout_ms,
    cc.max_retries,
    cc.enabled,
    cc.health_status,
    COALESCE(tenant_ops.blocked_operations, global_ops.blocked_operations, ARRAY[]::text[]) AS blocked_operations
FROM connector_configs cc
LEFT JOIN connector_dangerous_operations tenant_ops
    ON tenant_ops.connector_type = cc.connector_type AND tenant_ops.tenant_id = cc.tenant_id
LEFT JOIN connector_dangerous_operations global_ops
    ON global_ops.connector_type = cc.connector_type AND global_ops.tenant_id IS NULL
WHERE cc.enabled = true AND (cc.tenant_id = $1 OR cc.tenant_id = '*')
"#;

const PROVIDER_QUERY: &str = r#"
SELECT
    tenant_id,
    provider_name,
    display_name,
    config,
    credentials_secret_arn,
    priority,
    weight,
    enabled,
    health_status,
    cost_per_1k_input_tokens,
    cost_per_1k_output_tokens
FROM llm_provider_configs
WHERE enabled = true AND (tenant_id = $1 OR tenant_id = '*')
ORDER BY priority DESC, weight DESC
"#;

#[async_trait]
impl ConnectorStore for PostgresConnectorStore {
    async fn list_connector_configs(&self, tenant: &str) -> Result<Vec<StoredConnectorRow>, ConnectorError> {
        let rows = sqlx::query(CONNECTOR_QUERY)
            .bind(tenant)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ConnectorError::new("connector-store", "list_connector_configs", ErrorKind::Connectivity, e.to_string()).with_cause(e))?;

        rows.into_iter()
            .map(|row| {
                let options_json: Value = row.try_get("options").unwrap_or(Value::Null);
                let options = match options_json {
                    Value::Object(map) => map.into_iter().collect(),
                    _ => HashMap::new(),
                };
                Ok(StoredConnectorRow {
                    tenant_id: row.try_get("tenant_id").unwrap_or_default(),
                    connector_name: row.try_get("connector_name").unwrap_or_default(),
                    connector_type: row.try_get("connector_type").unwrap_or_default(),
                    display_name: row.try_get("display_name").ok(),
                    description: row.try_get("description").ok(),
                    connection_url: row.try_get("connection_url").ok(),
                    options,
                    credentials_secret_arn: row.try_get("credentials_secret_arn").ok(),
                    credentials_secret_version: row.try_get("credentials_secret_version").ok(),
                    timeout_ms: row.try_get("timeout_ms").unwrap_or(30_000),
                    max_retries: row.try_get("max_retries").unwrap_or(3),
                    enabled: row.try_get("enabled").unwrap_or(true),
                    health_status: row.try_get("health_status").ok(),
                    blocked_operations: row.try_get("blocked_operations").unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn list_llm_provider_configs(&self, tenant: &str) -> Result<Vec<StoredProviderRow>, ConnectorError> {
        let rows = sqlx::query(PROVIDER_QUERY)
            .bind(tenant)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ConnectorError::new("connector-store", "list_llm_provider_configs", ErrorKind::Connectivity, e.to_string()).with_cause(e))?;

        rows.into_iter()
            .map(|row| {
                let config_json: Value = row.try_get("config").unwrap_or(Value::Null);
                let config = match config_json {
                    Value::Object(map) => map.into_iter().collect(),
                    _ => HashMap::new(),
                };
                Ok(StoredProviderRow {
                    tenant_id: row.try_get("tenant_id").unwrap_or_default(),
                    provider_name: row.try_get("provider_name").unwrap_or_default(),
                    display_name: row.try_get("display_name").ok(),
                    config,
                    credentials_secret_arn: row.try_get("credentials_secret_arn").ok(),
                    priority: row.try_get("priority").unwrap_or(5),
                    weight: row.try_get("weight").unwrap_or(1.0),
                    enabled: row.try_get("enabled").unwrap_or(true),
                    health_status: row.try_get("health_status").ok(),
                    cost_per_1k_input_tokens: row.try_get("cost_per_1k_input_tokens").ok(),
                    cost_per_1k_output_tokens: row.try_get("cost_per_1k_output_tokens").ok(),
                })
            })
            .collect()
    }
}

impl StoredConnectorRow {
    pub fn timeout(&self) -> Duration {
        if self.timeout_ms <= 0 {
            Duration::from_secs(30)
        } else {
            Duration::from_millis(self.timeout_ms as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_non_positive_falls_back_to_30s() {
        let row = StoredConnectorRow {
            tenant_id: "*".into(),
            connector_name: "pg".into(),
            connector_type: "postgres".into(),
            display_name: None,
            description: None,
            connection_url: None,
            options: HashMap::new(),
            credentials_secret_arn: None,
            credentials_secret_version: None,
            timeout_ms: 0,
            max_retries: 3,
            enabled: true,
            health_status: None,
            blocked_operations: Vec::new(),
        };
        assert_eq!(row.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn timeout_positive_converts_from_millis() {
        let mut row = StoredConnectorRow {
            tenant_id: "*".into(),
            connector_name: "pg".into(),
            connector_type: "postgres".into(),
            display_name: None,
            description: None,
            connection_url: None,
            options: HashMap::new(),
            credentials_secret_arn: None,
            credentials_secret_version: None,
            timeout_ms: 0,
            max_retries: 3,
            enabled: true,
            health_status: None,
            blocked_operations: Vec::new(),
        };
        row.timeout_ms = 5_000;
        assert_eq!(row.timeout(), Duration::from_millis(5_000));
    }
}
