//! The connector contract: the polymorphic surface every concrete backend
//! adapter satisfies, plus the uniform request/response value types (spec
//! §3, §4.2).
//!
//! This plays the role the gateway's `BackendClient` enum plays for LLM
//! backends, generalised from three hardcoded variants to an open family of
//! backend kinds dispatched through [`factory::ConnectorFactory`].

pub mod amadeus;
pub mod cassandra;
pub mod config;
pub mod enterprise;
pub mod factory;
pub mod gcs;
pub mod http;
pub mod mongodb;
pub mod mysql;
pub mod postgres;
pub mod redis;
pub mod salesforce;
pub mod slack;
pub mod snowflake;

use std::any::Any;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConnectorError;

/// A read request against a connector (spec §3 `Query`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    pub statement: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub limit: u64,
}

/// Uniform read response (spec §3 `QueryResult`). `row_count` always equals
/// `rows.len()` — constructors enforce this rather than trusting callers to
/// keep the two in sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<HashMap<String, Value>>,
    pub row_count: u64,
    pub duration: Duration,
    pub cached: bool,
    pub connector: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl QueryResult {
    pub fn new(connector: impl Into<String>, rows: Vec<HashMap<String, Value>>, duration: Duration) -> Self {
        let row_count = rows.len() as u64;
        Self {
            rows,
            row_count,
            duration,
            cached: false,
            connector: connector.into(),
            metadata: HashMap::new(),
        }
    }
}

/// A write request against a connector (spec §3 `Command`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Command {
    pub action: String,
    #[serde(default)]
    pub statement: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub timeout: Option<Duration>,
}

/// Uniform write response (spec §3 `CommandResult`). A `success = false`
/// result MUST NOT carry a misleading `rows_affected > 0` — connectors
/// constructing a failure result must zero it explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub rows_affected: u64,
    pub duration: Duration,
    pub message: String,
    pub connector: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl CommandResult {
    pub fn ok(connector: impl Into<String>, rows_affected: u64, duration: Duration, message: impl Into<String>) -> Self {
        Self {
            success: true,
            rows_affected,
            duration,
            message: message.into(),
            connector: connector.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn failed(connector: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            rows_affected: 0,
            duration: Duration::default(),
            message: message.into(),
            connector: connector.into(),
            metadata: HashMap::new(),
        }
    }
}

/// Probe result (spec §3 `HealthStatus`). `healthy` is the single source of
/// truth — callers must never infer health from `error` being empty by
/// string comparison, but the invariant `healthy <=> error.is_empty()` holds
/// by construction via [`HealthStatus::healthy`]/[`HealthStatus::unhealthy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency: Duration,
    #[serde(default)]
    pub details: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error: String,
}

impl HealthStatus {
    pub fn healthy(latency: Duration) -> Self {
        Self {
            healthy: true,
            latency,
            details: HashMap::new(),
            timestamp: Utc::now(),
            error: String::new(),
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            latency: Duration::default(),
            details: HashMap::new(),
            timestamp: Utc::now(),
            error: error.into(),
        }
    }
}

/// The polymorphic surface every concrete backend adapter satisfies (spec
/// §4.2). `connect` is not required to be idempotent — calling it twice on
/// the same instance is a programmer error, not a contract violation the
/// trait needs to guard against.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&mut self) -> Result<(), ConnectorError>;

    async fn disconnect(&mut self) -> Result<(), ConnectorError>;

    async fn health_check(&self) -> HealthStatus;

    async fn query(&self, query: Query) -> Result<QueryResult, ConnectorError>;

    async fn execute(&self, command: Command) -> Result<CommandResult, ConnectorError>;

    fn name(&self) -> &str;

    fn connector_type(&self) -> config::ConnectorType;

    fn version(&self) -> &str;

    fn capabilities(&self) -> Vec<&'static str>;

    /// Downcast escape hatch for backend-specific extensions beyond the
    /// uniform surface (e.g. relational `begin_tx`/`prepare`). Most
    /// connectors never need to override the default.
    fn as_any(&self) -> &dyn Any {
        unreachable!("as_any must be overridden by connectors that expose extensions")
    }
}

/// Extract positional parameter values from `params` for a `statement`,
/// following the three conventions from spec §4.2, in priority order:
///
/// 1. The order `:name` tokens occur in `statement`, if any are present.
/// 2. Numeric-key order, if every key in `params` parses as an integer.
/// 3. Alphabetical key order, as the final fallback.
pub fn extract_positional_params(statement: &str, params: &HashMap<String, Value>) -> Vec<Value> {
    let named_order = named_placeholder_order(statement);
    if !named_order.is_empty() {
        return named_order
            .into_iter()
            .filter_map(|name| params.get(&name).cloned())
            .collect();
    }

    if !params.is_empty() && params.keys().all(|k| k.parse::<i64>().is_ok()) {
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort_by_key(|k| k.parse::<i64>().unwrap());
        return keys.into_iter().filter_map(|k| params.get(k).cloned()).collect();
    }

    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    keys.into_iter().filter_map(|k| params.get(k).cloned()).collect()
}

/// Find `:name` tokens in `statement`, in order of first occurrence,
/// deduplicated. A colon is only treated as a placeholder marker when
/// immediately followed by an identifier-shaped run of characters.
fn named_placeholder_order(statement: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut order = Vec::new();
    let bytes = statement.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' && i + 1 < bytes.len() && (bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_') {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                end += 1;
            }
            let name = statement[start..end].to_string();
            if seen.insert(name.clone()) {
                order.push(name);
            }
            i = end;
        } else {
            i += 1;
        }
    }
    order
}

/// Rewrite `:name` placeholders in `statement` to `replacement` (e.g. `?` for
/// MySQL/Cassandra, or a `$n`-style callback for Postgres), in the order
/// that [`extract_positional_params`] would extract their values, so the
/// Nth placeholder written lines up with the Nth extracted parameter.
pub fn rewrite_named_placeholders(statement: &str, mut next_placeholder: impl FnMut(usize) -> String) -> String {
    let mut out = String::with_capacity(statement.len());
    let bytes = statement.as_bytes();
    let mut i = 0;
    let mut ordinal = 0;
    while i < bytes.len() {
        if bytes[i] == b':' && i + 1 < bytes.len() && (bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_') {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                end += 1;
            }
            out.push_str(&next_placeholder(ordinal));
            ordinal += 1;
            i = end;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}
