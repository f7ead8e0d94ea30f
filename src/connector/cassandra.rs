//! Cassandra (wide-column) connector (spec §4.3 "Wide-column").
//!
//! Parses a multi-host URL of the form `scheme://host1:port,host2:port/keyspace`.
//! No corpus example wraps a wide-column store; `scylla` is the idiomatic
//! async Cassandra/Scylla-compatible driver and is adopted here as the
//! ecosystem-standard pick — see DESIGN.md.

use std::any::Any;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scylla::frame::response::result::CqlValue;
use scylla::frame::types::Consistency as ScyllaConsistency;
use scylla::query::Query as CqlStatement;
use serde_json::Value;

use super::config::{ConnectorConfig, ConnectorType};
use super::{extract_positional_params, Command, CommandResult, Connector, HealthStatus, Query, QueryResult};
use crate::error::{ConnectorError, ErrorKind};

/// Consistency levels recognised via `options.consistency` (spec §4.3).
/// Defaults to `Quorum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    Any,
    One,
    Two,
    Three,
    #[default]
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

impl Consistency {
    fn to_scylla(self) -> ScyllaConsistency {
        match self {
            Self::Any => ScyllaConsistency::Any,
            Self::One => ScyllaConsistency::One,
            Self::Two => ScyllaConsistency::Two,
            Self::Three => ScyllaConsistency::Three,
            Self::Quorum => ScyllaConsistency::Quorum,
            Self::All => ScyllaConsistency::All,
            Self::LocalQuorum => ScyllaConsistency::LocalQuorum,
            Self::EachQuorum => ScyllaConsistency::EachQuorum,
            Self::LocalOne => ScyllaConsistency::LocalOne,
        }
    }
}

impl std::str::FromStr for Consistency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ANY" => Ok(Self::Any),
            "ONE" => Ok(Self::One),
            "TWO" => Ok(Self::Two),
            "THREE" => Ok(Self::Three),
            "QUORUM" => Ok(Self::Quorum),
            "ALL" => Ok(Self::All),
            "LOCAL_QUORUM" => Ok(Self::LocalQuorum),
            "EACH_QUORUM" => Ok(Self::EachQuorum),
            "LOCAL_ONE" => Ok(Self::LocalOne),
            other => Err(format!("unrecognised consistency level `{other}`")),
        }
    }
}

/// A parsed `scheme://host1:port,host2:port/keyspace` connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CassandraEndpoints {
    pub hosts: Vec<String>,
    pub keyspace: String,
}

pub fn parse_connection_url(raw: &str) -> Result<CassandraEndpoints, ConnectorError> {
    let without_scheme = raw.split_once("://").map(|(_, rest)| rest).unwrap_or(raw);
    let (host_part, keyspace_part) = without_scheme.split_once('/').ok_or_else(|| {
        ConnectorError::new("cassandra", "parse_connection_url", ErrorKind::Configuration, "missing keyspace segment in connection URL")
    })?;

    let keyspace = keyspace_part.trim_matches('/').to_string();
    if keyspace.is_empty() {
        return Err(ConnectorError::new(
            "cassandra",
            "parse_connection_url",
            ErrorKind::Configuration,
            "keyspace is required",
        ));
    }

    let hosts: Vec<String> = host_part.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    if hosts.is_empty() {
        return Err(ConnectorError::new(
            "cassandra",
            "parse_connection_url",
            ErrorKind::Configuration,
            "at least one host is required",
        ));
    }

    Ok(CassandraEndpoints { hosts, keyspace })
}

/// Converts a decoded CQL cell into the same `serde_json::Value` shape
/// `postgres.rs::row_to_map`/`mysql.rs::row_to_map` produce, so all
/// statement-based connectors hand callers a uniform row representation.
fn cql_value_to_json(value: Option<&CqlValue>) -> Value {
    match value {
        None => Value::Null,
        Some(CqlValue::Ascii(s)) | Some(CqlValue::Text(s)) => Value::String(s.clone()),
        Some(CqlValue::Boolean(b)) => Value::Bool(*b),
        Some(CqlValue::TinyInt(i)) => Value::from(*i),
        Some(CqlValue::SmallInt(i)) => Value::from(*i),
        Some(CqlValue::Int(i)) => Value::from(*i),
        Some(CqlValue::BigInt(i)) => Value::from(*i),
        Some(CqlValue::Float(f)) => Value::from(*f as f64),
        Some(CqlValue::Double(f)) => Value::from(*f),
        Some(CqlValue::Uuid(u)) => Value::String(u.to_string()),
        Some(CqlValue::Timeuuid(u)) => Value::String(u.to_string()),
        Some(CqlValue::Blob(bytes)) => {
            Value::String(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes))
        }
        Some(other) => Value::String(format!("{other:?}")),
    }
}

fn row_to_map(col_names: &[String], row: &scylla::frame::response::result::Row) -> HashMap<String, Value> {
    let mut map = HashMap::with_capacity(col_names.len());
    for (name, value) in col_names.iter().zip(row.columns.iter()) {
        map.insert(name.clone(), cql_value_to_json(value.as_ref()));
    }
    map
}

pub struct CassandraConnector {
    name: String,
    endpoints: CassandraEndpoints,
    consistency: Consistency,
    timeout: Duration,
    session: Option<scylla::Session>,
}

impl CassandraConnector {
    pub fn new(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let raw = config.connection_url.clone().ok_or_else(|| {
            ConnectorError::new(config.name.clone(), "new", ErrorKind::Configuration, "cassandra connector requires connection_url")
        })?;
        let endpoints = parse_connection_url(&raw)?;
        let consistency = config
            .options
            .get("consistency")
            .and_then(Value::as_str)
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: String| ConnectorError::new(config.name.clone(), "new", ErrorKind::Configuration, e))?
            .unwrap_or_default();

        Ok(Self {
            name: config.name.clone(),
            endpoints,
            consistency,
            timeout: config.timeout,
            session: None,
        })
    }
}

#[async_trait]
impl Connector for CassandraConnector {
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        let session = scylla::SessionBuilder::new()
            .known_nodes(&self.endpoints.hosts)
            .use_keyspace(&self.endpoints.keyspace, false)
            .build()
            .await
            .map_err(|e| {
                ConnectorError::new(self.name.clone(), "connect", ErrorKind::Connectivity, e.to_string()).with_cause(e)
            })?;
        self.session = Some(session);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        self.session = None;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        let start = Instant::now();
        let Some(session) = &self.session else {
            return HealthStatus::unhealthy("not connected");
        };
        match tokio::time::timeout(Duration::from_secs(5), session.query_unpaged("SELECT now() FROM system.local", &[])).await {
            Ok(Ok(_)) => HealthStatus::healthy(start.elapsed()),
            Ok(Err(e)) => HealthStatus::unhealthy(e.to_string()),
            Err(_) => HealthStatus::unhealthy("health check deadline exceeded"),
        }
    }

    async fn query(&self, query: Query) -> Result<QueryResult, ConnectorError> {
        let start = Instant::now();
        let Some(session) = &self.session else {
            return Err(ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, "not connected"));
        };
        let params = extract_positional_params(&query.statement, &query.parameters);
        let cql_values: Vec<String> = params.iter().map(|v| v.to_string()).collect();
        let timeout = query.timeout.unwrap_or(self.timeout);

        let mut statement = CqlStatement::new(query.statement.clone());
        statement.set_consistency(self.consistency.to_scylla());

        let result = tokio::time::timeout(timeout, session.query_unpaged(statement, cql_values))
            .await
            .map_err(|_| ConnectorError::new(self.name.clone(), "query", ErrorKind::Timeout, "query deadline exceeded"))?
            .map_err(|e| ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e))?;

        let col_names: Vec<String> = result.col_specs.iter().map(|spec| spec.name.clone()).collect();
        let rows = result.rows.unwrap_or_default();
        let mut mapped = Vec::with_capacity(rows.len());
        for row in &rows {
            mapped.push(row_to_map(&col_names, row));
        }
        if query.limit > 0 {
            mapped.truncate(query.limit as usize);
        }

        Ok(QueryResult::new(self.name.clone(), mapped, start.elapsed()))
    }

    async fn execute(&self, command: Command) -> Result<CommandResult, ConnectorError> {
        let start = Instant::now();
        let Some(session) = &self.session else {
            return Ok(CommandResult::failed(self.name.clone(), "not connected"));
        };
        let params = extract_positional_params(&command.statement, &command.parameters);
        let cql_values: Vec<String> = params.iter().map(|v| v.to_string()).collect();
        let timeout = command.timeout.unwrap_or(self.timeout);

        let mut statement = CqlStatement::new(command.statement.clone());
        statement.set_consistency(self.consistency.to_scylla());

        match tokio::time::timeout(timeout, session.query_unpaged(statement, cql_values)).await {
            Err(_) => Err(ConnectorError::new(self.name.clone(), "execute", ErrorKind::Timeout, "execute deadline exceeded")),
            Ok(Err(e)) => Ok(CommandResult::failed(self.name.clone(), e.to_string())),
            Ok(Ok(_)) => Ok(CommandResult::ok(self.name.clone(), 1, start.elapsed(), String::new())),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Cassandra
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn capabilities(&self) -> Vec<&'static str> {
        vec!["query", "execute", "batch", "connection_pooling"]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_host_url_with_keyspace() {
        let parsed = parse_connection_url("scylla://host1:9042,host2:9042/my_keyspace").unwrap();
        assert_eq!(parsed.hosts, vec!["host1:9042".to_string(), "host2:9042".to_string()]);
        assert_eq!(parsed.keyspace, "my_keyspace");
    }

    #[test]
    fn rejects_url_missing_keyspace() {
        assert!(parse_connection_url("scylla://host1:9042").is_err());
    }

    #[test]
    fn rejects_url_with_empty_keyspace() {
        assert!(parse_connection_url("scylla://host1:9042/").is_err());
    }

    #[test]
    fn consistency_defaults_to_quorum() {
        assert_eq!(Consistency::default(), Consistency::Quorum);
    }

    #[test]
    fn consistency_parses_all_documented_variants() {
        for s in ["ANY", "ONE", "TWO", "THREE", "QUORUM", "ALL", "LOCAL_QUORUM", "EACH_QUORUM", "LOCAL_ONE"] {
            assert!(s.parse::<Consistency>().is_ok(), "{s} should parse");
        }
    }

    #[test]
    fn unrecognised_consistency_is_rejected() {
        assert!("BOGUS".parse::<Consistency>().is_err());
    }

    #[test]
    fn every_consistency_variant_maps_to_a_distinct_scylla_level() {
        let variants = [
            Consistency::Any,
            Consistency::One,
            Consistency::Two,
            Consistency::Three,
            Consistency::Quorum,
            Consistency::All,
            Consistency::LocalQuorum,
            Consistency::EachQuorum,
            Consistency::LocalOne,
        ];
        let mapped: Vec<ScyllaConsistency> = variants.iter().map(|c| c.to_scylla()).collect();
        for (i, a) in mapped.iter().enumerate() {
            for (j, b) in mapped.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "{:?} and {:?} mapped to the same scylla consistency", variants[i], variants[j]);
                }
            }
        }
    }

    #[test]
    fn cql_value_to_json_converts_text_and_null() {
        assert_eq!(cql_value_to_json(Some(&CqlValue::Text("hello".to_string()))), Value::String("hello".to_string()));
        assert_eq!(cql_value_to_json(None), Value::Null);
    }

    #[test]
    fn row_to_map_pairs_column_names_with_decoded_values() {
        let col_names = vec!["id".to_string(), "label".to_string()];
        let row = scylla::frame::response::result::Row {
            columns: vec![Some(CqlValue::BigInt(7)), Some(CqlValue::Text("widget".to_string()))],
        };
        let map = row_to_map(&col_names, &row);
        assert_eq!(map.get("id"), Some(&Value::from(7)));
        assert_eq!(map.get("label"), Some(&Value::String("widget".to_string())));
    }
}
