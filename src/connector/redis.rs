//! Redis (key-value) connector (spec §4.3 "Key-value").
//!
//! `KEYS` is never issued when a limit is supplied — an incremental `SCAN`
//! is used instead, since unbounded `KEYS` on a large keyspace blocks the
//! server. Missing mandatory parameters fail with `success=false`, not a
//! `ConnectorError` (spec is explicit about this being connector-specific
//! behaviour for Redis).

use std::any::Any;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;

use super::config::{ConnectorConfig, ConnectorType};
use super::{Command, CommandResult, Connector, HealthStatus, Query, QueryResult};
use crate::error::{ConnectorError, ErrorKind};

/// Parse a TTL from an int/float-seconds value or a duration string
/// (`"30s"`, `"5m"`, `"1h"`) — spec §4.3 "TTL parsed from multiple numeric
/// representations".
pub fn parse_ttl(value: &Value) -> Option<Duration> {
    match value {
        Value::Number(n) => n.as_f64().map(Duration::from_secs_f64),
        Value::String(s) => parse_duration_string(s),
        _ => None,
    }
}

fn parse_duration_string(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, suffix) = s.split_at(s.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(s.len()));
    let n: f64 = digits.parse().ok()?;
    match suffix {
        "" | "s" => Some(Duration::from_secs_f64(n)),
        "ms" => Some(Duration::from_secs_f64(n / 1000.0)),
        "m" => Some(Duration::from_secs_f64(n * 60.0)),
        "h" => Some(Duration::from_secs_f64(n * 3600.0)),
        _ => None,
    }
}

pub struct RedisConnector {
    name: String,
    connection_url: String,
    client: Option<redis::Client>,
}

impl RedisConnector {
    pub fn new(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let connection_url = config.connection_url.clone().ok_or_else(|| {
            ConnectorError::new(config.name.clone(), "new", ErrorKind::Configuration, "redis connector requires connection_url")
        })?;
        Ok(Self {
            name: config.name.clone(),
            connection_url,
            client: None,
        })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, ConnectorError> {
        let client = self.client.as_ref().ok_or_else(|| {
            ConnectorError::new(self.name.clone(), "conn", ErrorKind::Connectivity, "connector is not connected")
        })?;
        client.get_multiplexed_async_connection().await.map_err(|e| {
            ConnectorError::new(self.name.clone(), "conn", ErrorKind::Connectivity, e.to_string()).with_cause(e)
        })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        let client = redis::Client::open(self.connection_url.as_str()).map_err(|e| {
            ConnectorError::new(self.name.clone(), "connect", ErrorKind::Configuration, e.to_string()).with_cause(e)
        })?;
        // Fail fast on bad credentials/host rather than deferring to the first op.
        client.get_multiplexed_async_connection().await.map_err(|e| {
            ConnectorError::new(self.name.clone(), "connect", ErrorKind::Connectivity, e.to_string()).with_cause(e)
        })?;
        self.client = Some(client);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        self.client = None;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        let start = Instant::now();
        let mut conn = match self.conn().await {
            Ok(c) => c,
            Err(e) => return HealthStatus::unhealthy(e.message),
        };
        match tokio::time::timeout(Duration::from_secs(5), redis::cmd("PING").query_async::<String>(&mut conn)).await {
            Ok(Ok(_)) => HealthStatus::healthy(start.elapsed()),
            Ok(Err(e)) => HealthStatus::unhealthy(e.to_string()),
            Err(_) => HealthStatus::unhealthy("health check deadline exceeded"),
        }
    }

    async fn query(&self, query: Query) -> Result<QueryResult, ConnectorError> {
        let start = Instant::now();
        let mut conn = self.conn().await?;
        let op = query.statement.to_uppercase();

        let mut rows: Vec<HashMap<String, Value>> = Vec::new();
        match op.as_str() {
            "GET" => {
                let key = query.parameters.get("key").and_then(Value::as_str).ok_or_else(|| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Validation, "GET requires a key parameter")
                })?;
                let value: Option<String> = conn.get(key).await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })?;
                let mut row = HashMap::new();
                row.insert("key".to_string(), Value::String(key.to_string()));
                row.insert("value".to_string(), value.map(Value::String).unwrap_or(Value::Null));
                rows.push(row);
            }
            "EXISTS" => {
                let key = query.parameters.get("key").and_then(Value::as_str).ok_or_else(|| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Validation, "EXISTS requires a key parameter")
                })?;
                let exists: bool = conn.exists(key).await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })?;
                let mut row = HashMap::new();
                row.insert("key".to_string(), Value::String(key.to_string()));
                row.insert("exists".to_string(), Value::Bool(exists));
                rows.push(row);
            }
            "TTL" => {
                let key = query.parameters.get("key").and_then(Value::as_str).ok_or_else(|| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Validation, "TTL requires a key parameter")
                })?;
                let ttl: i64 = conn.ttl(key).await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })?;
                let mut row = HashMap::new();
                row.insert("key".to_string(), Value::String(key.to_string()));
                row.insert("ttl".to_string(), Value::from(ttl));
                rows.push(row);
            }
            "KEYS" => {
                let pattern = query.parameters.get("pattern").and_then(Value::as_str).unwrap_or("*").to_string();
                let limit = query.parameters.get("limit").and_then(Value::as_u64);
                let keys = scan_keys(&mut conn, &pattern, limit).await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })?;
                for key in keys {
                    let mut row = HashMap::new();
                    row.insert("key".to_string(), Value::String(key));
                    rows.push(row);
                }
            }
            "STATS" => {
                let info: String = redis::cmd("INFO").query_async(&mut conn).await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })?;
                let mut row = HashMap::new();
                row.insert("info".to_string(), Value::String(info));
                rows.push(row);
            }
            other => {
                return Err(ConnectorError::new(self.name.clone(), "query", ErrorKind::Validation, format!("unsupported read op `{other}`")));
            }
        }

        if query.limit > 0 {
            rows.truncate(query.limit as usize);
        }
        Ok(QueryResult::new(self.name.clone(), rows, start.elapsed()))
    }

    async fn execute(&self, command: Command) -> Result<CommandResult, ConnectorError> {
        let start = Instant::now();
        let mut conn = match self.conn().await {
            Ok(c) => c,
            Err(e) => return Ok(CommandResult::failed(self.name.clone(), e.message)),
        };
        let op = command.action.to_uppercase();

        match op.as_str() {
            "SET" => {
                let Some(key) = command.parameters.get("key").and_then(Value::as_str) else {
                    return Ok(CommandResult::failed(self.name.clone(), "missing required parameter: key"));
                };
                let Some(value) = command.parameters.get("value") else {
                    return Ok(CommandResult::failed(self.name.clone(), "missing required parameter: value"));
                };
                let value_str = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let ttl = command.parameters.get("ttl").and_then(parse_ttl);
                let result = match ttl {
                    Some(duration) => conn.set_ex::<_, _, ()>(key, value_str, duration.as_secs().max(1)).await,
                    None => conn.set::<_, _, ()>(key, value_str).await,
                };
                match result {
                    Ok(_) => Ok(CommandResult::ok(self.name.clone(), 1, start.elapsed(), String::new())),
                    Err(e) => Ok(CommandResult::failed(self.name.clone(), e.to_string())),
                }
            }
            "DELETE" | "DEL" => {
                let Some(key) = command.parameters.get("key").and_then(Value::as_str) else {
                    return Ok(CommandResult::failed(self.name.clone(), "missing required parameter: key"));
                };
                match conn.del::<_, u64>(key).await {
                    Ok(n) => Ok(CommandResult::ok(self.name.clone(), n, start.elapsed(), String::new())),
                    Err(e) => Ok(CommandResult::failed(self.name.clone(), e.to_string())),
                }
            }
            "EXPIRE" => {
                let Some(key) = command.parameters.get("key").and_then(Value::as_str) else {
                    return Ok(CommandResult::failed(self.name.clone(), "missing required parameter: key"));
                };
                let Some(ttl) = command.parameters.get("ttl").and_then(parse_ttl) else {
                    return Ok(CommandResult::failed(self.name.clone(), "missing required parameter: ttl"));
                };
                match conn.expire::<_, bool>(key, ttl.as_secs() as i64).await {
                    Ok(applied) => Ok(CommandResult::ok(self.name.clone(), applied as u64, start.elapsed(), String::new())),
                    Err(e) => Ok(CommandResult::failed(self.name.clone(), e.to_string())),
                }
            }
            other => Ok(CommandResult::failed(self.name.clone(), format!("unsupported write action `{other}`"))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Redis
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn capabilities(&self) -> Vec<&'static str> {
        vec!["query", "execute", "ttl"]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

async fn scan_keys(
    conn: &mut redis::aio::MultiplexedConnection,
    pattern: &str,
    limit: Option<u64>,
) -> redis::RedisResult<Vec<String>> {
    let mut iter: redis::AsyncIter<String> = conn.scan_match(pattern).await?;
    let mut keys = Vec::new();
    while let Some(key) = futures_util::StreamExt::next(&mut iter).await {
        keys.push(key);
        if let Some(limit) = limit {
            if keys.len() as u64 >= limit {
                break;
            }
        }
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ttl_from_integer_seconds() {
        assert_eq!(parse_ttl(&Value::from(30)), Some(Duration::from_secs(30)));
    }

    #[test]
    fn parse_ttl_from_float_seconds() {
        assert_eq!(parse_ttl(&Value::from(1.5)), Some(Duration::from_secs_f64(1.5)));
    }

    #[test]
    fn parse_ttl_from_duration_string_minutes() {
        assert_eq!(parse_ttl(&Value::String("5m".into())), Some(Duration::from_secs(300)));
    }

    #[test]
    fn parse_ttl_from_duration_string_hours() {
        assert_eq!(parse_ttl(&Value::String("1h".into())), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn parse_ttl_rejects_unknown_suffix() {
        assert_eq!(parse_ttl(&Value::String("5x".into())), None);
    }

    #[test]
    fn new_requires_connection_url() {
        let mut config = ConnectorConfig {
            name: "r1".into(),
            connector_type: ConnectorType::Redis,
            display_name: None,
            description: None,
            connection_url: None,
            credentials: HashMap::new(),
            options: HashMap::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            tenant_id: "*".into(),
        };
        assert!(RedisConnector::new(&config).is_err());
        config.connection_url = Some("redis://localhost".into());
        assert!(RedisConnector::new(&config).is_ok());
    }
}
