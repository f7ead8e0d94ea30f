//! HTTP/REST connector (spec §4.3 "HTTP / REST"). `query` always issues a
//! GET with parameters encoded into the query string; `execute` reads the
//! HTTP verb from `action` and sends parameters as a JSON body.

use std::any::Any;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;

use super::config::{ConnectorConfig, ConnectorType};
use super::{Command, CommandResult, Connector, HealthStatus, Query, QueryResult};
use crate::error::{ConnectorError, ErrorKind};

/// Authentication modes supported by the HTTP connector (spec §4.3).
#[derive(Debug, Clone)]
pub enum AuthMode {
    None,
    Bearer(String),
    Basic { username: String, password: String },
    ApiKey { header_name: String, value: String },
}

pub struct HttpConnector {
    name: String,
    base_url: String,
    auth: AuthMode,
    default_headers: HashMap<String, String>,
    timeout: Duration,
    client: Option<Client>,
}

impl HttpConnector {
    pub fn new(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let base_url = config.connection_url.clone().ok_or_else(|| {
            ConnectorError::new(config.name.clone(), "new", ErrorKind::Configuration, "http connector requires base_url (connection_url)")
        })?;

        let auth_mode = config.options.get("auth_mode").and_then(Value::as_str).unwrap_or("none");
        let auth = match auth_mode {
            "bearer" => AuthMode::Bearer(config.credentials.get("token").cloned().unwrap_or_default()),
            "basic" => AuthMode::Basic {
                username: config.credentials.get("username").cloned().unwrap_or_default(),
                password: config.credentials.get("password").cloned().unwrap_or_default(),
            },
            "api-key" | "api_key" => AuthMode::ApiKey {
                header_name: config.options.get("api_key_header").and_then(Value::as_str).unwrap_or("X-API-Key").to_string(),
                value: config.credentials.get("api_key").cloned().unwrap_or_default(),
            },
            _ => AuthMode::None,
        };

        let default_headers = config
            .options
            .get("headers")
            .and_then(Value::as_object)
            .map(|obj| obj.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
            .unwrap_or_default();

        Ok(Self {
            name: config.name.clone(),
            base_url,
            auth,
            default_headers,
            timeout: config.timeout,
            client: None,
        })
    }

    fn client(&self) -> Result<&Client, ConnectorError> {
        self.client.as_ref().ok_or_else(|| {
            ConnectorError::new(self.name.clone(), "client", ErrorKind::Connectivity, "connector is not connected")
        })
    }

    fn apply_auth(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder = match &self.auth {
            AuthMode::None => builder,
            AuthMode::Bearer(token) => builder.bearer_auth(token),
            AuthMode::Basic { username, password } => builder.basic_auth(username, Some(password)),
            AuthMode::ApiKey { header_name, value } => builder.header(header_name, value),
        };
        for (k, v) in &self.default_headers {
            builder = builder.header(k, v);
        }
        builder
    }
}

/// Map a response body into the uniform row shape: JSON arrays become
/// one-row-per-element, JSON objects become a one-row result, and non-JSON
/// bodies become `{"response": "<text>"}` (spec §4.3).
fn response_to_rows(body: &str) -> Vec<HashMap<String, Value>> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => map.into_iter().collect(),
                other => {
                    let mut row = HashMap::new();
                    row.insert("value".to_string(), other);
                    row
                }
            })
            .collect(),
        Ok(Value::Object(map)) => vec![map.into_iter().collect()],
        Ok(other) => {
            let mut row = HashMap::new();
            row.insert("value".to_string(), other);
            vec![row]
        }
        Err(_) => {
            let mut row = HashMap::new();
            row.insert("response".to_string(), Value::String(body.to_string()));
            vec![row]
        }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        let client = Client::builder().timeout(self.timeout).build().map_err(|e| {
            ConnectorError::new(self.name.clone(), "connect", ErrorKind::Configuration, e.to_string()).with_cause(e)
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
        let Ok(client) = self.client() else {
            return HealthStatus::unhealthy("not connected");
        };
        let request = self.apply_auth(client.get(&self.base_url));
        match tokio::time::timeout(Duration::from_secs(5), request.send()).await {
            Ok(Ok(response)) if response.status().is_success() || response.status().is_client_error() => HealthStatus::healthy(start.elapsed()),
            Ok(Ok(response)) => HealthStatus::unhealthy(format!("unexpected status {}", response.status())),
            Ok(Err(e)) => HealthStatus::unhealthy(e.to_string()),
            Err(_) => HealthStatus::unhealthy("health check deadline exceeded"),
        }
    }

    async fn query(&self, query: Query) -> Result<QueryResult, ConnectorError> {
        let start = Instant::now();
        let client = self.client()?;
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), query.statement);
        let query_pairs: Vec<(String, String)> = query
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
            .collect();

        let timeout = query.timeout.unwrap_or(self.timeout);
        let request = self.apply_auth(client.get(&url).query(&query_pairs)).timeout(timeout);
        let response = request.send().await.map_err(|e| {
            ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::new(
                self.name.clone(),
                "query",
                ErrorKind::Connectivity,
                format!("unexpected status {status}"),
            ));
        }

        let body = response.text().await.map_err(|e| {
            ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
        })?;
        let mut rows = response_to_rows(&body);
        if query.limit > 0 {
            rows.truncate(query.limit as usize);
        }

        Ok(QueryResult::new(self.name.clone(), rows, start.elapsed()))
    }

    async fn execute(&self, command: Command) -> Result<CommandResult, ConnectorError> {
        let start = Instant::now();
        let client = self.client()?;
        let method = Method::from_bytes(command.action.to_uppercase().as_bytes()).unwrap_or(Method::POST);
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), command.statement);

        let timeout = command.timeout.unwrap_or(self.timeout);
        let mut builder = self.apply_auth(client.request(method, &url)).timeout(timeout);
        if !command.parameters.is_empty() {
            builder = builder.json(&command.parameters);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => return Ok(CommandResult::failed(self.name.clone(), e.to_string())),
        };
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(CommandResult::ok(self.name.clone(), 1, start.elapsed(), body))
        } else {
            Ok(CommandResult::failed(self.name.clone(), format!("status {status}: {body}")))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Http
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn capabilities(&self) -> Vec<&'static str> {
        vec!["query", "execute"]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
