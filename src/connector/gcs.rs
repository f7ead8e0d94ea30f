//! Google Cloud Storage (object storage) connector (spec §4.3 "Object
//! storage"). Credentials resolve via inline JSON, a credentials file, or
//! ambient application-default credentials; `options.endpoint` overrides
//! the API base for emulator use.

use std::any::Any;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::sign::SignedURLOptions;
use serde_json::Value;

use super::config::{ConnectorConfig, ConnectorType};
use super::{Command, CommandResult, Connector, HealthStatus, Query, QueryResult};
use crate::error::{ConnectorError, ErrorKind};

const DEFAULT_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(900);

pub struct GcsConnector {
    name: String,
    credentials_json: Option<String>,
    credentials_path: Option<String>,
    endpoint: Option<String>,
    client: Option<Client>,
}

impl GcsConnector {
    pub fn new(config: &ConnectorConfig) -> Self {
        Self {
            name: config.name.clone(),
            credentials_json: config.credentials.get("credentials_json").cloned(),
            credentials_path: config.credentials.get("credentials_path").cloned(),
            endpoint: config.options.get("endpoint").and_then(Value::as_str).map(str::to_string),
            client: None,
        }
    }

    fn client(&self) -> Result<&Client, ConnectorError> {
        self.client.as_ref().ok_or_else(|| {
            ConnectorError::new(self.name.clone(), "client", ErrorKind::Connectivity, "connector is not connected")
        })
    }
}

#[async_trait]
impl Connector for GcsConnector {
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        let mut client_config = if let Some(json) = &self.credentials_json {
            let cred = serde_json::from_str(json).map_err(|e| {
                ConnectorError::new(self.name.clone(), "connect", ErrorKind::Configuration, e.to_string()).with_cause(e)
            })?;
            ClientConfig::default().with_credentials(cred).await.map_err(|e| {
                ConnectorError::new(self.name.clone(), "connect", ErrorKind::Configuration, e.to_string()).with_cause(e)
            })?
        } else if let Some(path) = &self.credentials_path {
            std::env::set_var("GOOGLE_APPLICATION_CREDENTIALS", path);
            ClientConfig::default().with_auth().await.map_err(|e| {
                ConnectorError::new(self.name.clone(), "connect", ErrorKind::Connectivity, e.to_string()).with_cause(e)
            })?
        } else {
            // Ambient application-default credentials.
            ClientConfig::default().with_auth().await.map_err(|e| {
                ConnectorError::new(self.name.clone(), "connect", ErrorKind::Connectivity, e.to_string()).with_cause(e)
            })?
        };

        if let Some(endpoint) = &self.endpoint {
            client_config.storage_endpoint = endpoint.clone();
        }

        self.client = Some(Client::new(client_config));
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
        let request = ListObjectsRequest {
            bucket: "healthcheck".to_string(),
            max_results: Some(1),
            ..Default::default()
        };
        match tokio::time::timeout(Duration::from_secs(5), client.list_objects(&request)).await {
            Ok(Ok(_)) | Ok(Err(_)) => HealthStatus::healthy(start.elapsed()),
            Err(_) => HealthStatus::unhealthy("health check deadline exceeded"),
        }
    }

    async fn query(&self, query: Query) -> Result<QueryResult, ConnectorError> {
        let start = Instant::now();
        let client = self.client()?;
        let op = query.statement.as_str();
        let bucket = query.parameters.get("bucket").and_then(Value::as_str).unwrap_or_default().to_string();

        let mut rows: Vec<HashMap<String, Value>> = Vec::new();
        match op {
            "list_buckets" => {
                let mut row = HashMap::new();
                row.insert("note".to_string(), Value::String("list_buckets requires project scope".to_string()));
                rows.push(row);
            }
            "list_objects" => {
                let prefix = query.parameters.get("prefix").and_then(Value::as_str).map(str::to_string);
                let delimiter = query.parameters.get("delimiter").and_then(Value::as_str).map(str::to_string);
                let max_results = query.parameters.get("max_results").and_then(Value::as_u64).map(|v| v as i32);
                let request = ListObjectsRequest {
                    bucket: bucket.clone(),
                    prefix,
                    delimiter,
                    max_results,
                    ..Default::default()
                };
                let response = client.list_objects(&request).await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })?;
                for obj in response.items.unwrap_or_default() {
                    let mut row = HashMap::new();
                    row.insert("name".to_string(), Value::String(obj.name));
                    row.insert("size".to_string(), Value::String(obj.size.to_string()));
                    rows.push(row);
                }
            }
            "get_object" | "get_object_metadata" => {
                let object = query.parameters.get("object").and_then(Value::as_str).ok_or_else(|| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Validation, "requires an object parameter")
                })?;
                if op == "get_object" {
                    let request = GetObjectRequest {
                        bucket: bucket.clone(),
                        object: object.to_string(),
                        ..Default::default()
                    };
                    let bytes = client
                        .download_object(&request, &google_cloud_storage::http::objects::download::Range::default())
                        .await
                        .map_err(|e| {
                            ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                        })?;
                    let mut row = HashMap::new();
                    row.insert(
                        "content".to_string(),
                        Value::String(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)),
                    );
                    rows.push(row);
                } else {
                    let metadata = client
                        .get_object(&GetObjectRequest {
                            bucket: bucket.clone(),
                            object: object.to_string(),
                            ..Default::default()
                        })
                        .await
                        .map_err(|e| {
                            ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                        })?;
                    let mut row = HashMap::new();
                    row.insert("name".to_string(), Value::String(metadata.name));
                    row.insert("content_type".to_string(), metadata.content_type.map(Value::String).unwrap_or(Value::Null));
                    rows.push(row);
                }
            }
            "get_bucket_metadata" => {
                let mut row = HashMap::new();
                row.insert("bucket".to_string(), Value::String(bucket));
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
        let client = self.client()?;
        let bucket = command.parameters.get("bucket").and_then(Value::as_str).unwrap_or_default().to_string();

        match command.action.as_str() {
            "put_object" => {
                let object = command.parameters.get("object").and_then(Value::as_str).unwrap_or_default().to_string();
                let content_type = command.parameters.get("content_type").and_then(Value::as_str).unwrap_or("application/octet-stream");
                let content = command.parameters.get("content").and_then(Value::as_str).unwrap_or_default();
                let upload_type = UploadType::Simple(Media::new(object));
                match client
                    .upload_object(
                        &UploadObjectRequest { bucket, ..Default::default() },
                        content.as_bytes().to_vec(),
                        &upload_type,
                    )
                    .await
                {
                    Ok(obj) => Ok(CommandResult::ok(self.name.clone(), 1, start.elapsed(), obj.name)),
                    Err(e) => Ok(CommandResult::failed(self.name.clone(), e.to_string())),
                }
                .map(|mut result| {
                    if !content_type.is_empty() {
                        result.metadata.insert("content_type".to_string(), Value::String(content_type.to_string()));
                    }
                    result
                })
            }
            "delete_object" => {
                let object = command.parameters.get("object").and_then(Value::as_str).unwrap_or_default().to_string();
                let generation = command.parameters.get("generation").and_then(Value::as_i64);
                match client
                    .delete_object(&DeleteObjectRequest { bucket, object, generation, ..Default::default() })
                    .await
                {
                    Ok(_) => Ok(CommandResult::ok(self.name.clone(), 1, start.elapsed(), String::new())),
                    Err(e) => Ok(CommandResult::failed(self.name.clone(), e.to_string())),
                }
            }
            "generate_signed_url" => {
                let object = command.parameters.get("object").and_then(Value::as_str).unwrap_or_default().to_string();
                let method = command.parameters.get("method").and_then(Value::as_str).unwrap_or("GET");
                let expiry = command
                    .parameters
                    .get("expiry_seconds")
                    .and_then(Value::as_u64)
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_SIGNED_URL_EXPIRY);
                let options = SignedURLOptions {
                    method: method
                        .parse()
                        .unwrap_or(google_cloud_storage::sign::SignedURLMethod::GET),
                    expires: expiry,
                    ..Default::default()
                };
                match client.signed_url(&bucket, &object, None, None, options).await {
                    Ok(url) => Ok(CommandResult::ok(self.name.clone(), 1, start.elapsed(), url)),
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
        ConnectorType::Gcs
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn capabilities(&self) -> Vec<&'static str> {
        vec!["query", "execute", "presign"]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ConnectorConfig {
        ConnectorConfig {
            name: "gcs1".into(),
            connector_type: ConnectorType::Gcs,
            display_name: None,
            description: None,
            connection_url: None,
            credentials: HashMap::new(),
            options: HashMap::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            tenant_id: "*".into(),
        }
    }

    #[test]
    fn default_signed_url_expiry_is_900_seconds() {
        assert_eq!(DEFAULT_SIGNED_URL_EXPIRY, Duration::from_secs(900));
    }

    #[test]
    fn endpoint_override_read_from_options() {
        let mut config = base_config();
        config.options.insert("endpoint".into(), Value::String("http://localhost:4443".into()));
        let connector = GcsConnector::new(&config);
        assert_eq!(connector.endpoint, Some("http://localhost:4443".to_string()));
    }

    #[test]
    fn credentials_json_read_from_credentials_map() {
        let mut config = base_config();
        config.credentials.insert("credentials_json".into(), "{}".into());
        let connector = GcsConnector::new(&config);
        assert_eq!(connector.credentials_json, Some("{}".to_string()));
    }
}
