//! MongoDB (document) connector (spec §4.3 "Document").
//!
//! `parse_statement` splits `operation:collection`; `$oid`/`$date` sentinel
//! subdocuments are converted to native BSON types on input and back to
//! their string/RFC3339 forms on output. Retry-writes and retry-reads are
//! enabled by default (mongodb driver default, left untouched).

use std::any::Any;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::Client;
use serde_json::Value;

use super::config::{ConnectorConfig, ConnectorType};
use super::{Command, CommandResult, Connector, HealthStatus, Query, QueryResult};
use crate::error::{ConnectorError, ErrorKind};

const READ_OPS: &[&str] = &["find", "findone", "aggregate", "count", "distinct"];
const WRITE_OPS: &[&str] = &[
    "insert", "insertone", "insertmany", "update", "updateone", "updatemany", "delete", "deleteone", "deletemany",
    "replace", "replaceone",
];

/// Split `operation:collection` (spec §4.3 "Document"). Case-insensitive on
/// the operation, collection name kept verbatim.
pub fn parse_statement(statement: &str) -> Result<(String, String), ConnectorError> {
    let (op, collection) = statement.split_once(':').ok_or_else(|| {
        ConnectorError::new("mongodb", "parse_statement", ErrorKind::Validation, "statement must be `operation:collection`")
    })?;
    if collection.is_empty() {
        return Err(ConnectorError::new("mongodb", "parse_statement", ErrorKind::Validation, "collection name is required"));
    }
    Ok((op.to_lowercase(), collection.to_string()))
}

fn is_read_op(op: &str) -> bool {
    READ_OPS.contains(&op)
}

fn is_write_op(op: &str) -> bool {
    WRITE_OPS.contains(&op)
}

/// Convert a `serde_json::Value` into BSON, converting `$oid`/`$date`
/// sentinel subdocuments into native `ObjectId`/`DateTime` values.
pub fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(hex)) = map.get("$oid") {
                    if let Ok(oid) = mongodb::bson::oid::ObjectId::parse_str(hex) {
                        return Bson::ObjectId(oid);
                    }
                }
                if let Some(Value::String(rfc3339)) = map.get("$date") {
                    if let Ok(dt) = DateTime::parse_from_rfc3339(rfc3339) {
                        return Bson::DateTime(mongodb::bson::DateTime::from_chrono(dt.with_timezone(&Utc)));
                    }
                }
            }
            let mut doc = Document::new();
            for (k, v) in map {
                doc.insert(k.clone(), json_to_bson(v));
            }
            Bson::Document(doc)
        }
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::String(s) => Bson::String(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else {
                Bson::Double(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Null => Bson::Null,
    }
}

/// Convert BSON back into JSON, emitting `ObjectId`s as hex strings and
/// `DateTime`s as RFC3339 strings (spec §4.3).
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(dt.to_chrono().to_rfc3339()),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => Value::from(*f),
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Null => Value::Null,
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => {
            Value::Object(doc.iter().map(|(k, v)| (k.clone(), bson_to_json(v))).collect())
        }
        other => Value::String(other.to_string()),
    }
}

pub struct MongodbConnector {
    name: String,
    uri: String,
    database_name: String,
    client: Option<Client>,
}

impl MongodbConnector {
    pub fn new(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let uri = config.connection_url.clone().ok_or_else(|| {
            ConnectorError::new(config.name.clone(), "new", ErrorKind::Configuration, "mongodb connector requires connection_url")
        })?;
        let database_name = config
            .options
            .get("database")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ConnectorError::new(config.name.clone(), "new", ErrorKind::Configuration, "mongodb connector requires options.database")
            })?;

        Ok(Self {
            name: config.name.clone(),
            uri,
            database_name,
            client: None,
        })
    }

    fn database(&self) -> Result<mongodb::Database, ConnectorError> {
        let client = self.client.as_ref().ok_or_else(|| {
            ConnectorError::new(self.name.clone(), "database", ErrorKind::Connectivity, "connector is not connected")
        })?;
        Ok(client.database(&self.database_name))
    }
}

#[async_trait]
impl Connector for MongodbConnector {
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        let mut options = ClientOptions::parse(&self.uri).await.map_err(|e| {
            ConnectorError::new(self.name.clone(), "connect", ErrorKind::Configuration, e.to_string()).with_cause(e)
        })?;
        options.retry_writes = Some(true);
        options.retry_reads = Some(true);

        let client = Client::with_options(options).map_err(|e| {
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
        let Some(client) = &self.client else {
            return HealthStatus::unhealthy("not connected");
        };
        let ping = client.database(&self.database_name).run_command(doc! { "ping": 1 });
        match tokio::time::timeout(Duration::from_secs(5), ping).await {
            Ok(Ok(_)) => HealthStatus::healthy(start.elapsed()),
            Ok(Err(e)) => HealthStatus::unhealthy(e.to_string()),
            Err(_) => HealthStatus::unhealthy("health check deadline exceeded"),
        }
    }

    async fn query(&self, query: Query) -> Result<QueryResult, ConnectorError> {
        let start = Instant::now();
        let (op, collection_name) = parse_statement(&query.statement)?;
        if !is_read_op(&op) {
            return Err(ConnectorError::new(self.name.clone(), "query", ErrorKind::Validation, format!("`{op}` is not a read operation")));
        }
        let db = self.database()?;
        let collection = db.collection::<Document>(&collection_name);

        let filter_json = query.parameters.get("filter").cloned().unwrap_or(Value::Object(Default::default()));
        let filter = json_to_bson(&filter_json).as_document().cloned().unwrap_or_default();

        let rows = match op.as_str() {
            "aggregate" => {
                let pipeline_value = query.parameters.get("pipeline").ok_or_else(|| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Validation, "aggregate requires a pipeline parameter")
                })?;
                let stages: Vec<Document> = match pipeline_value {
                    Value::Array(items) => items.iter().filter_map(|v| json_to_bson(v).as_document().cloned()).collect(),
                    Value::String(s) => {
                        let parsed: Vec<Value> = serde_json::from_str(s).map_err(|e| {
                            ConnectorError::new(self.name.clone(), "query", ErrorKind::Validation, e.to_string())
                        })?;
                        parsed.iter().filter_map(|v| json_to_bson(v).as_document().cloned()).collect()
                    }
                    _ => return Err(ConnectorError::new(self.name.clone(), "query", ErrorKind::Validation, "pipeline must be an array or JSON array string")),
                };
                use futures_util::TryStreamExt;
                let mut cursor = collection.aggregate(stages).await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })?;
                let mut docs = Vec::new();
                while let Some(doc) = cursor.try_next().await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })? {
                    docs.push(doc);
                }
                docs
            }
            "findone" => {
                let found = collection.find_one(filter).await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })?;
                found.into_iter().collect()
            }
            "count" => {
                let count = collection.count_documents(filter).await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })?;
                vec![doc! { "count": count as i64 }]
            }
            "distinct" => {
                let field = query.parameters.get("field").and_then(Value::as_str).ok_or_else(|| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Validation, "distinct requires a field parameter")
                })?;
                let values = collection.distinct(field, filter).await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })?;
                values.into_iter().map(|v| doc! { field: v }).collect()
            }
            _ => {
                use futures_util::TryStreamExt;
                let mut cursor = collection.find(filter).await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })?;
                let mut docs = Vec::new();
                while let Some(doc) = cursor.try_next().await.map_err(|e| {
                    ConnectorError::new(self.name.clone(), "query", ErrorKind::Connectivity, e.to_string()).with_cause(e)
                })? {
                    docs.push(doc);
                }
                docs
            }
        };

        let mut mapped: Vec<HashMap<String, Value>> = rows
            .into_iter()
            .map(|doc| doc.into_iter().map(|(k, v)| (k, bson_to_json(&v))).collect())
            .collect();
        if query.limit > 0 {
            mapped.truncate(query.limit as usize);
        }

        Ok(QueryResult::new(self.name.clone(), mapped, start.elapsed()))
    }

    async fn execute(&self, command: Command) -> Result<CommandResult, ConnectorError> {
        let start = Instant::now();
        let (op, collection_name) = parse_statement(&command.statement)?;
        if !is_write_op(&op) {
            return Ok(CommandResult::failed(self.name.clone(), format!("`{op}` is not a write operation")));
        }
        let db = self.database()?;
        let collection = db.collection::<Document>(&collection_name);

        let doc_param = |key: &str| -> Document {
            command
                .parameters
                .get(key)
                .map(|v| json_to_bson(v).as_document().cloned().unwrap_or_default())
                .unwrap_or_default()
        };

        let outcome = match op.as_str() {
            "insert" | "insertone" => collection
                .insert_one(doc_param("document"))
                .await
                .map(|_| 1u64)
                .map_err(|e| e.to_string()),
            "insertmany" => {
                let docs: Vec<Document> = command
                    .parameters
                    .get("documents")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(|v| json_to_bson(v).as_document().cloned()).collect())
                    .unwrap_or_default();
                let n = docs.len() as u64;
                collection.insert_many(docs).await.map(|_| n).map_err(|e| e.to_string())
            }
            "update" | "updateone" => collection
                .update_one(doc_param("filter"), doc_param("update"))
                .await
                .map(|r| r.modified_count)
                .map_err(|e| e.to_string()),
            "updatemany" => collection
                .update_many(doc_param("filter"), doc_param("update"))
                .await
                .map(|r| r.modified_count)
                .map_err(|e| e.to_string()),
            "delete" | "deleteone" => collection
                .delete_one(doc_param("filter"))
                .await
                .map(|r| r.deleted_count)
                .map_err(|e| e.to_string()),
            "deletemany" => collection
                .delete_many(doc_param("filter"))
                .await
                .map(|r| r.deleted_count)
                .map_err(|e| e.to_string()),
            "replace" | "replaceone" => collection
                .replace_one(doc_param("filter"), doc_param("replacement"))
                .await
                .map(|r| r.modified_count)
                .map_err(|e| e.to_string()),
            _ => Err(format!("unsupported write operation `{op}`")),
        };

        match outcome {
            Ok(affected) => Ok(CommandResult::ok(self.name.clone(), affected, start.elapsed(), String::new())),
            Err(message) => Ok(CommandResult::failed(self.name.clone(), message)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Mongodb
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn capabilities(&self) -> Vec<&'static str> {
        vec!["query", "execute", "aggregation", "connection_pooling"]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_statement_splits_operation_and_collection() {
        let (op, collection) = parse_statement("find:users").unwrap();
        assert_eq!(op, "find");
        assert_eq!(collection, "users");
    }

    #[test]
    fn parse_statement_lowercases_operation() {
        let (op, _) = parse_statement("FindOne:users").unwrap();
        assert_eq!(op, "findone");
    }

    #[test]
    fn parse_statement_rejects_missing_collection() {
        assert!(parse_statement("find:").is_err());
    }

    #[test]
    fn parse_statement_rejects_missing_colon() {
        assert!(parse_statement("find").is_err());
    }

    #[test]
    fn json_to_bson_converts_oid_sentinel() {
        let value = serde_json::json!({ "$oid": "507f1f77bcf86cd799439011" });
        let bson = json_to_bson(&value);
        assert!(matches!(bson, Bson::ObjectId(_)));
    }

    #[test]
    fn json_to_bson_converts_date_sentinel() {
        let value = serde_json::json!({ "$date": "2024-01-15T10:30:00Z" });
        let bson = json_to_bson(&value);
        assert!(matches!(bson, Bson::DateTime(_)));
    }

    #[test]
    fn bson_to_json_emits_object_id_as_hex_string() {
        let oid = mongodb::bson::oid::ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let json = bson_to_json(&Bson::ObjectId(oid));
        assert_eq!(json, Value::String("507f1f77bcf86cd799439011".to_string()));
    }

    #[test]
    fn read_ops_recognised() {
        for op in READ_OPS {
            assert!(is_read_op(op));
        }
        assert!(!is_read_op("insert"));
    }

    #[test]
    fn write_ops_recognised() {
        for op in WRITE_OPS {
            assert!(is_write_op(op));
        }
        assert!(!is_write_op("find"));
    }
}
