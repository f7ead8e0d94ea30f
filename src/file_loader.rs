//! Declarative file loader (spec §4.5). Reads a TOML document of
//! `connectors` and `llm_providers` keyed maps, interpolates environment
//! variables into the raw text before parsing, validates it against the
//! recognised backend/provider vocabularies, and applies tenant filtering
//! and post-parse defaults the same way the gateway's own `Config::load`
//! reads and defaults its `toml` document.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::connector::config::{ConnectorConfig, ConnectorType};
use crate::error::{ConnectorError, ErrorKind};
use crate::llm::{LLMProviderConfig, LLMProviderName};

/// The recognised `type` vocabulary for connector entries in the file
/// format — narrower than the full [`ConnectorType`] enum; this is the
/// literal set spec §4.5 names, retained even though the connector
/// contract itself (§4.2/§4.3) recognises more backend kinds. See
/// DESIGN.md.
const RECOGNISED_CONNECTOR_TYPES: &[&str] = &["postgres", "cassandra", "salesforce", "amadeus", "slack", "snowflake", "custom"];

pub const EXAMPLE_DOCUMENT: &str = include_str!("../config.example.toml");

#[derive(Debug, Deserialize)]
struct RawDocument {
    version: String,
    #[serde(default)]
    connectors: HashMap<String, RawConnectorEntry>,
    #[serde(default)]
    llm_providers: HashMap<String, RawProviderEntry>,
}

#[derive(Debug, Deserialize)]
struct RawConnectorEntry {
    #[serde(rename = "type")]
    connector_type: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    connection_url: Option<String>,
    #[serde(default)]
    credentials: HashMap<String, String>,
    #[serde(default)]
    options: HashMap<String, Value>,
    #[serde(default)]
    timeout_ms: u64,
    #[serde(default)]
    max_retries: u32,
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProviderEntry {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    config: HashMap<String, Value>,
    #[serde(default)]
    credentials: HashMap<String, String>,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    weight: f64,
    #[serde(default)]
    cost_per_1k_input_tokens: Option<f64>,
    #[serde(default)]
    cost_per_1k_output_tokens: Option<f64>,
}

fn default_true() -> bool {
    true
}

fn interpolation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

/// Replace `${NAME}`, `${NAME:-default}`, and `$NAME` references with the
/// environment variable's value, falling back to the `:-` default (if
/// present) or an empty string when unset or empty (spec §4.5).
fn interpolate_env(raw: &str) -> String {
    interpolation_re()
        .replace_all(raw, |caps: &regex::Captures| {
            let name = caps.get(1).or_else(|| caps.get(4)).map(|m| m.as_str()).unwrap_or_default();
            let default = caps.get(3).map(|m| m.as_str()).unwrap_or("");
            match std::env::var(name) {
                Ok(value) if !value.is_empty() => value,
                _ => default.to_string(),
            }
        })
        .into_owned()
}

pub struct FileLoader {
    path: std::path::PathBuf,
}

impl FileLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    fn read_and_parse(&self) -> Result<RawDocument, ConnectorError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            ConnectorError::new("file-loader", "read", ErrorKind::Configuration, format!("failed to read {}: {e}", self.path.display()))
        })?;
        let interpolated = interpolate_env(&raw);
        let document: RawDocument = toml::from_str(&interpolated).map_err(|e| {
            ConnectorError::new("file-loader", "parse", ErrorKind::Configuration, format!("invalid document: {e}"))
        })?;
        Self::validate(&document)?;
        Ok(document)
    }

    /// Requires non-empty `version`; each connector's `type` and each LLM
    /// provider name must be recognised; provider `weight` must fall in
    /// `[0, 1]` (spec §4.5).
    fn validate(document: &RawDocument) -> Result<(), ConnectorError> {
        if document.version.trim().is_empty() {
            return Err(ConnectorError::new("file-loader", "validate", ErrorKind::Configuration, "document `version` must be non-empty"));
        }
        for (name, entry) in &document.connectors {
            if !RECOGNISED_CONNECTOR_TYPES.contains(&entry.connector_type.to_lowercase().as_str()) {
                return Err(ConnectorError::new(
                    "file-loader",
                    "validate",
                    ErrorKind::Configuration,
                    format!("connector `{name}` has unrecognised type `{}`", entry.connector_type),
                ));
            }
        }
        for name in document.llm_providers.keys() {
            if name.parse::<LLMProviderName>().is_err() {
                return Err(ConnectorError::new(
                    "file-loader",
                    "validate",
                    ErrorKind::Configuration,
                    format!("llm provider entry key `{name}` is not a recognised provider name"),
                ));
            }
        }
        for (name, entry) in &document.llm_providers {
            if !(0.0..=1.0).contains(&entry.weight) {
                return Err(ConnectorError::new(
                    "file-loader",
                    "validate",
                    ErrorKind::Configuration,
                    format!("llm provider `{name}` weight {} is outside [0, 1]", entry.weight),
                ));
            }
        }
        Ok(())
    }

    /// Explicit validation entry point over the file on disk, without
    /// returning the resolved entries.
    pub fn validate_file(&self) -> Result<(), ConnectorError> {
        self.read_and_parse().map(|_| ())
    }

    /// `tenant == "*"` returns every enabled entry regardless of
    /// `tenant_id`; otherwise an entry matches iff its `tenant_id` is `*`
    /// or equal to `tenant`. Disabled entries are always omitted (spec
    /// §4.5).
    pub fn load_connectors(&self, tenant: &str) -> Result<Vec<ConnectorConfig>, ConnectorError> {
        let document = self.read_and_parse()?;
        let mut result = Vec::new();
        for (name, entry) in document.connectors {
            if !entry.enabled {
                continue;
            }
            let entry_tenant = entry.tenant_id.clone().unwrap_or_else(|| "*".to_string());
            if tenant != "*" && entry_tenant != "*" && entry_tenant != tenant {
                continue;
            }
            let connector_type: ConnectorType = entry.connector_type.parse().map_err(|e| {
                ConnectorError::new("file-loader", "load_connectors", ErrorKind::Configuration, e)
            })?;
            result.push(ConnectorConfig {
                name,
                connector_type,
                display_name: entry.display_name,
                description: entry.description,
                connection_url: entry.connection_url,
                credentials: entry.credentials,
                options: entry.options,
                timeout: if entry.timeout_ms == 0 { Duration::from_secs(30) } else { Duration::from_millis(entry.timeout_ms) },
                max_retries: if entry.max_retries == 0 { 3 } else { entry.max_retries },
                tenant_id: entry_tenant,
            });
        }
        Ok(result)
    }

    /// LLM provider entries have no `tenant_id` field in the document
    /// format (spec §4.5) — they are global, so `tenant` only gates
    /// whether disabled entries are omitted (always) and otherwise
    /// returns all enabled providers.
    pub fn load_llm_providers(&self, _tenant: &str) -> Result<Vec<LLMProviderConfig>, ConnectorError> {
        let document = self.read_and_parse()?;
        let mut result = Vec::new();
        for (name, entry) in document.llm_providers {
            if !entry.enabled {
                continue;
            }
            let provider_name: LLMProviderName = name.parse().map_err(|e| {
                ConnectorError::new("file-loader", "load_llm_providers", ErrorKind::Configuration, e)
            })?;
            result.push(LLMProviderConfig {
                provider_name,
                display_name: entry.display_name,
                config: entry.config,
                credentials: entry.credentials,
                priority: if entry.priority == 0 { 5 } else { entry.priority },
                weight: if entry.weight == 0.0 { 1.0 } else { entry.weight },
                enabled: entry.enabled,
                health_status: None,
                cost_per_1k_input_tokens: entry.cost_per_1k_input_tokens,
                cost_per_1k_output_tokens: entry.cost_per_1k_output_tokens,
            });
        }
        Ok(result)
    }

    pub fn example() -> &'static str {
        EXAMPLE_DOCUMENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn interpolates_set_variable() {
        std::env::set_var("FL_TEST_HOST", "db.internal");
        let out = interpolate_env("host = \"${FL_TEST_HOST}\"");
        assert_eq!(out, "host = \"db.internal\"");
        std::env::remove_var("FL_TEST_HOST");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        std::env::remove_var("FL_TEST_UNSET");
        let out = interpolate_env("host = \"${FL_TEST_UNSET:-localhost}\"");
        assert_eq!(out, "host = \"localhost\"");
    }

    #[test]
    fn empty_variable_uses_default_too() {
        std::env::set_var("FL_TEST_EMPTY", "");
        let out = interpolate_env("host = \"${FL_TEST_EMPTY:-fallback}\"");
        assert_eq!(out, "host = \"fallback\"");
        std::env::remove_var("FL_TEST_EMPTY");
    }

    #[test]
    fn bare_dollar_form_is_recognised() {
        std::env::set_var("FLBARE", "x");
        let out = interpolate_env("v = \"$FLBARE\"");
        assert_eq!(out, "v = \"x\"");
        std::env::remove_var("FLBARE");
    }

    #[test]
    fn rejects_empty_version() {
        let file = write_temp("version = \"\"\n");
        let loader = FileLoader::new(file.path());
        assert!(loader.validate_file().is_err());
    }

    #[test]
    fn rejects_unrecognised_connector_type() {
        let file = write_temp(
            r#"
            version = "1"
            [connectors.foo]
            type = "mysql"
            "#,
        );
        let loader = FileLoader::new(file.path());
        assert!(loader.validate_file().is_err());
    }

    #[test]
    fn rejects_provider_weight_outside_unit_interval() {
        let file = write_temp(
            r#"
            version = "1"
            [llm_providers.openai]
            weight = 1.5
            "#,
        );
        let loader = FileLoader::new(file.path());
        assert!(loader.validate_file().is_err());
    }

    #[test]
    fn loads_enabled_connector_with_defaults_applied() {
        let file = write_temp(
            r#"
            version = "1"
            [connectors.primary]
            type = "postgres"
            connection_url = "postgres://localhost/db"
            "#,
        );
        let loader = FileLoader::new(file.path());
        let configs = loader.load_connectors("*").unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].timeout, Duration::from_secs(30));
        assert_eq!(configs[0].max_retries, 3);
        assert_eq!(configs[0].tenant_id, "*");
    }

    #[test]
    fn disabled_connector_is_omitted() {
        let file = write_temp(
            r#"
            version = "1"
            [connectors.primary]
            type = "postgres"
            enabled = false
            "#,
        );
        let loader = FileLoader::new(file.path());
        assert!(loader.load_connectors("*").unwrap().is_empty());
    }

    #[test]
    fn tenant_filtering_matches_wildcard_and_exact_tenant() {
        let file = write_temp(
            r#"
            version = "1"
            [connectors.shared]
            type = "postgres"
            tenant_id = "*"
            [connectors.acme_only]
            type = "postgres"
            tenant_id = "acme"
            [connectors.other_only]
            type = "postgres"
            tenant_id = "other"
            "#,
        );
        let loader = FileLoader::new(file.path());
        let names: Vec<String> = loader.load_connectors("acme").unwrap().into_iter().map(|c| c.name).collect();
        assert!(names.contains(&"shared".to_string()));
        assert!(names.contains(&"acme_only".to_string()));
        assert!(!names.contains(&"other_only".to_string()));
    }

    #[test]
    fn wildcard_tenant_request_returns_all_enabled_entries() {
        let file = write_temp(
            r#"
            version = "1"
            [connectors.a]
            type = "postgres"
            tenant_id = "acme"
            [connectors.b]
            type = "postgres"
            tenant_id = "other"
            "#,
        );
        let loader = FileLoader::new(file.path());
        assert_eq!(loader.load_connectors("*").unwrap().len(), 2);
    }

    #[test]
    fn provider_defaults_applied_for_zero_values() {
        let file = write_temp(
            r#"
            version = "1"
            [llm_providers.openai]
            "#,
        );
        let loader = FileLoader::new(file.path());
        let providers = loader.load_llm_providers("*").unwrap();
        assert_eq!(providers[0].priority, 5);
        assert_eq!(providers[0].weight, 1.0);
    }

    #[test]
    fn example_document_parses_and_validates() {
        let contents = FileLoader::example();
        assert!(!contents.trim().is_empty());
        let document: RawDocument = toml::from_str(contents).expect("example document must parse as TOML");
        FileLoader::validate(&document).expect("example document must pass validation");
    }
}
