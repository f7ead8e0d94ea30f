//! Per-backend environment variable loaders (spec §6), the lowest tier of
//! the runtime configuration service's resolution chain. Each function
//! reads the fixed `MCP_<NAME>_*` variable family plus its backend-specific
//! suffixes and returns `None` when nothing usable is configured, rather
//! than an error — environment discovery is opportunistic by design.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::connector::config::{defaults, ConnectorConfig, ConnectorType};
use crate::llm::{LLMProviderConfig, LLMProviderName};

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn mcp_var(name: &str, suffix: &str) -> String {
    format!("MCP_{}_{}", name.to_uppercase(), suffix)
}

/// Parse `30`, `30s`, `500ms`, `5m`, `1h` into a [`Duration`]. Bare integers
/// are seconds.
fn parse_env_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let (digits, unit) = raw.split_at(raw.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(raw.len()));
    let value: f64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value as u64)),
        "s" => Some(Duration::from_secs_f64(value)),
        "m" => Some(Duration::from_secs_f64(value * 60.0)),
        "h" => Some(Duration::from_secs_f64(value * 3600.0)),
        _ => None,
    }
}

struct CommonFields {
    url: Option<String>,
    tenant_id: String,
    timeout: Duration,
    max_retries: u32,
    credentials: HashMap<String, String>,
}

fn read_common(name: &str) -> CommonFields {
    let mut credentials = HashMap::new();
    if let Some(v) = env_opt(&mcp_var(name, "USERNAME")) {
        credentials.insert("username".to_string(), v);
    }
    if let Some(v) = env_opt(&mcp_var(name, "PASSWORD")) {
        credentials.insert("password".to_string(), v);
    }
    if let Some(v) = env_opt(&mcp_var(name, "API_KEY")) {
        credentials.insert("api_key".to_string(), v);
    }

    CommonFields {
        url: env_opt(&mcp_var(name, "URL")),
        tenant_id: env_opt(&mcp_var(name, "TENANT_ID")).unwrap_or_else(defaults::tenant_id),
        timeout: env_opt(&mcp_var(name, "TIMEOUT")).and_then(|s| parse_env_duration(&s)).unwrap_or_else(defaults::timeout),
        max_retries: env_opt(&mcp_var(name, "MAX_RETRIES")).and_then(|s| s.parse().ok()).unwrap_or_else(defaults::max_retries),
        credentials,
    }
}

fn base_config(name: &str, connector_type: ConnectorType, common: CommonFields) -> ConnectorConfig {
    ConnectorConfig {
        name: name.to_string(),
        connector_type,
        display_name: None,
        description: None,
        connection_url: common.url,
        credentials: common.credentials,
        options: HashMap::new(),
        timeout: common.timeout,
        max_retries: common.max_retries,
        tenant_id: common.tenant_id,
    }
}

pub fn load_postgres_from_env(name: &str) -> Option<ConnectorConfig> {
    let common = read_common(name);
    common.url.as_ref()?;
    Some(base_config(name, ConnectorType::Postgres, common))
}

/// Global fallback: `DATABASE_URL` with no per-name numbering (spec §6).
pub fn load_postgres_global_fallback(name: &str) -> Option<ConnectorConfig> {
    let url = env_opt("DATABASE_URL")?;
    let mut common = read_common(name);
    common.url = Some(url);
    Some(base_config(name, ConnectorType::Postgres, common))
}

pub fn load_cassandra_from_env(name: &str) -> Option<ConnectorConfig> {
    let common = read_common(name);
    common.url.as_ref()?;
    let mut config = base_config(name, ConnectorType::Cassandra, common);
    if let Some(keyspace) = env_opt(&mcp_var(name, "KEYSPACE")) {
        config.options.insert("keyspace".to_string(), Value::String(keyspace));
    }
    if let Some(consistency) = env_opt(&mcp_var(name, "CONSISTENCY")) {
        config.options.insert("consistency".to_string(), Value::String(consistency));
    }
    Some(config)
}

pub fn load_salesforce_from_env(name: &str) -> Option<ConnectorConfig> {
    let mut common = read_common(name);
    let client_id = env_opt(&mcp_var(name, "CLIENT_ID"));
    let client_secret = env_opt(&mcp_var(name, "CLIENT_SECRET"));
    let security_token = env_opt(&mcp_var(name, "SECURITY_TOKEN"));
    let instance_url = env_opt(&mcp_var(name, "INSTANCE_URL"));
    if client_id.is_none() && client_secret.is_none() && security_token.is_none() && instance_url.is_none() {
        return None;
    }
    if let Some(v) = client_id {
        common.credentials.insert("client_id".to_string(), v);
    }
    if let Some(v) = client_secret {
        common.credentials.insert("client_secret".to_string(), v);
    }
    if let Some(v) = security_token {
        common.credentials.insert("security_token".to_string(), v);
    }
    if common.url.is_none() {
        common.url = instance_url;
    }
    Some(base_config(name, ConnectorType::Salesforce, common))
}

pub fn load_slack_from_env(name: &str) -> Option<ConnectorConfig> {
    let mut common = read_common(name);
    let bot_token = env_opt(&mcp_var(name, "BOT_TOKEN"))?;
    common.credentials.insert("bot_token".to_string(), bot_token);
    Some(base_config(name, ConnectorType::Slack, common))
}

pub fn load_snowflake_from_env(name: &str) -> Option<ConnectorConfig> {
    let mut common = read_common(name);
    let account = env_opt(&mcp_var(name, "ACCOUNT"));
    let private_key_path = env_opt(&mcp_var(name, "PRIVATE_KEY_PATH"));
    let warehouse = env_opt(&mcp_var(name, "WAREHOUSE"));
    let role = env_opt(&mcp_var(name, "ROLE"));
    account.as_ref()?;
    let mut config = base_config(name, ConnectorType::Snowflake, {
        if let Some(v) = private_key_path {
            common.credentials.insert("private_key_path".to_string(), v);
        }
        common
    });
    if let Some(v) = account {
        config.options.insert("account".to_string(), Value::String(v));
    }
    if let Some(v) = warehouse {
        config.options.insert("warehouse".to_string(), Value::String(v));
    }
    if let Some(v) = role {
        config.options.insert("role".to_string(), Value::String(v));
    }
    Some(config)
}

pub fn load_amadeus_from_env(name: &str) -> Option<ConnectorConfig> {
    let common = read_common(name);
    let environment = env_opt(&mcp_var(name, "ENVIRONMENT"));
    if common.credentials.is_empty() && environment.is_none() {
        return None;
    }
    let mut config = base_config(name, ConnectorType::Amadeus, common);
    if let Some(v) = environment {
        config.options.insert("environment".to_string(), Value::String(v));
    }
    Some(config)
}

/// Global fallback: `AMADEUS_ENV` selects between `_TEST`/`_PROD` suffixed
/// credential and URL pairs (spec §6).
pub fn load_amadeus_global_fallback(name: &str) -> Option<ConnectorConfig> {
    let env_name = env_opt("AMADEUS_ENV").unwrap_or_else(|| "test".to_string());
    let suffix = if env_name.eq_ignore_ascii_case("prod") { "PROD" } else { "TEST" };
    let api_key = env_opt(&format!("AMADEUS_API_KEY_{suffix}"))?;
    let api_secret = env_opt(&format!("AMADEUS_API_SECRET_{suffix}"));
    let url = env_opt(&format!("AMADEUS_URL_{suffix}"));

    let mut credentials = HashMap::new();
    credentials.insert("api_key".to_string(), api_key);
    if let Some(v) = api_secret {
        credentials.insert("api_secret".to_string(), v);
    }

    let mut options = HashMap::new();
    options.insert("environment".to_string(), Value::String(env_name.to_lowercase()));

    Some(ConnectorConfig {
        name: name.to_string(),
        connector_type: ConnectorType::Amadeus,
        display_name: None,
        description: None,
        connection_url: url,
        credentials,
        options,
        timeout: defaults::timeout(),
        max_retries: defaults::max_retries(),
        tenant_id: defaults::tenant_id(),
    })
}

fn base_provider(provider_name: LLMProviderName, config: HashMap<String, Value>, credentials: HashMap<String, String>) -> LLMProviderConfig {
    LLMProviderConfig {
        provider_name,
        display_name: None,
        config,
        credentials,
        priority: defaults::priority(),
        weight: defaults::weight(),
        enabled: true,
        health_status: None,
        cost_per_1k_input_tokens: None,
        cost_per_1k_output_tokens: None,
    }
}

pub fn load_bedrock_provider() -> Option<LLMProviderConfig> {
    let region = env_opt("BEDROCK_REGION").or_else(|| env_opt("AWS_REGION"))?;
    let mut config = HashMap::new();
    config.insert("region".to_string(), Value::String(region));
    if let Some(model) = env_opt("BEDROCK_MODEL") {
        config.insert("model".to_string(), Value::String(model));
    }
    Some(base_provider(LLMProviderName::Bedrock, config, HashMap::new()))
}

pub fn load_ollama_provider() -> Option<LLMProviderConfig> {
    let endpoint = env_opt("OLLAMA_ENDPOINT")?;
    let mut config = HashMap::new();
    config.insert("endpoint".to_string(), Value::String(endpoint));
    if let Some(model) = env_opt("OLLAMA_MODEL") {
        config.insert("model".to_string(), Value::String(model));
    }
    Some(base_provider(LLMProviderName::Ollama, config, HashMap::new()))
}

pub fn load_openai_provider() -> Option<LLMProviderConfig> {
    let api_key = env_opt("OPENAI_API_KEY")?;
    let mut credentials = HashMap::new();
    credentials.insert("api_key".to_string(), api_key);
    let mut config = HashMap::new();
    if let Some(model) = env_opt("OPENAI_MODEL") {
        config.insert("model".to_string(), Value::String(model));
    }
    Some(base_provider(LLMProviderName::Openai, config, credentials))
}

pub fn load_anthropic_provider() -> Option<LLMProviderConfig> {
    let api_key = env_opt("ANTHROPIC_API_KEY")?;
    let mut credentials = HashMap::new();
    credentials.insert("api_key".to_string(), api_key);
    let mut config = HashMap::new();
    if let Some(model) = env_opt("ANTHROPIC_MODEL") {
        config.insert("model".to_string(), Value::String(model));
    }
    Some(base_provider(LLMProviderName::Anthropic, config, credentials))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn parse_env_duration_accepts_bare_seconds_and_suffixed_forms() {
        assert_eq!(parse_env_duration("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_env_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_env_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_env_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_env_duration("1h"), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn postgres_loader_requires_url() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::remove_var("MCP_TESTPG_URL");
        assert!(load_postgres_from_env("testpg").is_none());
    }

    #[test]
    fn postgres_loader_reads_common_fields() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("MCP_TESTPG2_URL", "postgres://localhost/db");
        std::env::set_var("MCP_TESTPG2_TENANT_ID", "acme");
        std::env::set_var("MCP_TESTPG2_MAX_RETRIES", "7");
        let config = load_postgres_from_env("testpg2").unwrap();
        assert_eq!(config.connection_url.as_deref(), Some("postgres://localhost/db"));
        assert_eq!(config.tenant_id, "acme");
        assert_eq!(config.max_retries, 7);
        std::env::remove_var("MCP_TESTPG2_URL");
        std::env::remove_var("MCP_TESTPG2_TENANT_ID");
        std::env::remove_var("MCP_TESTPG2_MAX_RETRIES");
    }

    #[test]
    fn postgres_global_fallback_reads_database_url() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("DATABASE_URL", "postgres://fallback/db");
        let config = load_postgres_global_fallback("fallback-pg").unwrap();
        assert_eq!(config.connection_url.as_deref(), Some("postgres://fallback/db"));
        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    fn slack_loader_requires_bot_token() {
        let _guard = ENV_GUARD.lock().unwrap();
        assert!(load_slack_from_env("testslack").is_none());
        std::env::set_var("MCP_TESTSLACK_BOT_TOKEN", "xoxb-1");
        let config = load_slack_from_env("testslack").unwrap();
        assert_eq!(config.credentials.get("bot_token"), Some(&"xoxb-1".to_string()));
        std::env::remove_var("MCP_TESTSLACK_BOT_TOKEN");
    }

    #[test]
    fn amadeus_global_fallback_selects_test_suffix_by_default() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::remove_var("AMADEUS_ENV");
        std::env::set_var("AMADEUS_API_KEY_TEST", "key-test");
        let config = load_amadeus_global_fallback("amadeus-fb").unwrap();
        assert_eq!(config.credentials.get("api_key"), Some(&"key-test".to_string()));
        std::env::remove_var("AMADEUS_API_KEY_TEST");
    }

    #[test]
    fn openai_provider_requires_api_key() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::remove_var("OPENAI_API_KEY");
        assert!(load_openai_provider().is_none());
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        assert!(load_openai_provider().is_some());
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    fn bedrock_provider_falls_back_to_aws_region() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::remove_var("BEDROCK_REGION");
        std::env::set_var("AWS_REGION", "us-west-2");
        let provider = load_bedrock_provider().unwrap();
        assert_eq!(provider.config.get("region").and_then(Value::as_str), Some("us-west-2"));
        std::env::remove_var("AWS_REGION");
    }
}
