//! [`ConnectorConfig`] and [`ConnectorType`] — the fully-resolved descriptor
//! handed to [`super::factory::ConnectorFactory`] (spec §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The recognised connector backend kinds (spec §4.5's `type` enum, plus the
/// relational/cache/document/object-storage/http families §4.3 covers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorType {
    Postgres,
    Mysql,
    Cassandra,
    Mongodb,
    Redis,
    Gcs,
    Http,
    Salesforce,
    Amadeus,
    Slack,
    Snowflake,
    Custom,
}

impl ConnectorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Cassandra => "cassandra",
            Self::Mongodb => "mongodb",
            Self::Redis => "redis",
            Self::Gcs => "gcs",
            Self::Http => "http",
            Self::Salesforce => "salesforce",
            Self::Amadeus => "amadeus",
            Self::Slack => "slack",
            Self::Snowflake => "snowflake",
            Self::Custom => "custom",
        }
    }

    /// The enterprise-stub connector types — anything the open distribution
    /// does not ship a real driver for (spec §4.2 "Enterprise-stub contract").
    pub fn is_enterprise_stub(&self) -> bool {
        matches!(self, Self::Salesforce | Self::Amadeus | Self::Slack | Self::Snowflake)
    }
}

impl std::fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConnectorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            "cassandra" => Ok(Self::Cassandra),
            "mongodb" | "mongo" => Ok(Self::Mongodb),
            "redis" => Ok(Self::Redis),
            "gcs" => Ok(Self::Gcs),
            "http" | "rest" => Ok(Self::Http),
            "salesforce" => Ok(Self::Salesforce),
            "amadeus" => Ok(Self::Amadeus),
            "slack" => Ok(Self::Slack),
            "snowflake" => Ok(Self::Snowflake),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unrecognised connector type `{other}`")),
        }
    }
}

/// Fully-resolved descriptor of one connector instance (spec §3
/// `ConnectorConfig`). Immutable after resolution; never serialised with
/// live credential values — [`ConnectorConfig::redacted_credentials`] is the
/// only credential-shaped thing that is safe to log or return in a response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectorConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub connector_type: ConnectorType,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub connection_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub credentials: HashMap<String, String>,
    #[serde(default)]
    pub options: HashMap<String, Value>,
    #[serde(with = "duration_millis", default = "defaults::timeout")]
    pub timeout: std::time::Duration,
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,
    #[serde(default = "defaults::tenant_id")]
    pub tenant_id: String,
}

impl ConnectorConfig {
    /// Return `credentials` with every value replaced by a masked
    /// placeholder — safe to include in a JSON response or log line.
    pub fn redacted_credentials(&self) -> HashMap<String, String> {
        self.credentials.keys().map(|k| (k.clone(), "***".to_string())).collect()
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

pub mod defaults {
    use std::time::Duration;

    pub fn timeout() -> Duration {
        Duration::from_secs(30)
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn tenant_id() -> String {
        "*".to_string()
    }
    pub fn priority() -> i32 {
        5
    }
    pub fn weight() -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_credentials_never_leaks_values() {
        let mut config = ConnectorConfig {
            name: "pg".into(),
            connector_type: ConnectorType::Postgres,
            display_name: None,
            description: None,
            connection_url: None,
            credentials: HashMap::new(),
            options: HashMap::new(),
            timeout: defaults::timeout(),
            max_retries: 3,
            tenant_id: "*".into(),
        };
        config.credentials.insert("password".into(), "hunter2".into());
        let redacted = config.redacted_credentials();
        assert_eq!(redacted.get("password").unwrap(), "***");
    }

    #[test]
    fn connector_type_round_trips_through_str() {
        for t in [
            ConnectorType::Postgres,
            ConnectorType::Mysql,
            ConnectorType::Cassandra,
            ConnectorType::Mongodb,
            ConnectorType::Redis,
            ConnectorType::Gcs,
            ConnectorType::Http,
            ConnectorType::Salesforce,
            ConnectorType::Amadeus,
            ConnectorType::Slack,
            ConnectorType::Snowflake,
            ConnectorType::Custom,
        ] {
            let parsed: ConnectorType = t.as_str().parse().unwrap();
            assert_eq!(parsed.as_str(), t.as_str());
        }
    }

    #[test]
    fn enterprise_stub_types_are_flagged() {
        assert!(ConnectorType::Snowflake.is_enterprise_stub());
        assert!(ConnectorType::Salesforce.is_enterprise_stub());
        assert!(ConnectorType::Slack.is_enterprise_stub());
        assert!(ConnectorType::Amadeus.is_enterprise_stub());
        assert!(!ConnectorType::Postgres.is_enterprise_stub());
    }

    #[test]
    fn unrecognised_type_string_is_rejected() {
        assert!("foobar".parse::<ConnectorType>().is_err());
    }
}
