//! `ConnectorFactory` — builds a `Box<dyn Connector>` from a resolved
//! [`ConnectorConfig`] (spec §2's "a resolved descriptor is then handed to a
//! connector factory", promoted to a named submodule here; see
//! DESIGN.md).

use super::config::{ConnectorConfig, ConnectorType};
use super::Connector;
use crate::error::{ConnectorError, ErrorKind};

pub struct ConnectorFactory;

impl ConnectorFactory {
    /// Build a connected-or-connectable connector for `config`. The
    /// returned connector has NOT been connected yet — callers drive
    /// `connect()` themselves, matching the gateway's own lifecycle
    /// separation between construction and dialling.
    pub fn build(config: &ConnectorConfig) -> Result<Box<dyn Connector>, ConnectorError> {
        match config.connector_type {
            ConnectorType::Postgres => Ok(Box::new(super::postgres::PostgresConnector::new(config)?)),
            ConnectorType::Mysql => Ok(Box::new(super::mysql::MysqlConnector::new(config)?)),
            ConnectorType::Cassandra => Ok(Box::new(super::cassandra::CassandraConnector::new(config)?)),
            ConnectorType::Mongodb => Ok(Box::new(super::mongodb::MongodbConnector::new(config)?)),
            ConnectorType::Redis => Ok(Box::new(super::redis::RedisConnector::new(config)?)),
            ConnectorType::Gcs => Ok(Box::new(super::gcs::GcsConnector::new(config))),
            ConnectorType::Http => Ok(Box::new(super::http::HttpConnector::new(config)?)),
            ConnectorType::Snowflake => Ok(Box::new(super::snowflake::SnowflakeConnector::new(&config.name))),
            ConnectorType::Salesforce => Ok(Box::new(super::salesforce::SalesforceConnector::new(&config.name))),
            ConnectorType::Slack => Ok(Box::new(super::slack::SlackConnector::new(&config.name))),
            ConnectorType::Amadeus => Ok(Box::new(super::amadeus::AmadeusConnector::new(&config.name))),
            ConnectorType::Custom => Err(ConnectorError::new(
                config.name.clone(),
                "build",
                ErrorKind::Configuration,
                "custom connector type has no built-in factory binding",
            )),
        }
    }
}
