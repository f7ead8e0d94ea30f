//! Snowflake connector — enterprise stub (spec §4.2, §6, §8 scenario 4).
//!
//! Environment variables recognised when this connector is constructed from
//! the environment tier (spec §6): `MCP_<NAME>_ACCOUNT`,
//! `MCP_<NAME>_PRIVATE_KEY_PATH`, `MCP_<NAME>_WAREHOUSE`, `MCP_<NAME>_ROLE`,
//! in addition to the common `_URL`/`_USERNAME`/`_TENANT_ID` suffixes. The
//! open distribution never dials Snowflake — see [`super::enterprise`].

use super::config::ConnectorType;
use super::enterprise::{impl_enterprise_connector, EnterpriseStub};

pub struct SnowflakeConnector {
    stub: EnterpriseStub,
}

impl SnowflakeConnector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            stub: EnterpriseStub::new(name, ConnectorType::Snowflake),
        }
    }
}

impl_enterprise_connector!(SnowflakeConnector);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Connector;

    #[tokio::test]
    async fn connect_surfaces_enterprise_sentinel_through_unwrap_chain() {
        let mut connector = SnowflakeConnector::new("snow1");
        let err = connector.connect().await.unwrap_err();
        assert!(err.is_enterprise_feature());
    }

    #[tokio::test]
    async fn disconnect_returns_no_error() {
        let mut connector = SnowflakeConnector::new("snow1");
        assert!(connector.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn health_check_reports_unhealthy() {
        let connector = SnowflakeConnector::new("snow1");
        let status = connector.health_check().await;
        assert!(!status.healthy);
    }

    #[test]
    fn metadata_matches_stub_contract() {
        let connector = SnowflakeConnector::new("snow1");
        assert_eq!(connector.version(), "community-stub");
        assert!(connector.capabilities().is_empty());
        assert_eq!(connector.connector_type(), ConnectorType::Snowflake);
    }
}
