//! Slack connector — enterprise stub (spec §4.2, §6).
//!
//! Environment variable (spec §6): `MCP_<NAME>_BOT_TOKEN`. See
//! [`super::enterprise`] for why this connector never dials the real Slack
//! API.

use super::config::ConnectorType;
use super::enterprise::{impl_enterprise_connector, EnterpriseStub};

pub struct SlackConnector {
    stub: EnterpriseStub,
}

impl SlackConnector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            stub: EnterpriseStub::new(name, ConnectorType::Slack),
        }
    }
}

impl_enterprise_connector!(SlackConnector);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Connector;

    #[tokio::test]
    async fn query_fails_with_sentinel() {
        let connector = SlackConnector::new("slack1");
        let err = connector
            .query(crate::connector::Query::default())
            .await
            .unwrap_err();
        assert!(err.is_enterprise_feature());
    }

    #[test]
    fn capabilities_are_empty() {
        let connector = SlackConnector::new("slack1");
        assert!(connector.capabilities().is_empty());
    }
}
