//! Salesforce connector — enterprise stub (spec §4.2, §6).
//!
//! Environment variables (spec §6): `MCP_<NAME>_CLIENT_ID`,
//! `MCP_<NAME>_CLIENT_SECRET`, `MCP_<NAME>_SECURITY_TOKEN`,
//! `MCP_<NAME>_INSTANCE_URL`. See [`super::enterprise`] for why this
//! connector never dials a real Salesforce org.

use super::config::ConnectorType;
use super::enterprise::{impl_enterprise_connector, EnterpriseStub};

pub struct SalesforceConnector {
    stub: EnterpriseStub,
}

impl SalesforceConnector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            stub: EnterpriseStub::new(name, ConnectorType::Salesforce),
        }
    }
}

impl_enterprise_connector!(SalesforceConnector);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Connector;

    #[tokio::test]
    async fn execute_fails_with_sentinel() {
        let connector = SalesforceConnector::new("sf1");
        let err = connector
            .execute(crate::connector::Command {
                action: "insert".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.is_enterprise_feature());
    }

    #[test]
    fn metadata_reports_community_stub() {
        let connector = SalesforceConnector::new("sf1");
        assert_eq!(connector.version(), "community-stub");
        assert!(connector.capabilities().is_empty());
    }
}
