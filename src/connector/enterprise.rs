//! Shared scaffolding for enterprise-only connector bodies not included in
//! the open distribution (spec §4.2 "Enterprise-stub contract", §6 error
//! sentinel, §9 "Enterprise stubs").
//!
//! Every stub connector (`snowflake`, `salesforce`, `slack`, `amadeus`)
//! embeds an [`EnterpriseStub`] and forwards every trait method to it. The
//! full bodies are outside this subsystem; what's preserved here is the
//! *contract* — the same surface, the same sentinel error, the same
//! metadata shape — so downstream callers can treat any enterprise
//! connector identically regardless of backend.

use std::time::Duration;

use super::config::ConnectorType;
use super::{Command, CommandResult, Connector, HealthStatus, Query, QueryResult};
use crate::error::{ConnectorError, ErrorKind, EnterpriseFeatureError};

/// Standardised on `"community-stub"` as the version string everywhere — see
/// DESIGN.md's Open Question decision (the corpus's "OSS" vs "Community"
/// naming split is collapsed to one value).
pub const STUB_VERSION: &str = "community-stub";

/// Shared stub behaviour, embedded by each enterprise connector type. Holds
/// just enough state (name, type) to report accurate metadata and error
/// context; it never actually dials anything.
pub struct EnterpriseStub {
    name: String,
    connector_type: ConnectorType,
}

impl EnterpriseStub {
    pub fn new(name: impl Into<String>, connector_type: ConnectorType) -> Self {
        Self {
            name: name.into(),
            connector_type,
        }
    }

    pub async fn connect(&self) -> Result<(), ConnectorError> {
        Err(ConnectorError::new(
            self.name.clone(),
            "connect",
            ErrorKind::EnterpriseFeature,
            "this connector requires an enterprise license",
        )
        .with_cause(EnterpriseFeatureError))
    }

    pub async fn disconnect(&self) -> Result<(), ConnectorError> {
        Ok(())
    }

    pub async fn health_check(&self) -> HealthStatus {
        HealthStatus::unhealthy("enterprise feature: contact sales@example.com")
    }

    pub async fn query(&self, _query: Query) -> Result<QueryResult, ConnectorError> {
        Err(self.sentinel("query"))
    }

    pub async fn execute(&self, _command: Command) -> Result<CommandResult, ConnectorError> {
        Err(self.sentinel("execute"))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connector_type(&self) -> ConnectorType {
        self.connector_type
    }

    pub fn version(&self) -> &str {
        STUB_VERSION
    }

    pub fn capabilities(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn sentinel(&self, operation: &str) -> ConnectorError {
        ConnectorError::new(
            self.name.clone(),
            operation,
            ErrorKind::EnterpriseFeature,
            "this connector requires an enterprise license",
        )
        .with_cause(EnterpriseFeatureError)
    }
}

/// Implement [`Connector`] for a unit struct wrapping an [`EnterpriseStub`],
/// forwarding every method. Used by each of the four stub connector modules
/// so none of them hand-writes the same boilerplate trait impl.
macro_rules! impl_enterprise_connector {
    ($ty:ty) => {
        #[async_trait::async_trait]
        impl $crate::connector::Connector for $ty {
            async fn connect(&mut self) -> Result<(), $crate::error::ConnectorError> {
                self.stub.connect().await
            }

            async fn disconnect(&mut self) -> Result<(), $crate::error::ConnectorError> {
                self.stub.disconnect().await
            }

            async fn health_check(&self) -> $crate::connector::HealthStatus {
                self.stub.health_check().await
            }

            async fn query(
                &self,
                query: $crate::connector::Query,
            ) -> Result<$crate::connector::QueryResult, $crate::error::ConnectorError> {
                self.stub.query(query).await
            }

            async fn execute(
                &self,
                command: $crate::connector::Command,
            ) -> Result<$crate::connector::CommandResult, $crate::error::ConnectorError> {
                self.stub.execute(command).await
            }

            fn name(&self) -> &str {
                self.stub.name()
            }

            fn connector_type(&self) -> $crate::connector::config::ConnectorType {
                self.stub.connector_type()
            }

            fn version(&self) -> &str {
                self.stub.version()
            }

            fn capabilities(&self) -> Vec<&'static str> {
                self.stub.capabilities()
            }
        }
    };
}

pub(crate) use impl_enterprise_connector;

// Re-exported for the timeout-precedence doc note in spec §4.2; stubs never
// actually honour a deadline since they fail immediately, but the constant
// documents what "tight, self-imposed deadline" would have meant.
pub const HEALTH_CHECK_DEADLINE: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_fails_with_enterprise_sentinel() {
        let stub = EnterpriseStub::new("snowflake", ConnectorType::Snowflake);
        let err = stub.connect().await.unwrap_err();
        assert!(err.is_enterprise_feature());
    }

    #[tokio::test]
    async fn disconnect_is_always_a_no_op_success() {
        let stub = EnterpriseStub::new("slack", ConnectorType::Slack);
        assert!(stub.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn health_check_reports_unhealthy_without_panicking() {
        let stub = EnterpriseStub::new("salesforce", ConnectorType::Salesforce);
        let status = stub.health_check().await;
        assert!(!status.healthy);
        assert!(!status.error.is_empty());
    }

    #[test]
    fn version_and_capabilities_match_spec() {
        let stub = EnterpriseStub::new("amadeus", ConnectorType::Amadeus);
        assert_eq!(stub.version(), "community-stub");
        assert!(stub.capabilities().is_empty());
    }
}
