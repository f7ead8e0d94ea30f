//! Amadeus travel API connector — enterprise stub (spec §4.2, §6).
//!
//! Environment variables (spec §6): `MCP_<NAME>_ENVIRONMENT`, plus the
//! global fallbacks `AMADEUS_ENV`, `AMADEUS_API_KEY_TEST`/`_PROD`,
//! `AMADEUS_API_SECRET_TEST`/`_PROD`, `AMADEUS_URL_TEST`/`_PROD`. See
//! [`super::enterprise`] for why this connector never dials the real
//! Amadeus API.

use super::config::ConnectorType;
use super::enterprise::{impl_enterprise_connector, EnterpriseStub};

pub struct AmadeusConnector {
    stub: EnterpriseStub,
}

impl AmadeusConnector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            stub: EnterpriseStub::new(name, ConnectorType::Amadeus),
        }
    }
}

impl_enterprise_connector!(AmadeusConnector);
