//! Shared fixtures for unit tests.

#![allow(clippy::unwrap_used)]

use butler_db::mock::MockConnector;
use butler_proxy::config::ServiceConfig;
use butler_proxy::{DbService, Loopback};

/// An in-process channel over a scripted connector.
pub(crate) async fn loopback(probe: &MockConnector) -> Loopback<MockConnector> {
    Loopback::new(
        DbService::start(probe.clone(), &ServiceConfig::default())
            .await
            .unwrap(),
    )
}
