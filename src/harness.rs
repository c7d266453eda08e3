// Copyright 2025 Cowboy AI, LLC.

//! Scaffolding for integration tests against a real server

use neo4rs::Query;
use std::sync::Arc;
use tracing::info;

use crate::config::ConnectionSettings;
use crate::driver::{Driver, ResolverRegistry};
use crate::error::Result;

/// A connected test fixture bound to the server named by the
/// `NEO4J_TEST_URI` environment.
///
/// Integration tests call [`TestHarness::from_env`] and return early on
/// `None`, so suites pass on machines without a reachable server. Use
/// `NEO4J_TEST_USERNAME` / `NEO4J_TEST_PASSWORD` for servers with
/// authentication enabled.
pub struct TestHarness {
    driver: Arc<Driver>,
    settings: ConnectionSettings,
}

impl TestHarness {
    /// Connect to the server the environment points at, `None` when no
    /// `NEO4J_TEST_URI` is set
    pub async fn from_env() -> Result<Option<Self>> {
        let Some(uri) = std::env::var("NEO4J_TEST_URI").ok().filter(|v| !v.is_empty()) else {
            info!("NEO4J_TEST_URI not set, skipping integration harness");
            return Ok(None);
        };

        let mut settings = ConnectionSettings::for_uri(uri);
        settings.authentication.username = std::env::var("NEO4J_TEST_USERNAME")
            .ok()
            .filter(|v| !v.is_empty());
        settings.authentication.password = std::env::var("NEO4J_TEST_PASSWORD")
            .ok()
            .filter(|v| !v.is_empty());

        let driver = Arc::new(Driver::from_settings(&settings, &ResolverRegistry::new()).await?);
        Ok(Some(Self { driver, settings }))
    }

    /// The settings the harness connected with
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// The connected driver
    pub fn driver(&self) -> &Arc<Driver> {
        &self.driver
    }

    /// Remove every node carrying the given label.
    ///
    /// Tests keep their fixtures under dedicated labels so cleanup never
    /// touches unrelated data.
    pub async fn wipe(&self, label: &str) -> Result<()> {
        self.driver
            .run(Query::new(format!("MATCH (n:`{label}`) DETACH DELETE n")))
            .await
    }
}
