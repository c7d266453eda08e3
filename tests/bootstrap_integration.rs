// Copyright 2025 Cowboy AI, LLC.

//! Bootstrap integration tests
//!
//! These tests require a running Neo4j instance on localhost:7687
//!
//! Run with:
//! ```bash
//! # Start Neo4j (if not already running)
//! docker run -d --name neo4j \
//!   -p 7474:7474 -p 7687:7687 \
//!   -e NEO4J_AUTH=none \
//!   neo4j:latest
//!
//! # Run tests
//! cargo test --test bootstrap_integration --all-features -- --ignored
//! ```

use neo4j_bootstrap::{
    Bootstrap, ConnectionSettings, Driver, DriverConfig, HealthStatus, ResolverRegistry,
};

fn local_settings() -> ConnectionSettings {
    init_tracing();
    ConnectionSettings::for_uri("bolt://localhost:7687")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
#[ignore] // Requires running Neo4j instance
async fn driver_connects_and_pings() {
    let config = DriverConfig::assemble(&local_settings(), &ResolverRegistry::new())
        .expect("Failed to assemble config");

    let driver = Driver::connect(config).await;
    assert!(driver.is_ok(), "Failed to connect to Neo4j: {:?}", driver.err());

    let driver = driver.unwrap();
    assert!(driver.verify_connectivity().await.is_ok());
}

#[tokio::test]
#[ignore] // Requires running Neo4j instance
async fn execute_yields_the_first_row() {
    let driver = Driver::from_settings(&local_settings(), &ResolverRegistry::new())
        .await
        .expect("Failed to connect");

    let row = driver
        .execute(neo4rs::Query::new("RETURN 1 AS answer".to_string()))
        .await
        .expect("Query failed")
        .expect("Query returned no row");
    assert_eq!(row.get::<i64>("answer").expect("Missing column"), 1);
}

#[tokio::test]
#[ignore] // Requires running Neo4j instance
async fn health_indicator_reports_up() {
    let components = Bootstrap::new(local_settings())
        .build()
        .await
        .expect("Failed to bootstrap");

    let health = components.health.expect("Health indicator not wired");
    let report = health.check().await;
    assert_eq!(report.status(), HealthStatus::Up);

    let server = report.detail("server").expect("Missing server detail");
    assert!(server.contains('@'), "Unexpected server detail: {server}");
}

#[tokio::test]
#[ignore] // Requires running Neo4j instance
async fn unreachable_server_reports_connectivity_error() {
    let mut settings = ConnectionSettings::for_uri("bolt://localhost:9");
    settings.driver.connection_timeout_millis = 500;

    let config =
        DriverConfig::assemble(&settings, &ResolverRegistry::new()).expect("Failed to assemble");
    let result = Driver::connect(config).await;
    assert!(result.is_err(), "Connecting to a closed port should fail");
}

#[cfg(feature = "test-harness")]
mod with_harness {
    use neo4j_bootstrap::TestHarness;

    #[tokio::test]
    #[ignore] // Requires NEO4J_TEST_URI
    async fn harness_connects_from_env() {
        let Some(harness) = TestHarness::from_env().await.expect("Harness failed") else {
            return;
        };
        assert!(harness.driver().verify_connectivity().await.is_ok());
    }
}

#[cfg(feature = "mapping")]
mod with_mapping {
    use super::local_settings;
    use neo4j_bootstrap::{Bootstrap, BootstrapError, GraphEntity, Result};
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize)]
    struct Movie {
        id: String,
        title: String,
        released: i64,
    }

    impl GraphEntity for Movie {
        const LABEL: &'static str = "BootstrapTestMovie";

        fn entity_id(&self) -> String {
            self.id.clone()
        }

        fn from_row(row: &neo4rs::Row) -> Result<Self> {
            let node: neo4rs::Node = row
                .get("n")
                .map_err(|_| BootstrapError::Connectivity("row without node".to_string()))?;
            Ok(Self {
                id: node.get("id").unwrap_or_default(),
                title: node.get("title").unwrap_or_default(),
                released: node.get("released").unwrap_or_default(),
            })
        }
    }

    #[tokio::test]
    #[ignore] // Requires running Neo4j instance
    async fn entities_round_trip_through_the_graph() {
        let components = Bootstrap::new(local_settings())
            .build()
            .await
            .expect("Failed to bootstrap");
        let factory = components.mapping.expect("Mapping factory not wired");
        let session = factory.session();

        let movie = Movie {
            id: "bootstrap-it-1".to_string(),
            title: "The Matrix".to_string(),
            released: 1999,
        };

        session.save(&movie).await.expect("Failed to save");
        let loaded: Option<Movie> = session.load(&movie.id).await.expect("Failed to load");
        assert_eq!(loaded.as_ref(), Some(&movie));

        session
            .delete::<Movie>(&movie.id)
            .await
            .expect("Failed to delete");
        let gone: Option<Movie> = session.load(&movie.id).await.expect("Failed to load");
        assert_eq!(gone, None);
    }
}
