// Copyright 2025 Cowboy AI, LLC.

//! Neo4j Driver Bootstrap
//!
//! Glue between externalized configuration and a running [`neo4rs`]
//! driver: this crate binds a settings tree to a validated driver
//! configuration, opens the long-lived driver handle, and conditionally
//! wires health-check, metrics and object-mapping components on top of
//! it.
//!
//! ## What gets wired
//!
//! [`Bootstrap`] evaluates an ordered decision table exactly once at
//! startup:
//!
//! - a **driver** when a connection uri is configured and none was
//!   supplied externally;
//! - a **health indicator** over that driver, probing with a single
//!   retry on expired sessions (disable with
//!   [`Bootstrap::disable_health`]);
//! - a **metrics binder** (feature `metrics`) when a Prometheus registry
//!   is handed in and the pool settings enable metrics, bound in the
//!   background after a connectivity check;
//! - a **mapping session factory** (feature `mapping`) for serde-typed
//!   node access.
//!
//! Contradictory settings fail fast: username and kerberos ticket are
//! mutually exclusive, a custom-CA trust strategy requires an existing
//! certificate file, and unknown uri schemes are rejected. Connectivity
//! problems never abort startup, they surface as health status instead.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use neo4j_bootstrap::{Bootstrap, ConnectionSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ConnectionSettings::for_uri("neo4j://localhost:7687")
//!         .with_basic_auth("neo4j", "secret");
//!
//!     let components = Bootstrap::new(settings).build().await?;
//!
//!     if let Some(health) = &components.health {
//!         let report = health.check().await;
//!         println!("Neo4j is {:?}", report.status());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod wiring;

#[cfg(feature = "test-harness")]
pub mod harness;
#[cfg(feature = "mapping")]
pub mod mapping;

pub use config::{
    AuthToken, AuthenticationSettings, BoltScheme, ConnectionSettings, DriverSettings,
    LoadBalancingStrategy, PoolSettings, TrustPolicy, TrustSettings, TrustStrategy,
};
pub use driver::{Driver, DriverConfig, ResolverRegistry, ServerAddress};
pub use error::{BootstrapError, Result};
pub use health::{DriverHealthIndicator, Health, HealthIndicator, HealthStatus, ProbeExecutor, ProbeReport};
pub use logging::forward_driver_logs;
pub use wiring::{Bootstrap, Components, WiringDecision};

#[cfg(feature = "test-harness")]
pub use harness::TestHarness;
#[cfg(feature = "mapping")]
pub use mapping::{GraphEntity, MappingSession, SessionFactory};
#[cfg(feature = "metrics")]
pub use metrics::{bind_driver_metrics, bind_recorder_metrics};
pub use metrics::{DriverMetricsRecorder, MetricsSnapshot};
