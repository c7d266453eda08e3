// Copyright 2025 Cowboy AI, LLC.

//! Health probe with a single retry on expired sessions

use async_trait::async_trait;
use neo4rs::Query;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::driver::Driver;
use crate::error::{BootstrapError, Result};

/// Up/Down status of the Neo4j dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// The server answered the probe
    Up,
    /// The probe failed, detail carries the error
    Down,
}

/// Health report for an operations endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Health {
    status: HealthStatus,
    details: BTreeMap<String, String>,
}

impl Health {
    fn new(status: HealthStatus) -> Self {
        Self {
            status,
            details: BTreeMap::new(),
        }
    }

    fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// The overall status
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    /// A single structured detail
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }

    /// All structured details, ordered by key
    pub fn details(&self) -> &BTreeMap<String, String> {
        &self.details
    }
}

/// What a successful probe learned about the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Server version string, e.g. "4.4.12"
    pub server_version: String,
    /// Address the probe ran against
    pub server_address: String,
    /// Database name, when the server reports one
    pub database: Option<String>,
}

/// The query half of the health check, separated out so the retry policy
/// can be exercised without a server
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    /// Run one probe round trip and describe the server
    async fn run_probe(&self) -> Result<ProbeReport>;
}

#[async_trait]
impl<E: ProbeExecutor> ProbeExecutor for Arc<E> {
    async fn run_probe(&self) -> Result<ProbeReport> {
        self.as_ref().run_probe().await
    }
}

/// Statement used to verify Neo4j is up and to pull the server version
const PROBE_CYPHER: &str =
    "CALL dbms.components() YIELD name, versions, edition \
     RETURN name, versions[0] AS version, edition";

#[async_trait]
impl ProbeExecutor for Driver {
    /// Probes over this driver run against the write-capable pool so Up
    /// means the server accepts all workloads
    async fn run_probe(&self) -> Result<ProbeReport> {
        let row = self
            .execute(Query::new(PROBE_CYPHER.to_string()))
            .await?
            .ok_or_else(|| {
                BootstrapError::Connectivity("server returned no component information".to_string())
            })?;

        let server_version: String = row.get("version").unwrap_or_default();

        Ok(ProbeReport {
            server_version,
            server_address: self.server_address().to_string(),
            database: Some(self.config().database.clone()),
        })
    }
}

/// Health indicator over any probe executor.
///
/// Two attempts at most: an expired session is retried exactly once,
/// every other failure (and a second failure of any kind) reports Down
/// with the error attached. The async `check` is the primary,
/// non-blocking variant; `check_blocking` runs the identical contract
/// for synchronous callers.
#[derive(Debug)]
pub struct HealthIndicator<E> {
    executor: E,
}

/// Indicator over a shared driver handle
pub type DriverHealthIndicator = HealthIndicator<Arc<Driver>>;

impl<E: ProbeExecutor> HealthIndicator<E> {
    /// Create an indicator over the given executor
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Probe the server and report Up/Down with structured detail
    pub async fn check(&self) -> Health {
        let report = match self.executor.run_probe().await {
            Err(e) if e.is_retryable() => {
                warn!("Neo4j session has expired, retrying one single time to retrieve server health");
                self.executor.run_probe().await
            }
            outcome => outcome,
        };

        match report {
            Ok(report) => {
                let health = Health::new(HealthStatus::Up).with_detail(
                    "server",
                    format!("{}@{}", report.server_version, report.server_address),
                );
                match report.database.filter(|d| !d.is_empty()) {
                    Some(database) => health.with_detail("database", database),
                    None => health,
                }
            }
            Err(e) => Health::new(HealthStatus::Down).with_detail("error", e.to_string()),
        }
    }

    /// Blocking facade over [`HealthIndicator::check`]
    pub fn check_blocking(&self) -> Health {
        futures::executor::block_on(self.check())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedExecutor {
        responses: Mutex<VecDeque<Result<ProbeReport>>>,
        probes: AtomicUsize,
    }

    impl ScriptedExecutor {
        fn new(responses: Vec<Result<ProbeReport>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                probes: AtomicUsize::new(0),
            }
        }

        fn probes(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProbeExecutor for ScriptedExecutor {
        async fn run_probe(&self) -> Result<ProbeReport> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("probe called more often than scripted")
        }
    }

    fn report() -> ProbeReport {
        ProbeReport {
            server_version: "4.4.12".to_string(),
            server_address: "localhost:7687".to_string(),
            database: Some("neo4j".to_string()),
        }
    }

    #[tokio::test]
    async fn first_attempt_success_reports_up() {
        let executor = ScriptedExecutor::new(vec![Ok(report())]);
        let indicator = HealthIndicator::new(executor);

        let health = indicator.check().await;
        assert_eq!(health.status(), HealthStatus::Up);
        assert_eq!(health.detail("server"), Some("4.4.12@localhost:7687"));
        assert_eq!(health.detail("database"), Some("neo4j"));
        assert_eq!(indicator.executor.probes(), 1);
    }

    #[tokio::test]
    async fn expired_session_is_retried_exactly_once() {
        let executor = ScriptedExecutor::new(vec![
            Err(BootstrapError::SessionExpired("routing table stale".into())),
            Ok(report()),
        ]);
        let indicator = HealthIndicator::new(executor);

        let health = indicator.check().await;
        assert_eq!(health.status(), HealthStatus::Up);
        assert_eq!(indicator.executor.probes(), 2);
    }

    #[tokio::test]
    async fn second_expiry_reports_down() {
        let executor = ScriptedExecutor::new(vec![
            Err(BootstrapError::SessionExpired("first".into())),
            Err(BootstrapError::SessionExpired("second".into())),
        ]);
        let indicator = HealthIndicator::new(executor);

        let health = indicator.check().await;
        assert_eq!(health.status(), HealthStatus::Down);
        assert!(health.detail("error").unwrap().contains("second"));
        assert_eq!(indicator.executor.probes(), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let executor = ScriptedExecutor::new(vec![Err(BootstrapError::Connectivity(
            "connection refused".into(),
        ))]);
        let indicator = HealthIndicator::new(executor);

        let health = indicator.check().await;
        assert_eq!(health.status(), HealthStatus::Down);
        assert!(health.detail("error").unwrap().contains("connection refused"));
        assert_eq!(indicator.executor.probes(), 1);
    }

    #[tokio::test]
    async fn missing_database_name_leaves_out_the_detail() {
        let mut no_database = report();
        no_database.database = None;
        let executor = ScriptedExecutor::new(vec![Ok(no_database)]);
        let indicator = HealthIndicator::new(executor);

        let health = indicator.check().await;
        assert_eq!(health.status(), HealthStatus::Up);
        assert_eq!(health.detail("database"), None);
    }

    #[test]
    fn blocking_facade_follows_the_same_contract() {
        let executor = ScriptedExecutor::new(vec![Ok(report())]);
        let indicator = HealthIndicator::new(executor);

        let health = indicator.check_blocking();
        assert_eq!(health.status(), HealthStatus::Up);
    }
}
