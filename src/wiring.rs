// Copyright 2025 Cowboy AI, LLC.

//! Conditional assembly of driver, health, metrics and mapping components

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ConnectionSettings;
use crate::driver::{Driver, DriverConfig, ResolverRegistry, ServerAddress};
use crate::error::Result;
use crate::health::{DriverHealthIndicator, HealthIndicator};

#[cfg(feature = "mapping")]
use crate::mapping::SessionFactory;
#[cfg(feature = "metrics")]
use prometheus_client::registry::Registry;
#[cfg(feature = "metrics")]
use std::sync::Mutex;

/// One row of the wiring decision table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiringDecision {
    /// The component the row is about
    pub component: &'static str,
    /// Whether the component will be created
    pub created: bool,
    /// Why it will or will not be created
    pub reason: String,
}

impl WiringDecision {
    fn new(component: &'static str, created: bool, reason: impl Into<String>) -> Self {
        Self {
            component,
            created,
            reason: reason.into(),
        }
    }
}

/// The components the bootstrap produced for the hosting application
pub struct Components {
    /// The long-lived driver handle, absent when no uri was configured
    /// and none was supplied
    pub driver: Option<Arc<Driver>>,
    /// Health indicator over the driver
    pub health: Option<Arc<DriverHealthIndicator>>,
    /// Object-mapping session factory
    #[cfg(feature = "mapping")]
    pub mapping: Option<SessionFactory>,
    decisions: Vec<WiringDecision>,
}

impl Components {
    /// The decision table as it was evaluated, in order
    pub fn decisions(&self) -> &[WiringDecision] {
        &self.decisions
    }
}

/// One-shot component assembly, evaluated once at application startup.
///
/// An explicit, ordered list of providers, each guarded by a predicate
/// over configuration presence, compiled-in features and prior
/// registrations. Startup-time configuration errors abort the affected
/// component; runtime connectivity shows up in the health indicator
/// instead of failing the bootstrap.
pub struct Bootstrap {
    settings: ConnectionSettings,
    resolvers: ResolverRegistry,
    external_driver: Option<Arc<Driver>>,
    health_enabled: bool,
    #[cfg(feature = "metrics")]
    metrics_registry: Option<Arc<Mutex<Registry>>>,
}

impl Bootstrap {
    /// Start a bootstrap over the given settings
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            resolvers: ResolverRegistry::new(),
            external_driver: None,
            health_enabled: true,
            #[cfg(feature = "metrics")]
            metrics_registry: None,
        }
    }

    /// Register a named address resolver the settings may refer to
    pub fn with_resolver<F>(mut self, name: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&ServerAddress) -> Vec<ServerAddress> + Send + Sync + 'static,
    {
        self.resolvers.register(name, resolver);
        self
    }

    /// Supply an existing driver; the bootstrap will not create its own
    pub fn with_driver(mut self, driver: Arc<Driver>) -> Self {
        self.external_driver = Some(driver);
        self
    }

    /// Switch the health indicator off
    pub fn disable_health(mut self) -> Self {
        self.health_enabled = false;
        self
    }

    /// Registry the driver metrics should be bound into
    #[cfg(feature = "metrics")]
    pub fn with_metrics_registry(mut self, registry: Arc<Mutex<Registry>>) -> Self {
        self.metrics_registry = Some(registry);
        self
    }

    #[cfg(feature = "metrics")]
    fn metrics_enabled_on_driver(&self) -> bool {
        match &self.external_driver {
            Some(driver) => driver.metrics().is_some(),
            None => self.settings.pool.metrics_enabled,
        }
    }

    /// Evaluate the decision table without performing any I/O.
    ///
    /// `build` acts on exactly this plan; tests exercise the table
    /// through here.
    pub fn plan(&self) -> Vec<WiringDecision> {
        let mut decisions = Vec::new();

        let uri_configured = self.settings.uri.is_some();
        let create_driver = self.external_driver.is_none() && uri_configured;
        let driver_available = self.external_driver.is_some() || create_driver;

        decisions.push(if self.external_driver.is_some() {
            WiringDecision::new("driver", false, "driver supplied externally")
        } else if create_driver {
            WiringDecision::new("driver", true, "connection uri configured")
        } else {
            WiringDecision::new("driver", false, "no connection uri configured")
        });

        decisions.push(if !driver_available {
            WiringDecision::new("health-indicator", false, "no driver available")
        } else if !self.health_enabled {
            WiringDecision::new("health-indicator", false, "disabled by configuration")
        } else {
            WiringDecision::new(
                "health-indicator",
                true,
                "driver available, non-blocking indicator preferred",
            )
        });

        #[cfg(feature = "metrics")]
        decisions.push(if !driver_available {
            WiringDecision::new("metrics-binder", false, "no driver available")
        } else if self.metrics_registry.is_none() {
            WiringDecision::new("metrics-binder", false, "no metrics registry supplied")
        } else if !self.metrics_enabled_on_driver() {
            WiringDecision::new("metrics-binder", false, "driver metrics disabled")
        } else {
            WiringDecision::new(
                "metrics-binder",
                true,
                "driver and registry available, metrics enabled",
            )
        });
        #[cfg(not(feature = "metrics"))]
        decisions.push(WiringDecision::new(
            "metrics-binder",
            false,
            "metrics support not compiled in",
        ));

        #[cfg(feature = "mapping")]
        decisions.push(if driver_available {
            WiringDecision::new("mapping-session-factory", true, "driver available")
        } else {
            WiringDecision::new("mapping-session-factory", false, "no driver available")
        });
        #[cfg(not(feature = "mapping"))]
        decisions.push(WiringDecision::new(
            "mapping-session-factory",
            false,
            "mapping support not compiled in",
        ));

        decisions
    }

    /// Act on the decision table and produce the components.
    ///
    /// Metrics binding is dispatched to a background task after a
    /// connectivity check so it never delays startup; its failures are
    /// logged, not propagated.
    pub async fn build(self) -> Result<Components> {
        let decisions = self.plan();
        for decision in &decisions {
            debug!(
                component = decision.component,
                created = decision.created,
                reason = %decision.reason,
                "Wiring decision"
            );
        }

        let decided = |component: &str| {
            decisions
                .iter()
                .find(|d| d.component == component)
                .is_some_and(|d| d.created)
        };

        let driver = if let Some(driver) = self.external_driver {
            Some(driver)
        } else if decided("driver") {
            let config = DriverConfig::assemble(&self.settings, &self.resolvers)?;
            Some(Arc::new(Driver::connect(config).await?))
        } else {
            None
        };

        let health = match (&driver, decided("health-indicator")) {
            (Some(driver), true) => {
                Some(Arc::new(HealthIndicator::new(Arc::clone(driver))))
            }
            _ => None,
        };

        #[cfg(feature = "metrics")]
        if decided("metrics-binder") {
            if let (Some(driver), Some(registry)) = (&driver, self.metrics_registry) {
                spawn_metrics_binding(Arc::clone(driver), registry);
            }
        }

        #[cfg(feature = "mapping")]
        let mapping = match (&driver, decided("mapping-session-factory")) {
            (Some(driver), true) => Some(SessionFactory::new(Arc::clone(driver))),
            _ => None,
        };

        if let Some(driver) = &driver {
            info!("Neo4j components wired for {}", driver.server_address());
        }

        Ok(Components {
            driver,
            health,
            #[cfg(feature = "mapping")]
            mapping,
            decisions,
        })
    }
}

/// Verify connectivity off the startup path, then bind the pool metrics
#[cfg(feature = "metrics")]
fn spawn_metrics_binding(driver: Arc<Driver>, registry: Arc<Mutex<Registry>>) {
    use tracing::warn;

    tokio::spawn(async move {
        match driver.verify_connectivity().await {
            Ok(()) => match registry.lock() {
                Ok(mut registry) => {
                    crate::metrics::bind_driver_metrics(&driver, &mut registry);
                }
                Err(_) => warn!("Metrics registry lock poisoned, driver metrics not bound"),
            },
            Err(e) => warn!(
                "Could not verify connection for {} and thus not bind to metrics: {}",
                driver.server_address(),
                e
            ),
        }
    });
}
