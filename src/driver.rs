// Copyright 2025 Cowboy AI, LLC.

//! Driver configuration assembly and the connected driver handle

use neo4rs::{ConfigBuilder, Graph, Query, Row};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{AuthToken, BoltScheme, ConnectionSettings, LoadBalancingStrategy, PoolSettings, TrustPolicy};
use crate::error::{BootstrapError, Result};
use crate::metrics::DriverMetricsRecorder;

/// A resolved bolt server address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    /// Host name or IP literal
    pub host: String,
    /// Bolt port (defaults to 7687)
    pub port: u16,
}

impl ServerAddress {
    /// Create an address from host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Callback resolving the configured address into the initial addresses
/// used by the routing driver
pub type AddressResolver = Arc<dyn Fn(&ServerAddress) -> Vec<ServerAddress> + Send + Sync>;

/// Named address resolvers, registered explicitly at configuration time.
///
/// The settings refer to a resolver by name; dynamic instantiation by
/// type name is deliberately not supported.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, AddressResolver>,
}

impl ResolverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver under the given name
    pub fn register<F>(&mut self, name: impl Into<String>, resolver: F)
    where
        F: Fn(&ServerAddress) -> Vec<ServerAddress> + Send + Sync + 'static,
    {
        self.resolvers.insert(name.into(), Arc::new(resolver));
    }

    /// Look up a resolver by name
    pub fn get(&self, name: &str) -> Option<&AddressResolver> {
        self.resolvers.get(name)
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("resolvers", &self.resolvers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The fully assembled, immutable driver configuration.
///
/// Assembly is a pure function of the settings: assembling the same
/// settings twice yields equal configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Scheme the uri was configured with
    pub scheme: BoltScheme,
    // Non-empty; assemble is the only constructor
    addresses: Vec<ServerAddress>,
    /// The resolved credential
    pub auth: AuthToken,
    /// Effective encryption flag; for `+s`/`+ssc` schemes the scheme
    /// wins over the explicit setting
    pub encrypted: bool,
    /// Effective trust policy
    pub trust: TrustPolicy,
    /// Database sessions are opened against
    pub database: String,
    /// Pool tuning carried over verbatim
    pub pool: PoolSettings,
    /// Socket connection timeout
    pub connection_timeout: Duration,
    /// Maximum time transactions are allowed to retry
    pub max_transaction_retry_time: Duration,
    /// Load balancing strategy for the routing driver
    pub load_balancing_strategy: LoadBalancingStrategy,
    /// Rows fetched per batch
    pub fetch_size: u32,
}

impl DriverConfig {
    /// Assemble settings into a driver configuration.
    ///
    /// Validates the scheme, resolves the credential and the trust
    /// policy, and applies the named address resolver when one is
    /// configured. Simple schemes (`bolt`, `neo4j`) honor the explicit
    /// encryption and trust settings; the `+s`/`+ssc` variants carry
    /// their security policy in the scheme and the explicit settings are
    /// not reapplied.
    pub fn assemble(settings: &ConnectionSettings, resolvers: &ResolverRegistry) -> Result<Self> {
        let uri = settings.uri.as_deref().ok_or_else(|| {
            BootstrapError::invalid_configuration(
                "neo4j.uri",
                "",
                "a connection uri is required to create a driver",
            )
        })?;

        let (scheme, address) = parse_uri(uri)?;

        let auth = settings.authentication.to_auth_token()?;

        let (encrypted, trust) = if scheme.is_simple() {
            (settings.driver.encrypted, settings.driver.trust.to_trust_policy()?)
        } else if scheme.accepts_self_signed() {
            // Self-signed variants cannot verify anything beyond the
            // handshake itself.
            (
                true,
                TrustPolicy::TrustAll {
                    hostname_verification_enabled: false,
                },
            )
        } else {
            (
                true,
                TrustPolicy::TrustSystemCa {
                    hostname_verification_enabled: true,
                },
            )
        };

        let addresses = match settings.driver.resolver.as_deref() {
            None => vec![address],
            Some(name) => {
                let resolver = resolvers.get(name).ok_or_else(|| {
                    BootstrapError::invalid_configuration(
                        "neo4j.driver.resolver",
                        name,
                        "no resolver registered under this name",
                    )
                })?;
                let resolved = resolver(&address);
                if resolved.is_empty() {
                    return Err(BootstrapError::invalid_configuration(
                        "neo4j.driver.resolver",
                        name,
                        "resolver returned no addresses",
                    ));
                }
                resolved
            }
        };

        Ok(Self {
            scheme,
            addresses,
            auth,
            encrypted,
            trust,
            database: settings.database().to_string(),
            pool: settings.pool.clone(),
            connection_timeout: settings.driver.connection_timeout(),
            max_transaction_retry_time: settings.driver.max_transaction_retry_time(),
            load_balancing_strategy: settings.driver.load_balancing_strategy,
            fetch_size: settings.driver.fetch_size,
        })
    }

    /// Whether traffic to the server is encrypted
    pub fn encryption_enabled(&self) -> bool {
        self.encrypted
    }

    /// Initial server addresses, after the optional resolver ran.
    /// Never empty.
    pub fn addresses(&self) -> &[ServerAddress] {
        &self.addresses
    }

    /// The address the driver connects to first
    pub fn server_address(&self) -> &ServerAddress {
        &self.addresses[0]
    }
}

fn parse_uri(uri: &str) -> Result<(BoltScheme, ServerAddress)> {
    let (scheme_str, rest) = uri.split_once("://").ok_or_else(|| {
        BootstrapError::invalid_configuration(
            "neo4j.uri",
            uri,
            "expected '<scheme>://<host>[:<port>]'",
        )
    })?;

    let scheme: BoltScheme = scheme_str.parse()?;

    let authority = rest.split(['/', '?']).next().unwrap_or_default();

    // IPv6 literals are bracketed, the port separator comes after ']'
    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (inner, after) = bracketed.split_once(']').ok_or_else(|| {
            BootstrapError::invalid_configuration("neo4j.uri", uri, "unterminated '[' in host")
        })?;
        if inner.is_empty() {
            return Err(BootstrapError::invalid_configuration(
                "neo4j.uri",
                uri,
                "host must not be empty",
            ));
        }
        let port = match after.strip_prefix(':') {
            Some(port) => parse_port(uri, port)?,
            None if after.is_empty() => 7687,
            None => {
                return Err(BootstrapError::invalid_configuration(
                    "neo4j.uri",
                    uri,
                    "unexpected characters after the bracketed host",
                ));
            }
        };
        (format!("[{inner}]"), port)
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), parse_port(uri, port)?),
            None => (authority.to_string(), 7687),
        }
    };

    if host.is_empty() {
        return Err(BootstrapError::invalid_configuration(
            "neo4j.uri",
            uri,
            "host must not be empty",
        ));
    }

    Ok((scheme, ServerAddress::new(host, port)))
}

fn parse_port(uri: &str, port: &str) -> Result<u16> {
    port.parse().map_err(|_| {
        BootstrapError::invalid_configuration(
            "neo4j.uri",
            uri,
            format!("'{port}' is not a valid port"),
        )
    })
}

/// A connected Neo4j driver handle.
///
/// Owns the underlying connection pool together with the configuration
/// it was assembled from; the hosting application keeps exactly one of
/// these per database and drops it at shutdown.
pub struct Driver {
    graph: Arc<Graph>,
    config: DriverConfig,
    recorder: Option<Arc<DriverMetricsRecorder>>,
}

impl Driver {
    /// Connect using the given assembled configuration.
    ///
    /// The underlying pool is lazy, so a cheap `RETURN 1` ping runs
    /// within the configured connection timeout to fail fast on an
    /// unreachable server instead of hanging on first use.
    pub async fn connect(config: DriverConfig) -> Result<Self> {
        let address = config.server_address();
        info!("Connecting to Neo4j at {}://{}", config.scheme.as_str(), address);

        let mut builder = ConfigBuilder::default()
            .uri(&address.to_string())
            .db(config.database.as_str())
            .fetch_size(config.fetch_size as usize)
            .max_connections(config.pool.max_connection_pool_size as usize);

        match &config.auth {
            AuthToken::None => {}
            AuthToken::Basic {
                username, password, ..
            } => {
                builder = builder.user(username).password(password);
            }
            AuthToken::Kerberos(_) => {
                return Err(BootstrapError::invalid_configuration(
                    "neo4j.authentication",
                    "kerberos-ticket",
                    "the bolt transport has no kerberos support, configure username and password",
                ));
            }
        }

        let graph = Graph::connect(builder.build()?).await?;

        let timeout = config.connection_timeout;
        match tokio::time::timeout(timeout, graph.run(Query::new("RETURN 1".to_string()))).await {
            Err(_) => {
                return Err(BootstrapError::Connectivity(format!(
                    "no response from {} within {:?}",
                    address, timeout
                )))
            }
            Ok(Err(e)) => return Err(BootstrapError::classify(e)),
            Ok(Ok(())) => {}
        }

        let recorder = config
            .pool
            .metrics_enabled
            .then(|| Arc::new(DriverMetricsRecorder::new(config.pool.max_connection_pool_size)));

        debug!("Driver ready for database '{}'", config.database);

        Ok(Self {
            graph: Arc::new(graph),
            config,
            recorder,
        })
    }

    /// Assemble and connect in one step
    pub async fn from_settings(
        settings: &ConnectionSettings,
        resolvers: &ResolverRegistry,
    ) -> Result<Self> {
        let config = DriverConfig::assemble(settings, resolvers)?;
        Self::connect(config).await
    }

    /// Run a query, discarding any results
    pub async fn run(&self, query: Query) -> Result<()> {
        let _session = self.acquire();
        self.graph.run(query).await.map_err(|e| {
            self.record_failure();
            BootstrapError::classify(e)
        })
    }

    /// Execute a query and return its first row, if any.
    ///
    /// The wired components only ever inspect a single row; callers
    /// needing full streaming go through [`Driver::graph`] directly.
    pub async fn execute(&self, query: Query) -> Result<Option<Row>> {
        let _session = self.acquire();
        let first_row = async {
            let mut rows = self.graph.execute(query).await?;
            rows.next().await
        };
        first_row.await.map_err(|e| {
            self.record_failure();
            BootstrapError::classify(e)
        })
    }

    /// Verify that the server behind this driver is reachable
    pub async fn verify_connectivity(&self) -> Result<()> {
        self.run(Query::new("RETURN 1".to_string())).await
    }

    /// The metrics recorder, present only when pool metrics are enabled
    pub fn metrics(&self) -> Option<&Arc<DriverMetricsRecorder>> {
        self.recorder.as_ref()
    }

    /// The configuration this driver was built from
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The address of the server this driver connects to
    pub fn server_address(&self) -> &ServerAddress {
        self.config.server_address()
    }

    /// Get the underlying Neo4j graph connection
    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    fn acquire(&self) -> Option<crate::metrics::AcquiredConnection> {
        self.recorder.as_ref().map(DriverMetricsRecorder::acquire)
    }

    fn record_failure(&self) {
        if let Some(recorder) = &self.recorder {
            recorder.record_failure();
        }
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("address", self.config.server_address())
            .field("database", &self.config.database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TrustSettings, TrustStrategy};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn settings(uri: &str) -> ConnectionSettings {
        ConnectionSettings::for_uri(uri)
    }

    #[test]
    fn assembly_requires_a_uri() {
        let result = DriverConfig::assemble(&ConnectionSettings::default(), &ResolverRegistry::new());
        assert!(matches!(
            result,
            Err(BootstrapError::InvalidConfiguration { .. })
        ));
    }

    #[test_case("bolt://localhost:7687", BoltScheme::Bolt, "localhost", 7687)]
    #[test_case("neo4j://graph.example.com", BoltScheme::Neo4j, "graph.example.com", 7687)]
    #[test_case("bolt+ssc://10.0.0.5:17687", BoltScheme::BoltSsc, "10.0.0.5", 17687)]
    #[test_case("bolt://[::1]", BoltScheme::Bolt, "[::1]", 7687)]
    #[test_case("neo4j://[2001:db8::2]:7473", BoltScheme::Neo4j, "[2001:db8::2]", 7473)]
    fn uris_parse_into_scheme_and_address(uri: &str, scheme: BoltScheme, host: &str, port: u16) {
        let config = DriverConfig::assemble(&settings(uri), &ResolverRegistry::new()).unwrap();
        assert_eq!(config.scheme, scheme);
        assert_eq!(config.server_address(), &ServerAddress::new(host, port));
    }

    #[test_case("bolt://[::1"; "unterminated bracket")]
    #[test_case("bolt://[]:7687"; "empty bracketed host")]
    #[test_case("bolt://[::1]junk"; "trailing characters after bracket")]
    fn malformed_ipv6_authorities_are_rejected(uri: &str) {
        let result = DriverConfig::assemble(&settings(uri), &ResolverRegistry::new());
        assert!(matches!(
            result,
            Err(BootstrapError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let result = DriverConfig::assemble(
            &settings("http://localhost:7474"),
            &ResolverRegistry::new(),
        );
        assert!(matches!(result, Err(BootstrapError::UnsupportedScheme(s)) if s == "http"));
    }

    #[test]
    fn simple_scheme_honors_explicit_encryption() {
        let mut s = settings("bolt://localhost:7687");
        s.driver.encrypted = false;
        let config = DriverConfig::assemble(&s, &ResolverRegistry::new()).unwrap();
        assert!(!config.encryption_enabled());

        s.driver.encrypted = true;
        let config = DriverConfig::assemble(&s, &ResolverRegistry::new()).unwrap();
        assert!(config.encryption_enabled());
    }

    #[test]
    fn advanced_scheme_wins_over_explicit_encryption() {
        let mut s = settings("bolt+s://host:7687");
        s.driver.encrypted = false;
        let config = DriverConfig::assemble(&s, &ResolverRegistry::new()).unwrap();
        assert!(config.encryption_enabled());
    }

    #[test]
    fn self_signed_scheme_pins_trust_all() {
        let mut s = settings("neo4j+ssc://host");
        // Contradictory trust settings are not reapplied, not even
        // validated: the scheme decides.
        s.driver.trust = TrustSettings {
            strategy: TrustStrategy::TrustCustomCaSignedCertificates,
            cert_file: None,
            hostname_verification_enabled: true,
        };
        let config = DriverConfig::assemble(&s, &ResolverRegistry::new()).unwrap();
        assert_eq!(
            config.trust,
            TrustPolicy::TrustAll {
                hostname_verification_enabled: false
            }
        );
    }

    #[test]
    fn secure_scheme_uses_system_trust_with_hostname_checks() {
        let config =
            DriverConfig::assemble(&settings("neo4j+s://host"), &ResolverRegistry::new()).unwrap();
        assert!(config.encryption_enabled());
        assert_eq!(
            config.trust,
            TrustPolicy::TrustSystemCa {
                hostname_verification_enabled: true
            }
        );
    }

    #[test]
    fn simple_scheme_still_validates_trust_settings() {
        let mut s = settings("bolt://localhost");
        s.driver.trust.strategy = TrustStrategy::TrustCustomCaSignedCertificates;
        assert!(DriverConfig::assemble(&s, &ResolverRegistry::new()).is_err());
    }

    #[test]
    fn named_resolver_is_applied() {
        let mut s = settings("neo4j://cluster.internal:7687");
        s.driver.resolver = Some("static-seeds".to_string());

        let mut resolvers = ResolverRegistry::new();
        resolvers.register("static-seeds", |address| {
            vec![
                ServerAddress::new("core1.internal", address.port),
                ServerAddress::new("core2.internal", address.port),
            ]
        });

        let config = DriverConfig::assemble(&s, &resolvers).unwrap();
        assert_eq!(config.addresses().len(), 2);
        assert_eq!(config.server_address(), config.addresses().first().unwrap());
        assert_eq!(config.server_address(), &ServerAddress::new("core1.internal", 7687));
    }

    #[test]
    fn unknown_resolver_name_is_rejected() {
        let mut s = settings("neo4j://cluster.internal");
        s.driver.resolver = Some("missing".to_string());
        let result = DriverConfig::assemble(&s, &ResolverRegistry::new());
        assert!(matches!(
            result,
            Err(BootstrapError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn assembly_is_idempotent() {
        let s = settings("neo4j://graph.example.com:7687")
            .with_basic_auth("jane", "secret")
            .with_database("movies");
        let resolvers = ResolverRegistry::new();
        let first = DriverConfig::assemble(&s, &resolvers).unwrap();
        let second = DriverConfig::assemble(&s, &resolvers).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn pool_and_timing_settings_are_carried_over() {
        let mut s = settings("bolt://localhost");
        s.pool.max_connection_pool_size = 7;
        s.pool.idle_time_before_connection_test_millis = Some(200);
        s.driver.connection_timeout_millis = 1500;
        s.driver.fetch_size = 50;

        let config = DriverConfig::assemble(&s, &ResolverRegistry::new()).unwrap();
        assert_eq!(config.pool.max_connection_pool_size, 7);
        assert_eq!(
            config.pool.idle_time_before_connection_test(),
            Some(Duration::from_millis(200))
        );
        assert_eq!(config.connection_timeout, Duration::from_millis(1500));
        assert_eq!(config.fetch_size, 50);
    }
}
