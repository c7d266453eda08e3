// Copyright 2025 Cowboy AI, LLC.

//! Connection settings schema and credential/trust resolution

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{BootstrapError, Result};

/// Connection schemes understood by the bolt transport.
///
/// The "simple" schemes (`bolt`, `neo4j`) leave encryption and trust to
/// the explicit driver settings; the `+s`/`+ssc` variants carry the
/// security policy in the scheme itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoltScheme {
    /// Plain bolt, security taken from the driver settings
    Bolt,
    /// Bolt with full certificate checks
    BoltS,
    /// Bolt with self-signed certificates accepted
    BoltSsc,
    /// Routing scheme, security taken from the driver settings
    Neo4j,
    /// Routing with full certificate checks
    Neo4jS,
    /// Routing with self-signed certificates accepted
    Neo4jSsc,
}

impl BoltScheme {
    /// All scheme strings the assembler accepts
    pub const SUPPORTED: [&'static str; 6] =
        ["bolt", "bolt+s", "bolt+ssc", "neo4j", "neo4j+s", "neo4j+ssc"];

    /// True for `bolt` and `neo4j`, the schemes that honor explicit
    /// encryption and trust settings
    pub fn is_simple(&self) -> bool {
        matches!(self, BoltScheme::Bolt | BoltScheme::Neo4j)
    }

    /// True when the scheme itself mandates encrypted traffic
    pub fn implies_encryption(&self) -> bool {
        !self.is_simple()
    }

    /// True for the `+ssc` variants, which accept self-signed
    /// certificates and therefore pin the trust policy to trust-all
    pub fn accepts_self_signed(&self) -> bool {
        matches!(self, BoltScheme::BoltSsc | BoltScheme::Neo4jSsc)
    }

    /// True for the routing schemes
    pub fn is_routing(&self) -> bool {
        matches!(
            self,
            BoltScheme::Neo4j | BoltScheme::Neo4jS | BoltScheme::Neo4jSsc
        )
    }

    /// The scheme as it appears in a connection URI
    pub fn as_str(&self) -> &'static str {
        match self {
            BoltScheme::Bolt => "bolt",
            BoltScheme::BoltS => "bolt+s",
            BoltScheme::BoltSsc => "bolt+ssc",
            BoltScheme::Neo4j => "neo4j",
            BoltScheme::Neo4jS => "neo4j+s",
            BoltScheme::Neo4jSsc => "neo4j+ssc",
        }
    }
}

impl FromStr for BoltScheme {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bolt" => Ok(BoltScheme::Bolt),
            "bolt+s" => Ok(BoltScheme::BoltS),
            "bolt+ssc" => Ok(BoltScheme::BoltSsc),
            "neo4j" => Ok(BoltScheme::Neo4j),
            "neo4j+s" => Ok(BoltScheme::Neo4jS),
            "neo4j+ssc" => Ok(BoltScheme::Neo4jSsc),
            other => Err(BootstrapError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// A resolved authentication credential.
///
/// Settings resolve to exactly one of these; contradictory combinations
/// are rejected before a driver is ever built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthToken {
    /// Connect without credentials
    None,
    /// Username/password, optionally scoped to a realm
    Basic {
        /// Login of the connecting user
        username: String,
        /// Password of the connecting user
        password: String,
        /// Authentication realm, `None` for the server default
        realm: Option<String>,
    },
    /// A base64 encoded kerberos ticket
    Kerberos(String),
}

/// Authentication fields bound from external configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationSettings {
    /// The login of the user connecting to the database
    pub username: Option<String>,
    /// The password of the user connecting to the database
    pub password: Option<String>,
    /// The realm to connect to
    pub realm: Option<String>,
    /// A kerberos ticket for connecting to the database.
    /// Mutually exclusive with a given username.
    pub kerberos_ticket: Option<String>,
}

fn is_present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

impl AuthenticationSettings {
    /// Resolve the four fields into exactly one credential
    pub fn to_auth_token(&self) -> Result<AuthToken> {
        let has_username = is_present(&self.username);
        let has_password = is_present(&self.password);
        let has_ticket = is_present(&self.kerberos_ticket);

        if has_username && has_ticket {
            return Err(BootstrapError::invalid_configuration(
                "neo4j.authentication",
                format!(
                    "username={},kerberos-ticket={}",
                    self.username.as_deref().unwrap_or_default(),
                    self.kerberos_ticket.as_deref().unwrap_or_default()
                ),
                "cannot specify both username and kerberos ticket",
            ));
        }

        if has_username && has_password {
            return Ok(AuthToken::Basic {
                username: self.username.clone().unwrap_or_default(),
                password: self.password.clone().unwrap_or_default(),
                realm: self.realm.clone().filter(|r| !r.is_empty()),
            });
        }

        if has_ticket {
            return Ok(AuthToken::Kerberos(
                self.kerberos_ticket.clone().unwrap_or_default(),
            ));
        }

        Ok(AuthToken::None)
    }
}

/// Strategy for validating the server certificate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustStrategy {
    /// Accept every certificate the server presents
    #[default]
    TrustAllCertificates,
    /// Accept certificates signed by a configured CA certificate file
    TrustCustomCaSignedCertificates,
    /// Accept certificates the system trust store vouches for
    TrustSystemCaSignedCertificates,
}

/// Trust configuration bound from external configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustSettings {
    /// The strategy to use
    pub strategy: TrustStrategy,
    /// The certificate file backing the custom CA strategy
    pub cert_file: Option<PathBuf>,
    /// Flag, if hostname verification is used
    pub hostname_verification_enabled: bool,
}

/// A validated trust policy, ready to hand to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Accept all certificates
    TrustAll {
        /// Whether the server hostname is checked against the certificate
        hostname_verification_enabled: bool,
    },
    /// Accept certificates signed by the given CA certificate
    TrustCustomCa {
        /// Path to an existing CA certificate file
        cert_file: PathBuf,
        /// Whether the server hostname is checked against the certificate
        hostname_verification_enabled: bool,
    },
    /// Defer to the system trust store
    TrustSystemCa {
        /// Whether the server hostname is checked against the certificate
        hostname_verification_enabled: bool,
    },
}

impl TrustPolicy {
    /// Whether hostname verification is part of this policy
    pub fn hostname_verification_enabled(&self) -> bool {
        match self {
            TrustPolicy::TrustAll {
                hostname_verification_enabled,
            }
            | TrustPolicy::TrustCustomCa {
                hostname_verification_enabled,
                ..
            }
            | TrustPolicy::TrustSystemCa {
                hostname_verification_enabled,
            } => *hostname_verification_enabled,
        }
    }
}

impl TrustSettings {
    /// Validate the settings into a trust policy.
    ///
    /// The custom CA strategy requires `cert_file` to point at an
    /// existing regular file.
    pub fn to_trust_policy(&self) -> Result<TrustPolicy> {
        let hostname_verification_enabled = self.hostname_verification_enabled;

        match self.strategy {
            TrustStrategy::TrustAllCertificates => Ok(TrustPolicy::TrustAll {
                hostname_verification_enabled,
            }),
            TrustStrategy::TrustSystemCaSignedCertificates => Ok(TrustPolicy::TrustSystemCa {
                hostname_verification_enabled,
            }),
            TrustStrategy::TrustCustomCaSignedCertificates => {
                let cert_file = self.cert_file.as_ref().filter(|f| f.is_file()).ok_or_else(
                    || {
                        BootstrapError::invalid_configuration(
                            "neo4j.driver.trust",
                            "trust-custom-ca-signed-certificates",
                            "configured trust strategy requires a certificate file",
                        )
                    },
                )?;
                Ok(TrustPolicy::TrustCustomCa {
                    cert_file: cert_file.clone(),
                    hostname_verification_enabled,
                })
            }
        }
    }
}

/// Connection pool tuning.
///
/// All fields are independently optional with defaults matching the
/// upstream driver; durations are configured in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Flag, if driver metrics are collected
    pub metrics_enabled: bool,
    /// Flag, if leaked session logging is enabled
    pub log_leaked_sessions: bool,
    /// The maximum amount of connections in the pool towards a single database
    pub max_connection_pool_size: u32,
    /// Connections idle longer than this are tested before reuse
    pub idle_time_before_connection_test_millis: Option<u64>,
    /// Connections older than this are closed and removed from the pool
    pub max_connection_lifetime_millis: u64,
    /// Acquisition of new connections is attempted for at most this long
    pub connection_acquisition_timeout_millis: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            log_leaked_sessions: false,
            max_connection_pool_size: 100,
            idle_time_before_connection_test_millis: None,
            max_connection_lifetime_millis: 60 * 60 * 1000,
            connection_acquisition_timeout_millis: 60 * 1000,
        }
    }
}

impl PoolSettings {
    /// Idle liveness-check threshold, if one is configured
    pub fn idle_time_before_connection_test(&self) -> Option<Duration> {
        self.idle_time_before_connection_test_millis
            .map(Duration::from_millis)
    }

    /// Maximum connection lifetime
    pub fn max_connection_lifetime(&self) -> Duration {
        Duration::from_millis(self.max_connection_lifetime_millis)
    }

    /// Connection acquisition timeout
    pub fn connection_acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_acquisition_timeout_millis)
    }
}

/// Load balancing strategy for the routing driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancingStrategy {
    /// Spread requests evenly over the routing table
    RoundRobin,
    /// Prefer the server with the fewest active connections
    #[default]
    LeastConnected,
}

/// Detailed driver behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Flag, if the driver should use encrypted traffic.
    /// Ignored for `+s`/`+ssc` schemes, where the scheme decides.
    pub encrypted: bool,
    /// How to determine the authenticity of the server certificate
    pub trust: TrustSettings,
    /// Socket connection timeout in milliseconds
    pub connection_timeout_millis: u64,
    /// Maximum time transactions are allowed to retry, in milliseconds
    pub max_transaction_retry_time_millis: u64,
    /// Load balancing strategy for the routing driver
    pub load_balancing_strategy: LoadBalancingStrategy,
    /// Number of rows fetched per batch from the server
    pub fetch_size: u32,
    /// Name of a registered address resolver for the routing driver
    pub resolver: Option<String>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            encrypted: true,
            trust: TrustSettings::default(),
            connection_timeout_millis: 5 * 1000,
            max_transaction_retry_time_millis: 30 * 1000,
            load_balancing_strategy: LoadBalancingStrategy::default(),
            fetch_size: 200,
            resolver: None,
        }
    }
}

impl DriverSettings {
    /// Socket connection timeout
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_millis)
    }

    /// Maximum transaction retry time
    pub fn max_transaction_retry_time(&self) -> Duration {
        Duration::from_millis(self.max_transaction_retry_time_millis)
    }
}

/// Externalized Neo4j connection settings.
///
/// Constructed once at application start, immutable thereafter, and
/// consumed exactly once to assemble a driver configuration. A driver is
/// only created when `uri` is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// The uri the driver should connect to, e.g. `bolt://localhost:7687`
    pub uri: Option<String>,
    /// The database to open sessions against (defaults to "neo4j")
    pub database: Option<String>,
    /// The authentication the driver is supposed to use
    pub authentication: AuthenticationSettings,
    /// The configuration of the connection pool
    pub pool: PoolSettings,
    /// Detailed configuration of the driver
    pub driver: DriverSettings,
}

impl ConnectionSettings {
    /// Create settings for the given uri, everything else defaulted
    pub fn for_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Set basic credentials
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.authentication.username = Some(username.into());
        self.authentication.password = Some(password.into());
        self
    }

    /// Set the database name
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Get the database name (defaults to "neo4j" if not set)
    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or("neo4j")
    }

    /// Bind settings from `NEO4J_URI`, `NEO4J_USERNAME`, `NEO4J_PASSWORD`
    /// and `NEO4J_DATABASE` environment variables
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.uri = std::env::var("NEO4J_URI").ok().filter(|v| !v.is_empty());
        settings.database = std::env::var("NEO4J_DATABASE").ok().filter(|v| !v.is_empty());
        settings.authentication.username =
            std::env::var("NEO4J_USERNAME").ok().filter(|v| !v.is_empty());
        settings.authentication.password =
            std::env::var("NEO4J_PASSWORD").ok().filter(|v| !v.is_empty());
        settings
    }
}
