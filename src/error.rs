// Copyright 2025 Cowboy AI, LLC.

//! Error types for driver bootstrapping

use thiserror::Error;

/// Result type for bootstrap operations
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Errors that can occur while binding settings or talking to Neo4j
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// A configuration property is invalid or contradicts another one.
    /// Raised at startup and never recovered.
    #[error("invalid value '{value}' for '{property}': {reason}")]
    InvalidConfiguration {
        /// The offending property, in dotted notation
        property: String,
        /// The rejected value as it was configured
        value: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The connection URI carries a scheme outside the supported set
    #[error("'{0}' is not a supported scheme")]
    UnsupportedScheme(String),

    /// The server could not be reached or refused the probe.
    /// Surfaced as health status, not fatal to startup.
    #[error("connection error: {0}")]
    Connectivity(String),

    /// The routing session has expired. Recovered locally by a
    /// single retry before being reported as down.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// Neo4j driver error
    #[error("Neo4j database error: {0}")]
    Database(#[from] neo4rs::Error),
}

impl BootstrapError {
    /// Build an `InvalidConfiguration` error without the call-site noise
    pub fn invalid_configuration(
        property: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfiguration {
            property: property.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Classify a raw driver error into the bootstrap taxonomy.
    ///
    /// The driver reports server failures with their Neo4j status code in
    /// the rendered message; an expired routing session is the only error
    /// recovered locally, everything else counts as a connectivity
    /// failure.
    pub fn classify(source: neo4rs::Error) -> Self {
        let rendered = source.to_string();
        if rendered.contains("SessionExpired") {
            Self::SessionExpired(rendered)
        } else {
            Self::Connectivity(rendered)
        }
    }

    /// True when a single local retry is allowed for this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }
}
