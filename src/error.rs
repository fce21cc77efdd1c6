//! Error types for the onboarding service.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures of the read-only lookups consulted by the wizard.
///
/// None of these are fatal: callers degrade to "no enrichment data" and keep
/// the wizard navigable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    /// The lookup answered with a failure envelope.
    #[error("{resolver} unavailable: {reason}")]
    Unavailable { resolver: String, reason: String },

    #[error("{resolver} request failed: {reason}")]
    Transport { resolver: String, reason: String },

    #[error("Invalid response from {resolver}: {reason}")]
    InvalidResponse { resolver: String, reason: String },
}

impl ResolverError {
    /// Message suitable for inline display next to the affected step.
    pub fn display_message(&self) -> String {
        match self {
            Self::Unavailable { reason, .. } => reason.clone(),
            Self::Transport { reason, .. } | Self::InvalidResponse { reason, .. } => {
                format!("Não foi possível carregar os dados ({reason})")
            }
        }
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
