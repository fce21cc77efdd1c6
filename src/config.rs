//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Service configuration, read from `HUB_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Port the REST server listens on.
    pub port: u16,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Settings namespace the wizard state is stored under.
    pub user_id: String,
    /// Email of the signed-in user, preferred over the typed email as the
    /// org-chart lookup key.
    pub user_email: Option<String>,
    /// Base URL of the backend serving prefill and org-chart lookups.
    /// Resolvers are disabled when unset.
    pub resolver_base_url: Option<String>,
    /// Bearer token forwarded to the resolver backend.
    pub resolver_token: Option<SecretString>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/onboarding.db"),
            user_id: "default".to_string(),
            user_email: None,
            resolver_base_url: None,
            resolver_token: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match non_empty("HUB_ONBOARDING_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "HUB_ONBOARDING_PORT".to_string(),
                message: format!("{raw:?}: {e}"),
            })?,
            None => defaults.port,
        };

        let resolver_base_url = non_empty("HUB_RESOLVER_BASE_URL");
        if let Some(ref url) = resolver_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    key: "HUB_RESOLVER_BASE_URL".to_string(),
                    message: format!("{url:?} is not an http(s) URL"),
                });
            }
        }

        Ok(Self {
            port,
            db_path: non_empty("HUB_ONBOARDING_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            user_id: non_empty("HUB_ONBOARDING_USER_ID").unwrap_or(defaults.user_id),
            user_email: non_empty("HUB_ONBOARDING_USER_EMAIL").map(|e| e.to_lowercase()),
            resolver_base_url: resolver_base_url.map(|u| u.trim_end_matches('/').to_string()),
            resolver_token: non_empty("HUB_RESOLVER_TOKEN").map(SecretString::from),
        })
    }
}
