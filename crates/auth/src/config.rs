//! Auth core configuration.
//!
//! Components receive an explicit `AuthConfig` at construction instead of
//! reading ambient globals, so TTLs and URLs are injectable in tests.

use std::time::Duration;

use anyhow::Context;

const DEFAULT_VERIFICATION_TTL_HOURS: u64 = 24;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Public base URL of the application, used to build verification links.
    pub app_base_url: String,
    /// How long an email verification token stays valid after issuance.
    pub verification_token_ttl: Duration,
    /// How often the background worker purges expired verification tokens.
    pub cleanup_interval: Duration,
}

impl AuthConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let app_base_url =
            std::env::var("APP_BASE_URL").context("APP_BASE_URL must be set")?;

        let ttl_hours = env_u64("VERIFICATION_TOKEN_TTL_HOURS", DEFAULT_VERIFICATION_TTL_HOURS)?;
        let interval_secs =
            env_u64("TOKEN_CLEANUP_INTERVAL_SECS", DEFAULT_CLEANUP_INTERVAL_SECS)?;

        Ok(Self {
            app_base_url,
            verification_token_ttl: Duration::from_secs(ttl_hours * 3600),
            cleanup_interval: Duration::from_secs(interval_secs),
        })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            app_base_url: "http://localhost:8080".to_string(),
            verification_token_ttl: Duration::from_secs(DEFAULT_VERIFICATION_TTL_HOURS * 3600),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
        }
    }
}

fn env_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .with_context(|| format!("invalid integer value for {key}: {value}")),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("failed to read {key}")),
    }
}
