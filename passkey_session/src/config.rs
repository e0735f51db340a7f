//! Coordinator settings read from the environment

use std::{env, fmt, str::FromStr, time::Duration};
use thiserror::Error;

const DEFAULT_SESSION_TTL: u64 = 3600;
const DEFAULT_SAVE_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// What to do when an authenticator's signature counter fails to advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CloneWarningPolicy {
    /// Log a security event and let the login through
    #[default]
    Warn,
    /// Log a security event and reject the login
    Reject,
}

impl FromStr for CloneWarningPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "reject" => Ok(Self::Reject),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for CloneWarningPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => f.write_str("warn"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Lifetime of a pending ceremony session, in seconds
    pub ceremony_ttl: u64,
    /// Lifetime of an authenticated session, in seconds
    pub auth_session_ttl: u64,
    pub clone_warning_policy: CloneWarningPolicy,
    /// Total attempts for the post-ceremony credential save
    pub credential_save_attempts: u32,
    /// Delay before retry `n` is `retry_backoff * n`
    pub retry_backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ceremony_ttl: DEFAULT_SESSION_TTL,
            auth_session_ttl: DEFAULT_SESSION_TTL,
            clone_warning_policy: CloneWarningPolicy::default(),
            credential_save_attempts: DEFAULT_SAVE_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl CoordinatorConfig {
    /// Read `CEREMONY_SESSION_TTL`, `AUTH_SESSION_TTL`,
    /// `PASSKEY_CLONE_WARNING_POLICY` and `CREDENTIAL_SAVE_ATTEMPTS`,
    /// falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let credential_save_attempts =
            env_or("CREDENTIAL_SAVE_ATTEMPTS", defaults.credential_save_attempts)?;
        if credential_save_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "CREDENTIAL_SAVE_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            ceremony_ttl: env_or("CEREMONY_SESSION_TTL", defaults.ceremony_ttl)?,
            auth_session_ttl: env_or("AUTH_SESSION_TTL", defaults.auth_session_ttl)?,
            clone_warning_policy: env_or(
                "PASSKEY_CLONE_WARNING_POLICY",
                defaults.clone_warning_policy,
            )?,
            credential_save_attempts,
            retry_backoff: defaults.retry_backoff,
        })
    }
}

fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
