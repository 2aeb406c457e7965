use std::{env, fmt::Display, net::SocketAddr, str::FromStr};

use tower_sessions::cookie::Key;
use tracing::{info, warn};

/// Signing keys shorter than this are rejected by the cookie crate.
const MIN_SECRET_LEN: usize = 64;

/// Ten years. Session expiry dates must stay representable.
const MAX_INACTIVITY_MINUTES: u32 = 10 * 365 * 24 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("SECRET_KEY must be at least 64 bytes, got {len}")]
    SecretTooShort { len: usize },
}

pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub session_inactivity: time::Duration,
    secret_key: Option<Vec<u8>>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `load` uses the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = match lookup("SECRET_KEY") {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(ConfigError::SecretTooShort { len: secret.len() })
            }
            Some(secret) => Some(secret.into_bytes()),
            None => {
                warn!("SECRET_KEY not set, sessions will not survive a restart");
                None
            }
        };

        let inactivity_minutes: u32 = try_load(&lookup, "SESSION_INACTIVITY_MINUTES", "1440")?;
        if !(1..=MAX_INACTIVITY_MINUTES).contains(&inactivity_minutes) {
            return Err(ConfigError::Invalid {
                key: "SESSION_INACTIVITY_MINUTES",
                value: inactivity_minutes.to_string(),
                reason: format!("must be between 1 and {MAX_INACTIVITY_MINUTES}"),
            });
        }

        Ok(Self {
            database_url: try_load(&lookup, "DATABASE_URL", "sqlite://todo.db")?,
            bind_addr: try_load(&lookup, "BIND_ADDR", "127.0.0.1:3000")?,
            max_connections: try_load(&lookup, "MAX_DB_CONNECTIONS", "5")?,
            session_inactivity: time::Duration::minutes(i64::from(inactivity_minutes)),
            secret_key,
        })
    }

    /// Key for signing session cookies. Without `SECRET_KEY` a random key is
    /// generated, so every call returns a different one.
    pub fn session_key(&self) -> Key {
        match &self.secret_key {
            Some(secret) => Key::from(secret.as_slice()),
            None => Key::generate(),
        }
    }
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}
