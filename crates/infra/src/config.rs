//! Process configuration loaded from the environment.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
/// Seven days.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 7;
/// One day.
pub const DEFAULT_SESSION_UPDATE_AGE_SECS: i64 = 60 * 60 * 24;
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{0} is required")]
    Missing(&'static str),
}

/// Session lifetime knobs handed to the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub ttl: Duration,
    pub update_age: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            update_age: Duration::seconds(DEFAULT_SESSION_UPDATE_AGE_SECS),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` selects the in-memory backend.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Optional password pepper.
    pub auth_secret: Option<String>,
    pub session: SessionConfig,
    pub seed_on_startup: bool,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("auth_secret", &self.auth_secret.as_ref().map(|_| "<redacted>"))
            .field("session", &self.session)
            .field("seed_on_startup", &self.seed_on_startup)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auth_secret: None,
            session: SessionConfig::default(),
            seed_on_startup: false,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let database_url = get("DATABASE_URL");
        let max_connections = parse_or(
            "DATABASE_MAX_CONNECTIONS",
            get("DATABASE_MAX_CONNECTIONS"),
            DEFAULT_MAX_CONNECTIONS,
        )?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "DATABASE_MAX_CONNECTIONS",
                reason: "must be at least 1".into(),
            });
        }

        let auth_secret = get("AUTH_SECRET");
        match &auth_secret {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(ConfigError::Invalid {
                    name: "AUTH_SECRET",
                    reason: format!("must be at least {MIN_SECRET_LEN} characters"),
                });
            }
            Some(_) => {}
            None => tracing::warn!("AUTH_SECRET not set; password hashes are not peppered (dev only)"),
        }

        let ttl = parse_or("SESSION_TTL_SECS", get("SESSION_TTL_SECS"), DEFAULT_SESSION_TTL_SECS)?;
        let update_age = parse_or(
            "SESSION_UPDATE_AGE_SECS",
            get("SESSION_UPDATE_AGE_SECS"),
            DEFAULT_SESSION_UPDATE_AGE_SECS,
        )?;
        if ttl <= 0 || update_age <= 0 || update_age > ttl {
            return Err(ConfigError::Invalid {
                name: "SESSION_UPDATE_AGE_SECS",
                reason: "session ttl and update age must be positive, update age <= ttl".into(),
            });
        }

        let seed_on_startup = match get("SEED_ON_STARTUP").as_deref() {
            None => false,
            Some("1" | "true" | "yes") => true,
            Some("0" | "false" | "no") => false,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "SEED_ON_STARTUP",
                    reason: format!("expected a boolean, got '{other}'"),
                });
            }
        };

        Ok(Self {
            host,
            port,
            database_url,
            max_connections,
            auth_secret,
            session: SessionConfig {
                ttl: Duration::seconds(ttl),
                update_age: Duration::seconds(update_age),
            },
            seed_on_startup,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid {
                name: "HOST",
                reason: format!("{e}"),
            })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: format!("'{v}': {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_select_in_memory_backend() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.session.ttl, Duration::days(7));
        assert_eq!(cfg.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = load(&[("AUTH_SECRET", "short")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "AUTH_SECRET", .. }));
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(load(&[("PORT", "eighty")]).is_err());
    }

    #[test]
    fn update_age_cannot_exceed_ttl() {
        assert!(load(&[("SESSION_TTL_SECS", "60"), ("SESSION_UPDATE_AGE_SECS", "120")]).is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://user:pw@db/shor"),
            ("AUTH_SECRET", "0123456789abcdef0123456789abcdef"),
            ("SEED_ON_STARTUP", "true"),
        ])
        .unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("pw@db"));
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(cfg.seed_on_startup);
    }
}
