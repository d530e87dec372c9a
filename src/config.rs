use log::info;
use std::env;
use std::fmt::Display;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Sqlite,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("expected `memory` or `sqlite`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: IpAddr,
    pub port: u16,
    pub store: StoreKind,
    pub database_url: String,
    pub database_max_connections: u32,
    pub vote_retry_limit: u32,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            bind_address: parse(&lookup, "BIND_ADDRESS", "0.0.0.0")?,
            port: parse(&lookup, "PORT", "8080")?,
            store: parse(&lookup, "POLL_STORE", "memory")?,
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:polls.db".to_string()),
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            vote_retry_limit: parse(&lookup, "VOTE_RETRY_LIMIT", "64")?,
        };

        if config.vote_retry_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "VOTE_RETRY_LIMIT",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if config.database_max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(config)
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    let parsed: Result<T, T::Err> = value.trim().parse();
    parsed.map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.database_url, "sqlite:polls.db");
        assert_eq!(config.vote_retry_limit, 64);
        assert_eq!(config.bind_address.to_string(), "0.0.0.0");
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("PORT", "3000"),
            ("POLL_STORE", "SQLite"),
            ("DATABASE_URL", "sqlite:/tmp/x.db"),
            ("VOTE_RETRY_LIMIT", "4"),
        ])
        .unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.database_url, "sqlite:/tmp/x.db");
        assert_eq!(config.vote_retry_limit, 4);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            config_from(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
        assert!(matches!(
            config_from(&[("POLL_STORE", "firestore")]),
            Err(ConfigError::Invalid { key: "POLL_STORE", .. })
        ));
        assert!(matches!(
            config_from(&[("VOTE_RETRY_LIMIT", "0")]),
            Err(ConfigError::Invalid { key: "VOTE_RETRY_LIMIT", .. })
        ));
    }
}
