use std::env;
use std::fmt;
use std::time::Duration;

use shared::services::expiry_sweeper::{
    DEFAULT_CLOCK_SWEEP_INTERVAL, DEFAULT_ROOM_SWEEP_INTERVAL,
};

pub const DEFAULT_PORT: u16 = 3000;

/// Where match records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStore {
    Memory,
    DynamoDb { table_name: String },
}

/// Allowed browser origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: CorsOrigins,
    pub match_store: MatchStore,
    pub room_sweep_interval: Duration,
    pub clock_sweep_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
            ConfigError::Missing(key) => write!(f, "Missing required setting {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source. Unset and blank values
    /// fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match read("PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value })?,
            None => DEFAULT_PORT,
        };

        let cors_origins = match read("CLIENT_URL").as_deref() {
            None | Some("*") => CorsOrigins::Any,
            Some(value) => CorsOrigins::List(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        };

        let match_store = match read("MATCH_STORE").as_deref() {
            None | Some("memory") => MatchStore::Memory,
            Some("dynamodb") => MatchStore::DynamoDb {
                table_name: read("MATCHES_TABLE").ok_or(ConfigError::Missing("MATCHES_TABLE"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "MATCH_STORE",
                    value: other.to_string(),
                })
            }
        };

        Ok(ServerConfig {
            port,
            cors_origins,
            match_store,
            room_sweep_interval: interval(
                read("ROOM_SWEEP_INTERVAL_MS"),
                "ROOM_SWEEP_INTERVAL_MS",
                DEFAULT_ROOM_SWEEP_INTERVAL,
            )?,
            clock_sweep_interval: interval(
                read("CLOCK_SWEEP_INTERVAL_MS"),
                "CLOCK_SWEEP_INTERVAL_MS",
                DEFAULT_CLOCK_SWEEP_INTERVAL,
            )?,
        })
    }
}

fn interval(
    raw: Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => match value.parse::<u64>() {
            Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
            _ => Err(ConfigError::Invalid { key, value }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, CorsOrigins::Any);
        assert_eq!(config.match_store, MatchStore::Memory);
        assert_eq!(config.room_sweep_interval, Duration::from_secs(15));
        assert_eq!(config.clock_sweep_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("CLIENT_URL", "http://localhost:5173, https://duel.example.com"),
            ("MATCH_STORE", "dynamodb"),
            ("MATCHES_TABLE", "matches"),
            ("CLOCK_SWEEP_INTERVAL_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.cors_origins,
            CorsOrigins::List(vec![
                "http://localhost:5173".to_string(),
                "https://duel.example.com".to_string(),
            ])
        );
        assert_eq!(
            config.match_store,
            MatchStore::DynamoDb {
                table_name: "matches".to_string()
            }
        );
        assert_eq!(config.clock_sweep_interval, Duration::from_millis(250));
    }

    #[rstest]
    #[case("PORT", "not-a-port")]
    #[case("PORT", "70000")]
    #[case("MATCH_STORE", "redis")]
    #[case("ROOM_SWEEP_INTERVAL_MS", "0")]
    #[case("CLOCK_SWEEP_INTERVAL_MS", "-5")]
    fn test_invalid_values(#[case] key: &str, #[case] value: &str) {
        let error = config(&[(key, value)]).unwrap_err();

        assert!(matches!(error, ConfigError::Invalid { key: k, .. } if k == key));
    }

    #[test]
    fn test_dynamodb_requires_table() {
        assert_eq!(
            config(&[("MATCH_STORE", "dynamodb")]).unwrap_err(),
            ConfigError::Missing("MATCHES_TABLE")
        );
    }
}
