//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::game::Iteration;
use crate::util::time::{DEFAULT_FRAME_RATE, DEFAULT_SNAPSHOT_RATE, MAX_FRAME_RATE};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Public base URL used to build WebSocket links
    pub public_base_url: String,
    /// Allowed page origins for CORS (comma-separated)
    pub client_origin: String,

    /// Scene frames per second
    pub frame_rate: u32,
    /// Frame snapshots broadcast per second
    pub snapshot_rate: u32,
    /// Ruleset used when a start request does not name one
    pub default_iteration: Iteration,

    /// Fetch the asset manifest before each game scene
    pub preload_assets: bool,
    /// Per-asset fetch timeout
    pub asset_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };
        let server_addr: SocketAddr = server_addr
            .parse()
            .map_err(|_| ConfigError::InvalidAddress)?;

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://{}", server_addr));

        let frame_rate = parse_or("FRAME_RATE", &lookup, DEFAULT_FRAME_RATE)?;
        let snapshot_rate = parse_or("SNAPSHOT_RATE", &lookup, DEFAULT_SNAPSHOT_RATE)?;
        if !(1..=MAX_FRAME_RATE).contains(&frame_rate) {
            return Err(ConfigError::Invalid {
                name: "FRAME_RATE",
                value: frame_rate.to_string(),
            });
        }

        Ok(Self {
            server_addr,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            public_base_url,
            client_origin: lookup("CLIENT_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            frame_rate,
            snapshot_rate,
            default_iteration: parse_or("GAME_ITERATION", &lookup, Iteration::Final)?,
            preload_assets: parse_or("PRELOAD_ASSETS", &lookup, true)?,
            asset_timeout: Duration::from_secs(parse_or("ASSET_TIMEOUT_SECS", &lookup, 10u64)?),
        })
    }
}

fn parse_or<T, F>(name: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.snapshot_rate, 20);
        assert_eq!(config.default_iteration, Iteration::Final);
        assert!(config.preload_assets);
        assert_eq!(config.asset_timeout, Duration::from_secs(10));
        assert_eq!(config.public_base_url, "http://0.0.0.0:8080");
    }

    #[test]
    fn port_takes_precedence_over_server_addr() {
        let config = config_with(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:1234")]).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn game_iteration_is_parsed() {
        let config = config_with(&[("GAME_ITERATION", "first"), ("PRELOAD_ASSETS", "false")]).unwrap();
        assert_eq!(config.default_iteration, Iteration::First);
        assert!(!config.preload_assets);
    }

    #[test]
    fn bad_values_are_reported_by_name() {
        let err = config_with(&[("FRAME_RATE", "fast")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "FRAME_RATE", .. }));

        let err = config_with(&[("FRAME_RATE", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "FRAME_RATE", .. }));

        let err = config_with(&[("SERVER_ADDR", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress));
    }

    #[test]
    fn frame_rate_above_the_ceiling_is_rejected() {
        for raw in ["2000000", "4294967295", "1001"] {
            let err = config_with(&[("FRAME_RATE", raw)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { name: "FRAME_RATE", .. }), "{raw}");
        }
        assert_eq!(config_with(&[("FRAME_RATE", "1000")]).unwrap().frame_rate, 1000);
    }
}
