//! Server configuration
//!
//! Read from the command line and environment:
//! - first argument: bind address (default `127.0.0.1:8080`)
//! - `RELAY_PROFILE`: `lobby` (message protocol, default) or `relay` (raw relay)
//! - `ROOM_TTL_SECS`: maximum room age (default 7200)
//! - `SWEEP_INTERVAL_SECS`: time between expiry sweeps (default 60)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::sweeper::{DEFAULT_ROOM_TTL, DEFAULT_SWEEP_INTERVAL};

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Wire profile served by the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// JSON message protocol with create/join/leave
    Lobby,
    /// Role and code in the handshake, opaque fan-out
    Relay,
}

impl FromStr for Profile {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lobby" => Ok(Profile::Lobby),
            "relay" => Ok(Profile::Relay),
            other => Err(AppError::Config(format!("unknown profile '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    pub profile: Profile,
    pub room_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            profile: Profile::Lobby,
            room_ttl: DEFAULT_ROOM_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl ServerConfig {
    /// Load from process arguments and environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_sources(env::args().nth(1), |key| env::var(key).ok())
    }

    /// Build from an optional address argument and a variable lookup
    pub fn from_sources<F>(addr: Option<String>, var: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = addr {
            config.addr = addr;
        }
        if let Some(profile) = var("RELAY_PROFILE") {
            config.profile = profile.parse()?;
        }
        if let Some(secs) = var("ROOM_TTL_SECS") {
            config.room_ttl = parse_secs("ROOM_TTL_SECS", &secs)?;
        }
        if let Some(secs) = var("SWEEP_INTERVAL_SECS") {
            config.sweep_interval = parse_secs("SWEEP_INTERVAL_SECS", &secs)?;
        }

        Ok(config)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, AppError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(AppError::Config(format!("{} must be positive", key))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(AppError::Config(format!("{}: {}", key, e))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_sources(None, vars(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.room_ttl, Duration::from_secs(7200));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_sources(
            Some("0.0.0.0:9000".to_string()),
            vars(&[
                ("RELAY_PROFILE", "Relay"),
                ("ROOM_TTL_SECS", "30"),
                ("SWEEP_INTERVAL_SECS", "5"),
            ]),
        )
        .unwrap();
        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(config.profile, Profile::Relay);
        assert_eq!(config.room_ttl, Duration::from_secs(30));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values() {
        assert!(ServerConfig::from_sources(None, vars(&[("RELAY_PROFILE", "mesh")])).is_err());
        assert!(ServerConfig::from_sources(None, vars(&[("ROOM_TTL_SECS", "soon")])).is_err());
        assert!(ServerConfig::from_sources(None, vars(&[("SWEEP_INTERVAL_SECS", "0")])).is_err());
    }
}
