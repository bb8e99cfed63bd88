//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::DuelRules;

/// Default inbound frames per second accepted from one connection
const DEFAULT_INPUT_RATE_LIMIT: u32 = 120;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated), any origin when unset
    pub client_origin: Option<String>,
    /// Max inbound frames per second per connection
    pub input_rate_limit: u32,
    /// Duel timing and geometry
    pub rules: DuelRules,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let mut rules = DuelRules::default();
        if let Some(win_score) = parse_var("WIN_SCORE")? {
            rules.win_score = win_score;
        }
        if let Some(window) = parse_var("ATTACK_WINDOW_MS")? {
            rules.attack_window_ms = window;
        }
        if let Some(lock) = parse_var("RESPAWN_LOCK_MS")? {
            rules.respawn_lock_ms = lock;
        }
        if rules.win_score == 0 {
            return Err(ConfigError::Invalid("WIN_SCORE"));
        }
        if rules.attack_window_ms < 2 {
            return Err(ConfigError::Invalid("ATTACK_WINDOW_MS"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),

            input_rate_limit: parse_var("INPUT_RATE_LIMIT")?.unwrap_or(DEFAULT_INPUT_RATE_LIMIT),

            rules,
        })
    }
}

/// Read an optional numeric variable, rejecting values that fail to parse
fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
