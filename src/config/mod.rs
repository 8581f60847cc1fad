//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

const DEFAULT_TICK_INTERVAL_MS: u64 = 16;
const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;
const DEFAULT_ITERATIONS: usize = 10;

/// Application configuration loaded from environment variables.
/// Every key has a default; a bare `cargo run` serves on 0.0.0.0:8080.
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origin(s) for CORS, comma-separated, or "*"
    pub client_origin: String,

    /// Wall-clock period of the session tick in milliseconds
    pub tick_interval_ms: u64,
    /// Fixed physics increment handed to the solver each tick, in seconds
    pub simulation_time_step: f32,
    /// Solver iterations per physics step
    pub simulation_iterations: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render-style hosts provide PORT; fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            tick_interval_ms: parse_var("TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS)?,
            simulation_time_step: parse_var("SIMULATION_TIME_STEP", DEFAULT_TIME_STEP)?,
            simulation_iterations: parse_var("SIMULATION_ITERATIONS", DEFAULT_ITERATIONS)?,
        };

        if config.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("TICK_INTERVAL_MS"));
        }
        if config.simulation_time_step <= 0.0 {
            return Err(ConfigError::Invalid("SIMULATION_TIME_STEP"));
        }
        if config.simulation_iterations == 0 {
            return Err(ConfigError::Invalid("SIMULATION_ITERATIONS"));
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
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
