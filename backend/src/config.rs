//! Process-wide configuration.
//!
//! Built once in `main` and handed to the HTTP layer as `web::Data<Config>`.
//! Only the listening port comes from the environment (`PORT`); every other
//! value is fixed.

use std::env;
use thiserror::Error;

/// Environment variable holding the listening port.
pub const PORT_VAR: &str = "PORT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

/// Ceiling on the total size of uploaded files (5 MiB).
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Ceiling on the total size of non-file multipart fields (20 MiB).
pub const MAX_FIELDS_SIZE: u64 = 20 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid PORT value '{value}': {source}")]
    InvalidPort {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: u64,
    pub max_fields_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_file_size: MAX_FILE_SIZE,
            max_fields_size: MAX_FIELDS_SIZE,
        }
    }
}

impl Config {
    /// Reads `PORT` from the environment, falling back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_port_var(env::var(PORT_VAR).ok())
    }

    fn from_port_var(value: Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = value {
            config.port = value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidPort { value, source })?;
        }
        Ok(config)
    }

    pub fn bind_address(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}
