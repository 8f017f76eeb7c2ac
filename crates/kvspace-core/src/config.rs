//! # Environment-Based Configuration
//!
//! Connection settings for the remote store, read once at process start.
//!
//! ## Environment Variables
//!
//! - `REDIS_HOST` - Store address (default: 127.0.0.1)
//! - `REDIS_PORT` - Store port (default: 6379)
//! - `REDIS_PASSWORD` - Optional credential; omitted from the connection when unset or empty
//! - `REDIS_DB` - Logical database index 0-15 (default: 0)
//! - `REDIS_MAX_CONNECTIONS` - Pool size bound (default: 20)
//! - `REDIS_CONNECTION_TIMEOUT` - Connect and read timeout in seconds (default: 5)
//! - `REDIS_COMMAND_TIMEOUT` - Overrides the read timeout only

use std::{env, fmt, str::FromStr, time::Duration};

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_MAX_CONNECTIONS: usize = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Largest pool the manager will build.
pub const MAX_POOL_SIZE: usize = 100;
/// Highest logical database index accepted.
pub const MAX_DATABASE: u8 = 15;

/// Connection settings for the remote store
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub database: u8,
    pub max_connections: usize,
    /// Time allowed to establish a connection or lease one from the pool
    pub connect_timeout: Duration,
    /// Time allowed for a single command round-trip
    pub command_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: None,
            database: 0,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            command_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl StoreConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any environment variable has an invalid value
    /// or if the configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = get_env_string("REDIS_HOST") {
            config.host = host;
        }
        if let Some(port) = get_env_parsed::<u16>("REDIS_PORT")? {
            config.port = port;
        }
        config.password = get_env_string("REDIS_PASSWORD");
        if let Some(db) = get_env_parsed::<u8>("REDIS_DB")? {
            config.database = db;
        }
        if let Some(max) = get_env_parsed::<usize>("REDIS_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(secs) = get_env_parsed::<u64>("REDIS_CONNECTION_TIMEOUT")? {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = get_env_parsed::<u64>("REDIS_COMMAND_TIMEOUT")? {
            config.command_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_database(mut self, database: u8) -> Self {
        self.database = database;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set both the connect and the command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.command_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation("host cannot be empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Validation(
                "max_connections cannot be zero".to_string(),
            ));
        }
        if self.max_connections > MAX_POOL_SIZE {
            return Err(ConfigError::Validation(format!(
                "max_connections too large: {} (max {})",
                self.max_connections, MAX_POOL_SIZE
            )));
        }
        if self.database > MAX_DATABASE {
            return Err(ConfigError::Validation(format!(
                "database index {} out of range (0-{})",
                self.database, MAX_DATABASE
            )));
        }
        if self.connect_timeout.is_zero() || self.command_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection URL for the store; the password is percent-encoded and
    /// left out entirely when absent.
    pub fn connection_url(&self) -> Result<String, ConfigError> {
        let base = format!("redis://{}:{}/{}", self.host, self.port, self.database);
        let mut url = Url::parse(&base)
            .map_err(|e| ConfigError::Validation(format!("invalid address '{}': {}", base, e)))?;

        if let Some(password) = &self.password {
            url.set_password(Some(password)).map_err(|_| {
                ConfigError::Validation("password cannot be attached to address".to_string())
            })?;
        }

        Ok(url.into())
    }
}

// Environment variable helper functions

fn get_env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn get_env_parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!(
                    "invalid {} value '{val}': {e}",
                    std::any::type_name::<T>()
                ),
            }),
        Err(_) => Ok(None),
    }
}
