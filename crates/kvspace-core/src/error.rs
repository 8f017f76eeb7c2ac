//! Error types for kvspace.
//!
//! Three failure classes exist: connectivity (pool/connection creation),
//! remote operation (any command against the store) and serialization
//! (value encode/decode). Only connectivity errors raised while creating the
//! pool reach callers of the engine; everything else is absorbed at the
//! engine boundary and turned into the documented failure value.

use std::fmt;

use thiserror::Error;

/// Result type for kvspace operations
pub type KvResult<T> = Result<T, KvError>;

/// Strongly-typed remote store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Set,
    SetEx,
    Delete,
    Exists,
    Ttl,
    Expire,
    Keys,
    Ping,
    Pipeline,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Get => write!(f, "GET"),
            Operation::Set => write!(f, "SET"),
            Operation::SetEx => write!(f, "SETEX"),
            Operation::Delete => write!(f, "DEL"),
            Operation::Exists => write!(f, "EXISTS"),
            Operation::Ttl => write!(f, "TTL"),
            Operation::Expire => write!(f, "EXPIRE"),
            Operation::Keys => write!(f, "KEYS"),
            Operation::Ping => write!(f, "PING"),
            Operation::Pipeline => write!(f, "PIPELINE"),
        }
    }
}

/// Errors that can occur while talking to the key-value store
#[derive(Error, Debug, Clone)]
pub enum KvError {
    /// Pool or connection could not be established
    #[error("Connectivity error: {reason}")]
    Connectivity { reason: String },

    /// A command against the store failed (network drop, timeout, protocol error)
    #[error("{operation} failed for '{key}': {reason}")]
    RemoteOperation {
        operation: Operation,
        key: String,
        reason: String,
    },

    /// Value could not be encoded or decoded
    #[error("Serialization failed for '{key}': {reason}")]
    Serialization { key: String, reason: String },
}

impl KvError {
    pub fn connectivity(reason: impl Into<String>) -> Self {
        KvError::Connectivity {
            reason: reason.into(),
        }
    }

    pub fn remote(operation: Operation, key: impl Into<String>, reason: impl Into<String>) -> Self {
        KvError::RemoteOperation {
            operation,
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn serialization(key: impl Into<String>, reason: impl Into<String>) -> Self {
        KvError::Serialization {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised while establishing connectivity.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, KvError::Connectivity { .. })
    }
}

/// Error type for configuration loading
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    Validation(String),
}
