//! Integration tests for environment-based store configuration

use kvspace_core::{ConfigError, StoreConfig};
use serial_test::serial;
use std::env;
use std::time::Duration;

const ALL_VARS: &[&str] = &[
    "REDIS_HOST",
    "REDIS_PORT",
    "REDIS_PASSWORD",
    "REDIS_DB",
    "REDIS_MAX_CONNECTIONS",
    "REDIS_CONNECTION_TIMEOUT",
    "REDIS_COMMAND_TIMEOUT",
];

fn set_env(key: &str, value: &str) {
    unsafe {
        env::set_var(key, value);
    }
}

fn clear_all_store_env_vars() {
    for key in ALL_VARS {
        unsafe {
            env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn test_defaults_when_no_vars_set() {
    clear_all_store_env_vars();

    let config = StoreConfig::from_env().expect("should load defaults");

    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 6379);
    assert_eq!(config.password, None);
    assert_eq!(config.database, 0);
    assert_eq!(config.max_connections, 20);
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert_eq!(config.command_timeout, Duration::from_secs(5));
}

#[test]
#[serial]
fn test_all_vars_applied() {
    clear_all_store_env_vars();
    set_env("REDIS_HOST", "cache.internal");
    set_env("REDIS_PORT", "6380");
    set_env("REDIS_PASSWORD", "s3cret");
    set_env("REDIS_DB", "3");
    set_env("REDIS_MAX_CONNECTIONS", "50");
    set_env("REDIS_CONNECTION_TIMEOUT", "2");
    set_env("REDIS_COMMAND_TIMEOUT", "9");

    let config = StoreConfig::from_env().expect("should load config");

    assert_eq!(config.host, "cache.internal");
    assert_eq!(config.port, 6380);
    assert_eq!(config.password.as_deref(), Some("s3cret"));
    assert_eq!(config.database, 3);
    assert_eq!(config.max_connections, 50);
    assert_eq!(config.connect_timeout, Duration::from_secs(2));
    assert_eq!(config.command_timeout, Duration::from_secs(9));
    assert_eq!(
        config.connection_url().unwrap(),
        "redis://:s3cret@cache.internal:6380/3"
    );

    clear_all_store_env_vars();
}

#[test]
#[serial]
fn test_empty_password_means_none() {
    clear_all_store_env_vars();
    set_env("REDIS_PASSWORD", "");

    let config = StoreConfig::from_env().expect("should load config");
    assert_eq!(config.password, None);
    assert_eq!(config.connection_url().unwrap(), "redis://127.0.0.1:6379/0");

    clear_all_store_env_vars();
}

#[test]
#[serial]
fn test_invalid_port_is_rejected() {
    clear_all_store_env_vars();
    set_env("REDIS_PORT", "not-a-port");

    let err = StoreConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref key, .. } if key == "REDIS_PORT"));

    clear_all_store_env_vars();
}

#[test]
#[serial]
fn test_out_of_range_pool_size_fails_validation() {
    clear_all_store_env_vars();
    set_env("REDIS_MAX_CONNECTIONS", "0");

    let err = StoreConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));

    clear_all_store_env_vars();
}

#[test]
#[serial]
fn test_out_of_range_database_fails_validation() {
    clear_all_store_env_vars();
    set_env("REDIS_DB", "16");

    assert!(StoreConfig::from_env().is_err());

    clear_all_store_env_vars();
}
