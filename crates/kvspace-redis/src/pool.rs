//! Redis connection pool built on deadpool-redis

use std::time::Duration;

use deadpool_redis::{Config as RedisPoolConfig, Pool, PoolConfig, PoolError, Runtime};
use kvspace_core::{KvError, KvResult, PoolFactory, PoolStatus, StoreConfig, StorePool};
use redis::{ErrorKind as RedisErrorKind, RedisError};
use tracing::{debug, info};

use crate::handle::RedisHandle;
use crate::runtime;

/// Builds deadpool-redis pools and checks them with a PING before use
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisPoolFactory;

impl RedisPoolFactory {
    pub fn new() -> Self {
        Self
    }
}

impl PoolFactory for RedisPoolFactory {
    type Pool = RedisPool;

    fn create_pool(&self, config: &StoreConfig) -> KvResult<RedisPool> {
        config
            .validate()
            .map_err(|e| KvError::connectivity(e.to_string()))?;
        let url = config
            .connection_url()
            .map_err(|e| KvError::connectivity(e.to_string()))?;

        let mut pool_config = PoolConfig::new(config.max_connections);
        pool_config.timeouts.wait = Some(config.connect_timeout);
        pool_config.timeouts.create = Some(config.connect_timeout);
        pool_config.timeouts.recycle = Some(config.connect_timeout);

        let mut redis_config = RedisPoolConfig::from_url(url);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| KvError::connectivity(format!("Failed to create connection pool: {}", e)))?;

        // Surface unreachable hosts and rejected credentials now rather than
        // on the first command
        let address = format!("{}:{}", config.host, config.port);
        runtime::block_on(runtime::with_timeout(
            config.connect_timeout,
            async {
                let mut conn = pool.get().await.map_err(|e| {
                    KvError::connectivity(format!(
                        "Failed to connect to {}: {}",
                        address,
                        sanitize_pool_error(&e)
                    ))
                })?;

                redis::cmd("PING")
                    .query_async::<String>(&mut *conn)
                    .await
                    .map_err(|e| {
                        KvError::connectivity(format!("PING failed: {}", sanitize_error(&e)))
                    })?;

                Ok::<(), KvError>(())
            },
            || KvError::connectivity(format!("Timed out connecting to {}", address)),
        ))?;

        info!(
            address = %address,
            db = config.database,
            max_size = config.max_connections,
            "Redis pool connected"
        );

        Ok(RedisPool::new(pool, config.command_timeout))
    }
}

/// A live deadpool-redis pool
pub struct RedisPool {
    pool: Pool,
    command_timeout: Duration,
}

impl RedisPool {
    pub fn new(pool: Pool, command_timeout: Duration) -> Self {
        Self {
            pool,
            command_timeout,
        }
    }

    pub fn inner(&self) -> &Pool {
        &self.pool
    }
}

impl StorePool for RedisPool {
    type Handle = RedisHandle;

    fn handle(&self) -> KvResult<RedisHandle> {
        if self.pool.is_closed() {
            return Err(KvError::connectivity("Connection pool closed"));
        }
        Ok(RedisHandle::new(self.pool.clone(), self.command_timeout))
    }

    fn close(&self) {
        let status = self.pool.status();
        self.pool.close();
        debug!(
            size = status.size,
            available = status.available,
            "Redis pool closed"
        );
    }

    fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
        }
    }
}

/// Reduce a Redis error to a reason safe to log or return
pub fn sanitize_error(error: &RedisError) -> String {
    match error.kind() {
        RedisErrorKind::AuthenticationFailed => "Authentication failed".to_string(),
        RedisErrorKind::TypeError => "Data type error".to_string(),
        RedisErrorKind::ExecAbortError => "Transaction aborted".to_string(),
        RedisErrorKind::BusyLoadingError => "Redis is loading data".to_string(),
        RedisErrorKind::NoScriptError => "Script not found".to_string(),
        RedisErrorKind::ReadOnly => "Redis is read-only".to_string(),
        _ if error.is_timeout() => "Operation timeout".to_string(),
        _ if error.is_io_error() || error.is_connection_dropped() => {
            "Connection error".to_string()
        }
        _ if error.to_string().contains("NOAUTH") => "Authentication failed".to_string(),
        _ => "Redis operation failed".to_string(),
    }
}

/// Reduce a pool checkout error to a reason safe to log or return
pub fn sanitize_pool_error(error: &PoolError) -> String {
    match error {
        PoolError::Backend(e) => sanitize_error(e),
        PoolError::Timeout(_) => "Timed out waiting for a connection".to_string(),
        PoolError::Closed => "Connection pool closed".to_string(),
        _ => "Connection setup failed".to_string(),
    }
}
