//! Process-scoped connection manager
//!
//! One manager per process, configured from the `REDIS_*` environment
//! variables on first use. Engines built with [`engine`] all share its pool.

use std::sync::OnceLock;

use kvspace_core::{ConnectionManager, CrudEngine, KvError, KvResult, StoreConfig};
use tracing::debug;

use crate::handle::RedisHandle;
use crate::pool::RedisPoolFactory;

/// Connection manager over Redis
pub type RedisManager = ConnectionManager<RedisPoolFactory>;

/// CRUD engine over Redis
pub type RedisEngine = CrudEngine<RedisHandle>;

static SHARED: OnceLock<RedisManager> = OnceLock::new();

/// Build a standalone manager with an explicit configuration.
pub fn manager(config: StoreConfig) -> RedisManager {
    ConnectionManager::new(RedisPoolFactory, config)
}

/// The process-wide manager, configured from the environment on first call.
///
/// No connection is made here; the pool is created on first handle request.
///
/// # Errors
///
/// Returns `KvError::Connectivity` if the environment holds an invalid
/// configuration. Nothing is cached in that case.
pub fn shared_manager() -> KvResult<&'static RedisManager> {
    if let Some(manager) = SHARED.get() {
        return Ok(manager);
    }

    let config = StoreConfig::from_env().map_err(|e| KvError::connectivity(e.to_string()))?;
    debug!(config = ?config, "Shared Redis manager configured");
    Ok(SHARED.get_or_init(|| manager(config)))
}

/// Engine over the shared manager for the given namespace.
///
/// # Errors
///
/// Returns `KvError::Connectivity` if the shared pool cannot be created.
pub fn engine(prefix: &str) -> KvResult<RedisEngine> {
    CrudEngine::new(shared_manager()?, prefix)
}

/// Ping Redis through the shared manager.
pub fn verify_connectivity() -> bool {
    match shared_manager() {
        Ok(manager) => manager.verify_connectivity(),
        Err(e) => {
            tracing::error!(error = %e, "Store connectivity check failed");
            false
        }
    }
}

/// Close the shared pool if one exists. Safe to call repeatedly.
pub fn shutdown() {
    if let Some(manager) = SHARED.get() {
        manager.shutdown();
    }
}
