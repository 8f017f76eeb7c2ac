//! Connection manager owning the shared pool.
//!
//! A manager moves between two states:
//!
//! ```text
//! Uninitialized --acquire_handle--> Active --shutdown--> Uninitialized
//! ```
//!
//! Pool creation happens under a mutex, so concurrent first use constructs
//! exactly one pool. Creation failures are returned to the caller that
//! triggered them and are not retried.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::config::StoreConfig;
use crate::error::{KvError, KvResult};
use crate::store::{PoolFactory, PoolStatus, StoreHandle, StorePool};

/// Handle type produced by a factory's pools
pub type HandleOf<F> = <<F as PoolFactory>::Pool as StorePool>::Handle;

/// Lifecycle state of a [`ConnectionManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    Active,
}

/// Owns at most one live pool and hands out handles bound to it
pub struct ConnectionManager<F: PoolFactory> {
    factory: F,
    config: StoreConfig,
    pool: Mutex<Option<Arc<F::Pool>>>,
}

impl<F: PoolFactory> ConnectionManager<F> {
    /// Create a manager in the `Uninitialized` state. No connection is made.
    pub fn new(factory: F, config: StoreConfig) -> Self {
        Self {
            factory,
            config,
            pool: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn state(&self) -> ManagerState {
        match self.lock_pool() {
            Ok(guard) if guard.is_some() => ManagerState::Active,
            _ => ManagerState::Uninitialized,
        }
    }

    /// Get a handle bound to the shared pool, creating the pool on first use.
    ///
    /// # Errors
    ///
    /// Returns `KvError::Connectivity` if the pool cannot be created.
    pub fn acquire_handle(&self) -> KvResult<HandleOf<F>> {
        self.pool()?.handle()
    }

    /// Ping the store. Never fails; problems are logged and reported as `false`.
    pub fn verify_connectivity(&self) -> bool {
        match self.acquire_handle().and_then(|handle| handle.ping()) {
            Ok(()) => {
                info!(host = %self.config.host, port = self.config.port, "Store connectivity verified");
                true
            }
            Err(e) => {
                error!(error = %e, "Store connectivity check failed");
                false
            }
        }
    }

    /// Release every pooled connection and return to `Uninitialized`.
    ///
    /// Calling this without a live pool is a no-op.
    pub fn shutdown(&self) {
        let pool = match self.pool.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match pool {
            Some(pool) => {
                pool.close();
                info!("Connection pool closed");
            }
            None => debug!("Shutdown requested without an active pool"),
        }
    }

    /// Statistics of the live pool, if any
    pub fn status(&self) -> Option<PoolStatus> {
        self.lock_pool()
            .ok()
            .and_then(|guard| guard.as_ref().map(|pool| pool.status()))
    }

    fn pool(&self) -> KvResult<Arc<F::Pool>> {
        let mut guard = self.lock_pool()?;

        if let Some(pool) = guard.as_ref() {
            return Ok(Arc::clone(pool));
        }

        match self.factory.create_pool(&self.config) {
            Ok(pool) => {
                let pool = Arc::new(pool);
                *guard = Some(Arc::clone(&pool));
                info!(
                    host = %self.config.host,
                    port = self.config.port,
                    db = self.config.database,
                    max_connections = self.config.max_connections,
                    "Connection pool created"
                );
                Ok(pool)
            }
            Err(e) => {
                error!(error = %e, "Failed to create connection pool");
                Err(e)
            }
        }
    }

    fn lock_pool(&self) -> KvResult<MutexGuard<'_, Option<Arc<F::Pool>>>> {
        self.pool.lock().map_err(|e| {
            warn!("Connection manager lock poisoned");
            KvError::connectivity(format!("Lock poisoned: {}", e))
        })
    }
}

impl<F: PoolFactory> Drop for ConnectionManager<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryPoolFactory, MemoryStore};
    use std::sync::Arc;

    fn manager() -> ConnectionManager<Arc<MemoryPoolFactory>> {
        ConnectionManager::new(
            Arc::new(MemoryPoolFactory::new(MemoryStore::new())),
            StoreConfig::default(),
        )
    }

    #[test]
    fn test_lazy_creation_and_reuse() {
        let manager = manager();
        assert_eq!(manager.state(), ManagerState::Uninitialized);
        assert_eq!(manager.factory().pools_created(), 0);

        manager.acquire_handle().unwrap();
        manager.acquire_handle().unwrap();

        assert_eq!(manager.state(), ManagerState::Active);
        assert_eq!(manager.factory().pools_created(), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_allows_recreation() {
        let manager = manager();
        manager.shutdown();
        assert_eq!(manager.state(), ManagerState::Uninitialized);

        manager.acquire_handle().unwrap();
        manager.shutdown();
        manager.shutdown();
        assert_eq!(manager.state(), ManagerState::Uninitialized);
        assert!(manager.status().is_none());

        manager.acquire_handle().unwrap();
        assert_eq!(manager.factory().pools_created(), 2);
    }

    #[test]
    fn test_handles_from_closed_pool_fail() {
        let manager = manager();
        let handle = manager.acquire_handle().unwrap();
        manager.shutdown();
        assert!(handle.ping().is_err());
    }

    #[test]
    fn test_creation_failure_propagates_and_is_not_cached() {
        let manager = manager();
        manager.factory().set_unreachable(true);

        let err = manager.acquire_handle().err().unwrap();
        assert!(err.is_connectivity());
        assert_eq!(manager.state(), ManagerState::Uninitialized);
        assert!(!manager.verify_connectivity());

        manager.factory().set_unreachable(false);
        assert!(manager.verify_connectivity());
        assert_eq!(manager.state(), ManagerState::Active);
    }

    #[test]
    fn test_verify_connectivity_reports_offline_store() {
        let manager = manager();
        manager.factory().store().set_offline(true);
        assert!(!manager.verify_connectivity());
    }

    #[test]
    fn test_status_reflects_config() {
        let manager = ConnectionManager::new(
            MemoryPoolFactory::default(),
            StoreConfig::default().with_max_connections(7),
        );
        manager.acquire_handle().unwrap();
        assert_eq!(manager.status().map(|s| s.max_size), Some(7));
    }
}
