//! Blocking bridge for async Redis commands
//!
//! The store seam is synchronous, while the Redis client stack is async.
//! Commands are driven to completion on one process-wide tokio runtime, so
//! every pooled connection and its background driver task live on the same
//! runtime no matter which thread issued the command.

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use kvspace_core::{KvError, KvResult};
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tracing::debug;

const BRIDGE_WORKER_THREADS: usize = 2;

static BRIDGE: OnceLock<Result<Runtime, String>> = OnceLock::new();

fn bridge() -> KvResult<&'static Runtime> {
    BRIDGE
        .get_or_init(|| {
            debug!(workers = BRIDGE_WORKER_THREADS, "Starting Redis bridge runtime");
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(BRIDGE_WORKER_THREADS)
                .thread_name("kvspace-redis")
                .enable_all()
                .build()
                .map_err(|e| format!("Failed to create async runtime: {}", e))
        })
        .as_ref()
        .map_err(|reason| KvError::connectivity(reason.clone()))
}

/// Run `future` to completion, blocking the calling thread.
///
/// From inside a multi-threaded tokio runtime the worker is handed over
/// with `block_in_place` first. A current-thread runtime cannot give up its
/// only worker, so the call fails instead.
pub fn block_on<F, T>(future: F) -> KvResult<T>
where
    F: Future<Output = KvResult<T>>,
{
    let runtime = bridge()?;

    match Handle::try_current() {
        Ok(current) if current.runtime_flavor() == RuntimeFlavor::CurrentThread => {
            Err(KvError::connectivity(
                "blocking store calls are not supported inside a current-thread tokio runtime",
            ))
        }
        Ok(_) => tokio::task::block_in_place(|| runtime.block_on(future)),
        Err(_) => runtime.block_on(future),
    }
}

/// Bound `future` by `limit`, mapping expiry through `on_timeout`.
pub async fn with_timeout<F, T>(
    limit: Duration,
    future: F,
    on_timeout: impl FnOnce() -> KvError,
) -> KvResult<T>
where
    F: Future<Output = KvResult<T>>,
{
    tokio::time::timeout(limit, future)
        .await
        .unwrap_or_else(|_| Err(on_timeout()))
}
