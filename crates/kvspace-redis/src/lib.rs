//! # kvspace-redis
//!
//! Redis backend for kvspace: a deadpool-redis pool factory, a synchronous
//! store handle driven by a shared tokio runtime, and a process-scoped
//! connection manager.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kvspace_core::Value;
//!
//! let users = kvspace_redis::engine("users")?;
//! users.create("1001", serde_json::json!({"name": "ann"}), Some(3600));
//!
//! if let Some(Value::Record(profile)) = users.read("1001", true) {
//!     println!("{}", profile["name"]);
//! }
//!
//! kvspace_redis::shutdown();
//! # Ok::<(), kvspace_core::KvError>(())
//! ```

pub mod handle;
pub mod pool;
pub mod runtime;
pub mod shared;

pub use handle::RedisHandle;
pub use pool::{RedisPool, RedisPoolFactory, sanitize_error};
pub use shared::{
    RedisEngine, RedisManager, engine, manager, shared_manager, shutdown, verify_connectivity,
};
