//! # kvspace
//!
//! Namespaced, serialization-aware key-value access over Redis.
//!
//! A [`ConnectionManager`] owns one lazily created connection pool per
//! process. Each [`CrudEngine`] binds a handle from that pool to a key
//! namespace and exposes CRUD, batch and TTL operations that never raise:
//! failures are logged and returned as the documented failure value.
//!
//! ```rust
//! use kvspace::{CrudEngine, MemoryStore, Value};
//!
//! let sessions = CrudEngine::with_handle(MemoryStore::new(), "sessions");
//! sessions.create("abc", "ann", Some(1800));
//! assert_eq!(sessions.read("abc", true), Some(Value::from("ann")));
//! assert!(sessions.get_ttl("abc") > 0);
//! ```
//!
//! With the default `redis` feature, [`redis`] holds the Redis backend and
//! the process-scoped manager configured from `REDIS_*` variables.

pub use kvspace_core::*;

#[cfg(feature = "redis")]
pub use kvspace_redis as redis;
