//! # kvspace-core
//!
//! Core pieces of kvspace: configuration, the store seam, the connection
//! manager that owns the shared pool, and the namespaced CRUD engine.
//!
//! The engine is generic over [`StoreHandle`]. The Redis implementation lives
//! in `kvspace-redis`; [`MemoryStore`] is an in-process stand-in used by tests
//! and benchmarks.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kvspace_core::{ConnectionManager, CrudEngine, MemoryPoolFactory, StoreConfig, Value};
//!
//! let manager = ConnectionManager::new(Arc::new(MemoryPoolFactory::default()), StoreConfig::default());
//! let engine = CrudEngine::new(&manager, "users").unwrap();
//!
//! assert!(engine.create("1001", serde_json::json!({"name": "ann"}), Some(3600)));
//! assert!(matches!(engine.read("1001", true), Some(Value::Record(_))));
//! assert_eq!(engine.get_all_keys("*"), vec!["1001"]);
//!
//! manager.shutdown();
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod manager;
pub mod memory;
pub mod outcome;
pub mod store;
pub mod value;

pub use config::StoreConfig;
pub use engine::CrudEngine;
pub use error::{ConfigError, KvError, KvResult, Operation};
pub use key::{Namespace, SEPARATOR};
pub use manager::{ConnectionManager, HandleOf, ManagerState};
pub use memory::{MemoryHandle, MemoryPool, MemoryPoolFactory, MemoryStore};
pub use outcome::{Lookup, TTL_MISSING, TTL_PERSISTENT, Ttl};
pub use store::{Pipeline, PipelineCommand, PoolFactory, PoolStatus, StoreHandle, StorePool};
pub use value::Value;
