//! Remote store seam.
//!
//! The engine and the connection manager only ever see these traits. The
//! Redis backend lives in `kvspace-redis`; [`crate::memory`] provides an
//! in-process implementation.

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::KvResult;

/// Handle bound to a pool, used to issue commands against the store.
///
/// Keys passed here are physical keys; namespacing happens above this layer.
pub trait StoreHandle: Send + Sync {
    fn get(&self, key: &str) -> KvResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> KvResult<bool>;

    fn set_ex(&self, key: &str, value: &str, seconds: u64) -> KvResult<bool>;

    /// Delete keys in one call, returning how many existed.
    fn del(&self, keys: &[String]) -> KvResult<usize>;

    fn exists(&self, key: &str) -> KvResult<bool>;

    /// Remaining seconds, `-1` without expiry, `-2` if the key is missing.
    fn ttl(&self, key: &str) -> KvResult<i64>;

    /// Attach a TTL; `false` when the key does not exist.
    fn expire(&self, key: &str, seconds: i64) -> KvResult<bool>;

    /// Keys matching a glob-style pattern (`*`, `?`, `[...]`).
    fn keys(&self, pattern: &str) -> KvResult<Vec<String>>;

    fn ping(&self) -> KvResult<()>;

    /// Submit every queued command together.
    fn execute(&self, pipeline: Pipeline) -> KvResult<()>;
}

/// A single queued write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineCommand {
    Set { key: String, value: String },
    SetEx { key: String, value: String, seconds: u64 },
}

impl PipelineCommand {
    pub fn key(&self) -> &str {
        match self {
            PipelineCommand::Set { key, .. } | PipelineCommand::SetEx { key, .. } => key,
        }
    }
}

/// Ordered batch of writes submitted in one round-trip
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    commands: Vec<PipelineCommand>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.commands.push(PipelineCommand::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn queue_set_ex(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        seconds: u64,
    ) -> &mut Self {
        self.commands.push(PipelineCommand::SetEx {
            key: key.into(),
            value: value.into(),
            seconds,
        });
        self
    }

    pub fn commands(&self) -> &[PipelineCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl IntoIterator for Pipeline {
    type Item = PipelineCommand;
    type IntoIter = std::vec::IntoIter<PipelineCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatus {
    /// Configured upper bound
    pub max_size: usize,
    /// Connections currently open
    pub size: usize,
    /// Open connections not leased to anyone
    pub available: usize,
}

/// A bounded set of reusable connections to the store
pub trait StorePool: Send + Sync + 'static {
    type Handle: StoreHandle;

    /// Hand out a handle bound to this pool.
    fn handle(&self) -> KvResult<Self::Handle>;

    /// Release every pooled connection. Handles issued earlier fail afterwards.
    fn close(&self);

    fn status(&self) -> PoolStatus;
}

/// Builds pools from configuration
pub trait PoolFactory: Send + Sync {
    type Pool: StorePool;

    fn create_pool(&self, config: &StoreConfig) -> KvResult<Self::Pool>;
}

impl<F: PoolFactory> PoolFactory for Arc<F> {
    type Pool = F::Pool;

    fn create_pool(&self, config: &StoreConfig) -> KvResult<Self::Pool> {
        (**self).create_pool(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_queues_in_order() {
        let mut pipeline = Pipeline::new();
        pipeline.queue_set("a", "1").queue_set_ex("b", "2", 60);

        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.commands()[0].key(), "a");
        assert_eq!(
            pipeline.commands()[1],
            PipelineCommand::SetEx {
                key: "b".into(),
                value: "2".into(),
                seconds: 60
            }
        );
    }

    #[test]
    fn test_empty_pipeline() {
        let pipeline = Pipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.into_iter().count(), 0);
    }
}
