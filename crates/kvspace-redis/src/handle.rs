//! Store handle issuing commands over pooled Redis connections

use std::future::Future;
use std::time::Duration;

use deadpool_redis::{Connection, Pool};
use kvspace_core::{KvError, KvResult, Operation, Pipeline, PipelineCommand, StoreHandle};
use redis::{AsyncCommands, RedisError};

use crate::pool::{sanitize_error, sanitize_pool_error};
use crate::runtime;

/// Handle bound to a Redis pool.
///
/// Every command leases one connection for its own duration and returns it
/// to the pool afterwards. Clones share the pool.
#[derive(Clone)]
pub struct RedisHandle {
    pool: Pool,
    command_timeout: Duration,
}

impl RedisHandle {
    pub fn new(pool: Pool, command_timeout: Duration) -> Self {
        Self {
            pool,
            command_timeout,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    fn run<T, F>(&self, operation: Operation, key: &str, command: F) -> KvResult<T>
    where
        F: Future<Output = KvResult<T>>,
    {
        runtime::block_on(runtime::with_timeout(self.command_timeout, command, || {
            KvError::remote(operation, key, "Operation timeout")
        }))
    }

    async fn connection(&self, operation: Operation, key: &str) -> KvResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| KvError::remote(operation, key, sanitize_pool_error(&e)))
    }
}

fn failed(operation: Operation, key: &str) -> impl FnOnce(RedisError) -> KvError + '_ {
    move |e| KvError::remote(operation, key, sanitize_error(&e))
}

impl StoreHandle for RedisHandle {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        let op = Operation::Get;
        self.run(op, key, async {
            let mut conn = self.connection(op, key).await?;
            conn.get::<_, Option<String>>(key)
                .await
                .map_err(failed(op, key))
        })
    }

    fn set(&self, key: &str, value: &str) -> KvResult<bool> {
        let op = Operation::Set;
        self.run(op, key, async {
            let mut conn = self.connection(op, key).await?;
            conn.set::<_, _, ()>(key, value)
                .await
                .map_err(failed(op, key))?;
            Ok::<_, KvError>(true)
        })
    }

    fn set_ex(&self, key: &str, value: &str, seconds: u64) -> KvResult<bool> {
        let op = Operation::SetEx;
        self.run(op, key, async {
            let mut conn = self.connection(op, key).await?;
            conn.set_ex::<_, _, ()>(key, value, seconds)
                .await
                .map_err(failed(op, key))?;
            Ok::<_, KvError>(true)
        })
    }

    fn del(&self, keys: &[String]) -> KvResult<usize> {
        let op = Operation::Delete;
        let first = keys.first().map(String::as_str).unwrap_or("");
        self.run(op, first, async {
            let mut conn = self.connection(op, first).await?;
            conn.del::<_, usize>(keys).await.map_err(failed(op, first))
        })
    }

    fn exists(&self, key: &str) -> KvResult<bool> {
        let op = Operation::Exists;
        self.run(op, key, async {
            let mut conn = self.connection(op, key).await?;
            conn.exists::<_, bool>(key).await.map_err(failed(op, key))
        })
    }

    fn ttl(&self, key: &str) -> KvResult<i64> {
        let op = Operation::Ttl;
        self.run(op, key, async {
            let mut conn = self.connection(op, key).await?;
            conn.ttl::<_, i64>(key).await.map_err(failed(op, key))
        })
    }

    fn expire(&self, key: &str, seconds: i64) -> KvResult<bool> {
        let op = Operation::Expire;
        self.run(op, key, async {
            let mut conn = self.connection(op, key).await?;
            conn.expire::<_, bool>(key, seconds)
                .await
                .map_err(failed(op, key))
        })
    }

    fn keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        let op = Operation::Keys;
        self.run(op, pattern, async {
            let mut conn = self.connection(op, pattern).await?;
            conn.keys::<_, Vec<String>>(pattern)
                .await
                .map_err(failed(op, pattern))
        })
    }

    fn ping(&self) -> KvResult<()> {
        let op = Operation::Ping;
        self.run(op, "", async {
            let mut conn = self.connection(op, "").await?;
            redis::cmd("PING")
                .query_async::<String>(&mut *conn)
                .await
                .map_err(failed(op, ""))?;
            Ok::<_, KvError>(())
        })
    }

    fn execute(&self, pipeline: Pipeline) -> KvResult<()> {
        let op = Operation::Pipeline;
        let first = pipeline
            .commands()
            .first()
            .map(|c| c.key().to_string())
            .unwrap_or_default();

        // MULTI/EXEC: the batch is applied as one unit on the server
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in pipeline {
            match command {
                PipelineCommand::Set { key, value } => {
                    pipe.set(key, value).ignore();
                }
                PipelineCommand::SetEx {
                    key,
                    value,
                    seconds,
                } => {
                    pipe.set_ex(key, value, seconds).ignore();
                }
            }
        }

        self.run(op, &first, async {
            let mut conn = self.connection(op, &first).await?;
            pipe.query_async::<()>(&mut *conn)
                .await
                .map_err(failed(op, &first))
        })
    }
}
