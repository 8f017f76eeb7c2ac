//! In-process store implementing the store seam.
//!
//! `MemoryStore` mimics the subset of Redis semantics the engine depends on:
//! per-key deadlines with lazy expiry, TTL sentinels, glob key matching and
//! pipelines applied under a single write lock. It is meant for tests,
//! benchmarks and local development.
//!
//! ```rust
//! use kvspace_core::{CrudEngine, MemoryStore, Value};
//!
//! let engine = CrudEngine::with_handle(MemoryStore::new(), "users");
//! assert!(engine.create("42", "ann", None));
//! assert_eq!(engine.read("42", true), Some(Value::from("ann")));
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{KvError, KvResult, Operation};
use crate::outcome::{TTL_MISSING, TTL_PERSISTENT};
use crate::store::{Pipeline, PipelineCommand, PoolFactory, PoolStatus, StoreHandle, StorePool};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: &str, expires_at: Option<Instant>) -> Self {
        Self {
            value: value.to_string(),
            expires_at,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// Deadline `seconds` from `now`, rejected like Redis rejects an
/// out-of-range expiry.
fn deadline(operation: Operation, key: &str, now: Instant, seconds: u64) -> KvResult<Instant> {
    now.checked_add(Duration::from_secs(seconds))
        .ok_or_else(|| KvError::remote(operation, key, "invalid expire time"))
}

/// Shared in-process key-value store.
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, Entry>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent command fail as if the network dropped.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live (non-expired) keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data
            .read()
            .map(|data| data.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, operation: Operation, key: &str) -> KvResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(KvError::remote(operation, key, "Connection error"));
        }
        Ok(())
    }

    fn read_data(
        &self,
        operation: Operation,
        key: &str,
    ) -> KvResult<RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.check(operation, key)?;
        self.data
            .read()
            .map_err(|e| KvError::remote(operation, key, format!("Lock poisoned: {}", e)))
    }

    fn write_data(
        &self,
        operation: Operation,
        key: &str,
    ) -> KvResult<RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.check(operation, key)?;
        self.data
            .write()
            .map_err(|e| KvError::remote(operation, key, format!("Lock poisoned: {}", e)))
    }
}

impl StoreHandle for MemoryStore {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        let data = self.read_data(Operation::Get, key)?;
        let now = Instant::now();
        Ok(data
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> KvResult<bool> {
        let mut data = self.write_data(Operation::Set, key)?;
        data.insert(key.to_string(), Entry::new(value, None));
        Ok(true)
    }

    fn set_ex(&self, key: &str, value: &str, seconds: u64) -> KvResult<bool> {
        if seconds == 0 {
            return Err(KvError::remote(
                Operation::SetEx,
                key,
                "invalid expire time in 'setex' command",
            ));
        }
        let expires_at = deadline(Operation::SetEx, key, Instant::now(), seconds)?;
        let mut data = self.write_data(Operation::SetEx, key)?;
        data.insert(key.to_string(), Entry::new(value, Some(expires_at)));
        Ok(true)
    }

    fn del(&self, keys: &[String]) -> KvResult<usize> {
        let first = keys.first().map(String::as_str).unwrap_or("");
        let mut data = self.write_data(Operation::Delete, first)?;
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter(|key| data.remove(key.as_str()).is_some_and(|e| e.is_live(now)))
            .count();
        Ok(removed)
    }

    fn exists(&self, key: &str) -> KvResult<bool> {
        let data = self.read_data(Operation::Exists, key)?;
        let now = Instant::now();
        Ok(data.get(key).is_some_and(|e| e.is_live(now)))
    }

    fn ttl(&self, key: &str) -> KvResult<i64> {
        let data = self.read_data(Operation::Ttl, key)?;
        let now = Instant::now();
        let ttl = match data.get(key).filter(|e| e.is_live(now)) {
            None => TTL_MISSING,
            Some(Entry {
                expires_at: None, ..
            }) => TTL_PERSISTENT,
            Some(Entry {
                expires_at: Some(deadline),
                ..
            }) => {
                // Rounded to the nearest second, as Redis does
                let remaining_ms = deadline.saturating_duration_since(now).as_millis();
                ((remaining_ms + 500) / 1000) as i64
            }
        };
        Ok(ttl)
    }

    fn expire(&self, key: &str, seconds: i64) -> KvResult<bool> {
        let mut data = self.write_data(Operation::Expire, key)?;
        let now = Instant::now();
        if !data.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        if seconds <= 0 {
            data.remove(key);
            return Ok(true);
        }
        let expires_at = deadline(Operation::Expire, key, now, seconds.unsigned_abs())?;
        if let Some(entry) = data.get_mut(key) {
            entry.expires_at = Some(expires_at);
        }
        Ok(true)
    }

    fn keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        let matcher = glob_to_regex(pattern)
            .map_err(|e| KvError::remote(Operation::Keys, pattern, e.to_string()))?;
        let data = self.read_data(Operation::Keys, pattern)?;
        let now = Instant::now();
        Ok(data
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && matcher.is_match(key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn ping(&self) -> KvResult<()> {
        self.check(Operation::Ping, "")
    }

    fn execute(&self, pipeline: Pipeline) -> KvResult<()> {
        let first = pipeline
            .commands()
            .first()
            .map(|c| c.key().to_string())
            .unwrap_or_default();
        let mut data = self.write_data(Operation::Pipeline, &first)?;

        // Validate every command first so a bad one leaves the store untouched
        let now = Instant::now();
        let entries = pipeline
            .into_iter()
            .map(|command| match command {
                PipelineCommand::Set { key, value } => Ok((key, Entry::new(&value, None))),
                PipelineCommand::SetEx { key, seconds: 0, .. } => Err(KvError::remote(
                    Operation::Pipeline,
                    &key,
                    "invalid expire time in 'setex' command",
                )),
                PipelineCommand::SetEx {
                    key,
                    value,
                    seconds,
                } => {
                    let expires_at = deadline(Operation::Pipeline, &key, now, seconds)?;
                    Ok((key, Entry::new(&value, Some(expires_at))))
                }
            })
            .collect::<KvResult<Vec<_>>>()?;

        data.extend(entries);
        Ok(())
    }
}

/// Translate a Redis glob pattern into an anchored regex.
///
/// Supports `*`, `?`, `[abc]`, `[^a]`, `[a-z]` and backslash escapes. An
/// unterminated or empty class is matched literally.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut out = String::from("(?s)^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push_str(&regex::escape(&next.to_string()));
                } else {
                    out.push_str(r"\\");
                }
            }
            '[' => {
                let mut raw = String::from("[");
                let mut class = String::from("[");
                let mut body = 0usize;
                let mut closed = false;

                if chars.peek() == Some(&'^') {
                    chars.next();
                    raw.push('^');
                    class.push('^');
                }
                for c in chars.by_ref() {
                    raw.push(c);
                    match c {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '-' if body > 0 => class.push('-'),
                        other => {
                            class.push_str(&regex::escape(&other.to_string()));
                            body += 1;
                        }
                    }
                }

                if closed && body > 0 && !class.ends_with('-') {
                    class.push(']');
                    out.push_str(&class);
                } else {
                    out.push_str(&regex::escape(&raw));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    Regex::new(&out)
}

/// Handle leased from a [`MemoryPool`]; fails once the pool is closed.
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    store: MemoryStore,
    closed: Arc<AtomicBool>,
}

impl MemoryHandle {
    fn live(&self, operation: Operation, key: &str) -> KvResult<&MemoryStore> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(KvError::remote(operation, key, "Connection pool closed"));
        }
        Ok(&self.store)
    }
}

impl StoreHandle for MemoryHandle {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.live(Operation::Get, key)?.get(key)
    }

    fn set(&self, key: &str, value: &str) -> KvResult<bool> {
        self.live(Operation::Set, key)?.set(key, value)
    }

    fn set_ex(&self, key: &str, value: &str, seconds: u64) -> KvResult<bool> {
        self.live(Operation::SetEx, key)?.set_ex(key, value, seconds)
    }

    fn del(&self, keys: &[String]) -> KvResult<usize> {
        self.live(Operation::Delete, "")?.del(keys)
    }

    fn exists(&self, key: &str) -> KvResult<bool> {
        self.live(Operation::Exists, key)?.exists(key)
    }

    fn ttl(&self, key: &str) -> KvResult<i64> {
        self.live(Operation::Ttl, key)?.ttl(key)
    }

    fn expire(&self, key: &str, seconds: i64) -> KvResult<bool> {
        self.live(Operation::Expire, key)?.expire(key, seconds)
    }

    fn keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        self.live(Operation::Keys, pattern)?.keys(pattern)
    }

    fn ping(&self) -> KvResult<()> {
        self.live(Operation::Ping, "")?.ping()
    }

    fn execute(&self, pipeline: Pipeline) -> KvResult<()> {
        self.live(Operation::Pipeline, "")?.execute(pipeline)
    }
}

/// Pool over a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryPool {
    store: MemoryStore,
    closed: Arc<AtomicBool>,
    max_size: usize,
}

impl MemoryPool {
    pub fn new(store: MemoryStore, max_size: usize) -> Self {
        Self {
            store,
            closed: Arc::new(AtomicBool::new(false)),
            max_size,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl StorePool for MemoryPool {
    type Handle = MemoryHandle;

    fn handle(&self) -> KvResult<MemoryHandle> {
        if self.is_closed() {
            return Err(KvError::connectivity("Connection pool closed"));
        }
        Ok(MemoryHandle {
            store: self.store.clone(),
            closed: Arc::clone(&self.closed),
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn status(&self) -> PoolStatus {
        PoolStatus {
            max_size: self.max_size,
            size: 0,
            available: 0,
        }
    }
}

/// Factory producing [`MemoryPool`]s over one shared store.
///
/// Counts every pool it constructs so callers can observe how many times a
/// manager actually built one.
#[derive(Default)]
pub struct MemoryPoolFactory {
    store: MemoryStore,
    created: AtomicUsize,
    unreachable: AtomicBool,
    creation_delay: Option<Duration>,
}

impl MemoryPoolFactory {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            ..Default::default()
        }
    }

    /// Sleep this long inside every pool construction.
    pub fn with_creation_delay(mut self, delay: Duration) -> Self {
        self.creation_delay = Some(delay);
        self
    }

    /// Make pool construction fail as if the host were unreachable.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of pools constructed so far
    pub fn pools_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl PoolFactory for MemoryPoolFactory {
    type Pool = MemoryPool;

    fn create_pool(&self, config: &StoreConfig) -> KvResult<MemoryPool> {
        config
            .validate()
            .map_err(|e| KvError::connectivity(e.to_string()))?;

        if let Some(delay) = self.creation_delay {
            std::thread::sleep(delay);
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(KvError::connectivity(format!(
                "Connection refused ({}:{})",
                config.host, config.port
            )));
        }

        let count = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(pools_created = count, "In-memory pool constructed");
        Ok(MemoryPool::new(self.store.clone(), config.max_connections))
    }
}
