//! Namespaced CRUD engine.
//!
//! Each engine holds one store handle, obtained once at construction, and a
//! [`Namespace`] that turns logical keys into physical ones. Operations never
//! retry and never return errors: failures are logged and turned into the
//! documented failure value of each call (`false`, `None`, `-2`, an empty
//! list or `0`). The `fetch*` methods expose the same lookups without that
//! folding, for callers that must tell "absent" from "failed".

use std::collections::HashMap;

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::error::{KvError, KvResult};
use crate::key::Namespace;
use crate::manager::ConnectionManager;
use crate::outcome::{Lookup, TTL_MISSING, Ttl};
use crate::store::{Pipeline, PoolFactory, StoreHandle, StorePool};
use crate::value::Value;

/// CRUD, batch and TTL operations over one namespace
pub struct CrudEngine<H: StoreHandle> {
    handle: H,
    namespace: Namespace,
}

impl<H: StoreHandle> CrudEngine<H> {
    /// Build an engine on the manager's shared pool.
    ///
    /// # Errors
    ///
    /// Returns `KvError::Connectivity` if the pool has to be created and that fails.
    pub fn new<F>(manager: &ConnectionManager<F>, prefix: impl Into<Namespace>) -> KvResult<Self>
    where
        F: PoolFactory,
        F::Pool: StorePool<Handle = H>,
    {
        let handle = manager.acquire_handle()?;
        Ok(Self::with_handle(handle, prefix))
    }

    /// Build an engine around an existing handle.
    pub fn with_handle(handle: H, prefix: impl Into<Namespace>) -> Self {
        let namespace = prefix.into();
        debug!(prefix = %namespace, "CRUD engine initialized");
        Self { handle, namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn prefix(&self) -> Option<&str> {
        self.namespace.prefix()
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Write a value, replacing whatever the key held.
    ///
    /// `expire` is a TTL in seconds; `None` and `Some(0)` both mean no expiry.
    pub fn create(&self, key: &str, value: impl Into<Value>, expire: Option<u64>) -> bool {
        let full_key = self.namespace.physical(key);
        match self.write(&full_key, &value.into(), expire) {
            Ok(acknowledged) => {
                debug!(key = %full_key, ttl = ?expire, "Key written");
                acknowledged
            }
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to write key");
                false
            }
        }
    }

    /// Same contract as [`create`](Self::create); the key need not exist.
    pub fn update(&self, key: &str, value: impl Into<Value>, expire: Option<u64>) -> bool {
        self.create(key, value, expire)
    }

    /// Serialize `record` as JSON and write it.
    pub fn create_record<T: Serialize + ?Sized>(
        &self,
        key: &str,
        record: &T,
        expire: Option<u64>,
    ) -> bool {
        match Value::record(record) {
            Ok(value) => self.create(key, value, expire),
            Err(e) => {
                warn!(key = %self.namespace.physical(key), error = %e, "Failed to serialize record");
                false
            }
        }
    }

    /// Read a value; `None` when the key is absent or the read failed.
    pub fn read(&self, key: &str, parse_structured: bool) -> Option<Value> {
        self.fetch(key, parse_structured).found()
    }

    /// Read a value, keeping absence and failure apart.
    pub fn fetch(&self, key: &str, parse_structured: bool) -> Lookup<Value> {
        self.fetch_raw(key)
            .map(|raw| Value::decode(raw, parse_structured))
    }

    /// Read a value as a caller-declared type.
    pub fn fetch_as<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let full_key = self.namespace.physical(key);
        match self.fetch_raw(key) {
            Lookup::Found(raw) => match Value::decode_as::<T>(&full_key, &raw) {
                Ok(value) => Lookup::Found(value),
                Err(e) => {
                    warn!(key = %full_key, error = %e, "Stored value does not match requested type");
                    Lookup::Failed(e)
                }
            },
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Failed(e) => Lookup::Failed(e),
        }
    }

    /// Remove a key; `true` only if something was removed.
    pub fn delete(&self, key: &str) -> bool {
        let full_key = self.namespace.physical(key);
        match self.handle.del(std::slice::from_ref(&full_key)) {
            Ok(removed) if removed > 0 => {
                debug!(key = %full_key, "Key deleted");
                true
            }
            Ok(_) => {
                debug!(key = %full_key, "Key to delete does not exist");
                false
            }
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to delete key");
                false
            }
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        let full_key = self.namespace.physical(key);
        match self.handle.exists(&full_key) {
            Ok(exists) => {
                debug!(key = %full_key, exists, "Key existence checked");
                exists
            }
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to check key existence");
                false
            }
        }
    }

    /// Remaining seconds, `-1` without expiry, `-2` if absent or on failure.
    pub fn get_ttl(&self, key: &str) -> i64 {
        self.fetch_ttl(key)
            .found()
            .map_or(TTL_MISSING, |ttl| ttl.as_seconds())
    }

    /// TTL lookup keeping absence and failure apart.
    pub fn fetch_ttl(&self, key: &str) -> Lookup<Ttl> {
        let full_key = self.namespace.physical(key);
        match self.handle.ttl(&full_key) {
            Ok(raw) => {
                debug!(key = %full_key, ttl = raw, "Key TTL read");
                match Ttl::from_raw(raw) {
                    Some(ttl) => Lookup::Found(ttl),
                    None => Lookup::NotFound,
                }
            }
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to read key TTL");
                Lookup::Failed(e)
            }
        }
    }

    /// Attach or replace a TTL on an existing key.
    pub fn set_expire(&self, key: &str, seconds: u64) -> bool {
        let full_key = self.namespace.physical(key);
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        match self.handle.expire(&full_key, seconds) {
            Ok(applied) => {
                debug!(key = %full_key, seconds, applied, "Key expiry set");
                applied
            }
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to set key expiry");
                false
            }
        }
    }

    /// Logical keys in this namespace matching a glob pattern.
    ///
    /// Order is whatever the store returns.
    pub fn get_all_keys(&self, pattern: &str) -> Vec<String> {
        let search = self.namespace.pattern(pattern);
        match self.handle.keys(&search) {
            Ok(keys) => {
                debug!(pattern = %search, count = keys.len(), "Keys listed");
                keys.iter()
                    .map(|key| self.namespace.logical(key).to_string())
                    .collect()
            }
            Err(e) => {
                warn!(pattern = %search, error = %e, "Failed to list keys");
                Vec::new()
            }
        }
    }

    /// Write every entry in one pipelined submission.
    ///
    /// All writes reach the store together, but this is not isolation from
    /// other concurrent batches. On `false` any subset may have been applied.
    pub fn batch_create<K, V, I>(&self, entries: I, expire: Option<u64>) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let pipeline = match self.build_pipeline(entries, expire) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!(error = %e, "Failed to prepare batch");
                return false;
            }
        };

        let count = pipeline.len();
        if count == 0 {
            return true;
        }

        match self.handle.execute(pipeline) {
            Ok(()) => {
                debug!(count, prefix = %self.namespace, "Batch written");
                true
            }
            Err(e) => {
                warn!(count, error = %e, "Batch write failed");
                false
            }
        }
    }

    /// Delete the given logical keys in one call; returns how many existed.
    pub fn batch_delete<K: AsRef<str>>(&self, keys: &[K]) -> usize {
        if keys.is_empty() {
            return 0;
        }

        let full_keys: Vec<String> = keys
            .iter()
            .map(|key| self.namespace.physical(key.as_ref()))
            .collect();

        match self.handle.del(&full_keys) {
            Ok(removed) => {
                debug!(requested = full_keys.len(), removed, "Batch deleted");
                removed
            }
            Err(e) => {
                warn!(requested = full_keys.len(), error = %e, "Batch delete failed");
                0
            }
        }
    }

    fn write(&self, full_key: &str, value: &Value, expire: Option<u64>) -> KvResult<bool> {
        let encoded = value
            .encode()
            .map_err(|e| rekey(e, full_key))?;

        match expire.filter(|&secs| secs > 0) {
            Some(seconds) => self.handle.set_ex(full_key, &encoded, seconds),
            None => self.handle.set(full_key, &encoded),
        }
    }

    fn fetch_raw(&self, key: &str) -> Lookup<String> {
        let full_key = self.namespace.physical(key);
        match self.handle.get(&full_key) {
            Ok(Some(raw)) => {
                debug!(key = %full_key, "Key read");
                Lookup::Found(raw)
            }
            Ok(None) => {
                debug!(key = %full_key, "Key does not exist");
                Lookup::NotFound
            }
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to read key");
                Lookup::Failed(e)
            }
        }
    }

    fn build_pipeline<K, V, I>(&self, entries: I, expire: Option<u64>) -> KvResult<Pipeline>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut pipeline = Pipeline::new();
        for (key, value) in entries {
            let full_key = self.namespace.physical(key.as_ref());
            let encoded = value
                .into()
                .encode()
                .map_err(|e| rekey(e, &full_key))?;
            match expire.filter(|&secs| secs > 0) {
                Some(seconds) => pipeline.queue_set_ex(full_key, encoded, seconds),
                None => pipeline.queue_set(full_key, encoded),
            };
        }
        Ok(pipeline)
    }
}

impl<H: StoreHandle> CrudEngine<H> {
    /// Convenience wrapper over [`batch_create`](Self::batch_create) for maps.
    pub fn batch_create_map<V: Into<Value> + Clone>(
        &self,
        entries: &HashMap<String, V>,
        expire: Option<u64>,
    ) -> bool {
        self.batch_create(
            entries.iter().map(|(k, v)| (k.as_str(), v.clone())),
            expire,
        )
    }
}

/// Attach the physical key to a serialization error raised before the key was known.
fn rekey(error: KvError, full_key: &str) -> KvError {
    match error {
        KvError::Serialization { reason, .. } => KvError::serialization(full_key, reason),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::outcome::TTL_PERSISTENT;
    use serde_json::json;
    use std::time::Duration;

    fn engine(prefix: &str) -> (CrudEngine<MemoryStore>, MemoryStore) {
        let store = MemoryStore::new();
        (CrudEngine::with_handle(store.clone(), prefix), store)
    }

    #[test]
    fn test_create_and_read_text() {
        let (engine, store) = engine("users");
        assert!(engine.create("name", "张三", None));
        assert_eq!(engine.read("name", true), Some(Value::from("张三")));
        assert_eq!(store.get("users:name").unwrap(), Some("张三".into()));
    }

    #[test]
    fn test_integer_reads_back_as_integer() {
        let (engine, _) = engine("");
        assert!(engine.create("age", 25, None));
        assert_eq!(engine.read("age", true), Some(Value::Integer(25)));
        assert_eq!(engine.read("age", false), Some(Value::from("25")));
    }

    #[test]
    fn test_record_round_trip() {
        let (engine, _) = engine("app");
        let record = json!({"name": "ann", "tags": ["a", "b"], "nested": {"x": 1.5}});
        assert!(engine.create("profile", record.clone(), None));
        assert_eq!(engine.read("profile", true), Some(Value::Record(record)));
    }

    #[test]
    fn test_create_record_from_struct() {
        #[derive(Serialize, serde::Deserialize, Debug, PartialEq)]
        struct Session {
            user: String,
            active: bool,
        }

        let (engine, _) = engine("sessions");
        let session = Session {
            user: "ann".into(),
            active: true,
        };
        assert!(engine.create_record("s1", &session, Some(60)));
        assert_eq!(engine.fetch_as::<Session>("s1"), Lookup::Found(session));
    }

    #[test]
    fn test_create_with_expire_sets_ttl() {
        let (engine, _) = engine("tmp");
        assert!(engine.create("token", "abc", Some(60)));
        let ttl = engine.get_ttl("token");
        assert!(ttl <= 60 && ttl > 58, "ttl was {}", ttl);
    }

    #[test]
    fn test_zero_expire_means_no_expiry() {
        let (engine, _) = engine("tmp");
        assert!(engine.create("k", "v", Some(0)));
        assert_eq!(engine.get_ttl("k"), TTL_PERSISTENT);
    }

    #[test]
    fn test_expired_key_is_gone() {
        let (engine, _) = engine("tmp");
        assert!(engine.create("k", "v", Some(1)));
        assert!(engine.exists("k"));

        std::thread::sleep(Duration::from_millis(1100));

        assert!(!engine.exists("k"));
        assert_eq!(engine.get_ttl("k"), TTL_MISSING);
        assert_eq!(engine.fetch_ttl("k"), Lookup::NotFound);
        assert_eq!(engine.read("k", true), None);
    }

    #[test]
    fn test_out_of_range_expire_leaves_engine_usable() {
        let (engine, _) = engine("tmp");
        assert!(!engine.create("huge", "v", Some(u64::MAX)));
        assert!(!engine.exists("huge"));

        assert!(engine.create("k", "v", None));
        assert!(!engine.set_expire("k", u64::MAX));
        assert_eq!(engine.get_ttl("k"), TTL_PERSISTENT);

        assert!(!engine.batch_create(vec![("a", "1"), ("b", "2")], Some(u64::MAX)));
        assert!(engine.create("other", "v", None));
        assert_eq!(engine.read("other", true), Some(Value::from("v")));
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        let (engine, store) = engine("tmp");
        assert!(!engine.create("nan", f64::NAN, None));
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_overwrites_and_creates() {
        let (engine, _) = engine("users");
        assert!(engine.update("fresh", "v1", None));
        assert!(engine.update("fresh", "v2", None));
        assert_eq!(engine.read("fresh", true), Some(Value::from("v2")));
    }

    #[test]
    fn test_delete_reports_whether_removed() {
        let (engine, _) = engine("users");
        engine.create("a", "1", None);
        assert!(engine.delete("a"));
        assert!(!engine.delete("a"));
        assert!(!engine.exists("a"));
    }

    #[test]
    fn test_ttl_sentinels() {
        let (engine, _) = engine("users");
        engine.create("plain", "v", None);
        assert_eq!(engine.get_ttl("plain"), -1);
        assert_eq!(engine.get_ttl("missing"), -2);
        assert_eq!(engine.fetch_ttl("missing"), Lookup::NotFound);
        assert_eq!(engine.fetch_ttl("plain"), Lookup::Found(Ttl::Persistent));
    }

    #[test]
    fn test_set_expire_requires_existing_key() {
        let (engine, _) = engine("users");
        assert!(!engine.set_expire("missing", 10));
        engine.create("k", "v", None);
        assert!(engine.set_expire("k", 10));
        let ttl = engine.get_ttl("k");
        assert!(ttl <= 10 && ttl > 8);
    }

    #[test]
    fn test_get_all_keys_strips_namespace() {
        let (engine, store) = engine("app");
        engine.create("user:1", "a", None);
        engine.create("user:2", "b", None);
        engine.create("order:1", "c", None);
        store.set("other:user:3", "x").unwrap();

        let mut keys = engine.get_all_keys("user:*");
        keys.sort();
        assert_eq!(keys, vec!["user:1", "user:2"]);

        let mut all = engine.get_all_keys("*");
        all.sort();
        assert_eq!(all, vec!["order:1", "user:1", "user:2"]);
    }

    #[test]
    fn test_get_all_keys_without_prefix_returns_physical_keys() {
        let (engine, _) = engine("");
        engine.create("a:1", "x", None);
        assert_eq!(engine.get_all_keys("a:*"), vec!["a:1"]);
    }

    #[test]
    fn test_batch_create_and_delete() {
        let (engine, _) = engine("batch");
        assert!(engine.batch_create([("a", Value::from(1)), ("b", Value::from(2))], None));
        assert_eq!(engine.read("a", true), Some(Value::Integer(1)));
        assert_eq!(engine.read("b", true), Some(Value::Integer(2)));

        assert_eq!(engine.batch_delete(&["a", "b", "c"]), 2);
        assert_eq!(engine.batch_delete::<&str>(&[]), 0);
    }

    #[test]
    fn test_batch_create_with_expire() {
        let (engine, _) = engine("batch");
        let mut entries = HashMap::new();
        entries.insert("x".to_string(), "1".to_string());
        entries.insert("y".to_string(), "2".to_string());
        assert!(engine.batch_create_map(&entries, Some(30)));
        assert!(engine.get_ttl("x") > 28);
        assert!(engine.get_ttl("y") > 28);
    }

    #[test]
    fn test_empty_batch_is_success() {
        let (engine, store) = engine("batch");
        store.set_offline(true);
        assert!(engine.batch_create(Vec::<(&str, Value)>::new(), None));
    }

    #[test]
    fn test_failures_become_failure_values() {
        let (engine, store) = engine("users");
        engine.create("k", "v", None);
        store.set_offline(true);

        assert!(!engine.create("k", "v2", None));
        assert_eq!(engine.read("k", true), None);
        assert!(engine.fetch("k", true).is_failed());
        assert!(!engine.delete("k"));
        assert!(!engine.exists("k"));
        assert_eq!(engine.get_ttl("k"), -2);
        assert!(engine.fetch_ttl("k").is_failed());
        assert!(!engine.set_expire("k", 5));
        assert!(engine.get_all_keys("*").is_empty());
        assert!(!engine.batch_create([("a", "1")], None));
        assert_eq!(engine.batch_delete(&["k"]), 0);

        store.set_offline(false);
        assert_eq!(engine.read("k", true), Some(Value::from("v")));
    }

    #[test]
    fn test_fetch_distinguishes_absent_from_failed() {
        let (engine, store) = engine("users");
        assert!(engine.fetch("missing", true).is_not_found());
        store.set_offline(true);
        assert!(engine.fetch("missing", true).is_failed());
    }

    #[test]
    fn test_fetch_as_type_mismatch_is_failure() {
        let (engine, _) = engine("users");
        engine.create("name", "ann", None);
        let lookup = engine.fetch_as::<u32>("name");
        assert!(matches!(
            lookup.error(),
            Some(KvError::Serialization { key, .. }) if key == "users:name"
        ));
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let store = MemoryStore::new();
        let left = CrudEngine::with_handle(store.clone(), "left");
        let right = CrudEngine::with_handle(store, "right");

        left.create("shared", "L", None);
        right.create("shared", "R", None);

        assert_eq!(left.read("shared", true), Some(Value::from("L")));
        assert_eq!(right.read("shared", true), Some(Value::from("R")));
        assert!(left.delete("shared"));
        assert!(right.exists("shared"));
    }
}
