//! Outcome types that keep "absent" and "failed" apart.

use crate::error::KvError;

/// Sentinel returned by TTL queries when no expiry is set
pub const TTL_PERSISTENT: i64 = -1;
/// Sentinel returned by TTL queries when the key does not exist
pub const TTL_MISSING: i64 = -2;

/// Result of looking a key up in the store
#[derive(Debug, Clone)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Failed(KvError),
}

impl<T> Lookup<T> {
    /// Collapse to `Option`, folding failures into `None`.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound | Lookup::Failed(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Lookup::Failed(_))
    }

    pub fn error(&self) -> Option<&KvError> {
        match self {
            Lookup::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Failed(error) => Lookup::Failed(error),
        }
    }

    /// Convert to a `Result`, with absence as `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, KvError> {
        match self {
            Lookup::Found(value) => Ok(Some(value)),
            Lookup::NotFound => Ok(None),
            Lookup::Failed(error) => Err(error),
        }
    }
}

impl<T: PartialEq> PartialEq for Lookup<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Lookup::Found(a), Lookup::Found(b)) => a == b,
            (Lookup::NotFound, Lookup::NotFound) => true,
            // Errors carry free-form reasons; compare by class only
            (Lookup::Failed(a), Lookup::Failed(b)) => {
                std::mem::discriminant(a) == std::mem::discriminant(b)
            }
            _ => false,
        }
    }
}

/// Remaining lifetime of an existing key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key has no expiry
    Persistent,
    /// Key expires after this many seconds
    Expires(u64),
}

impl Ttl {
    /// Interpret a raw store TTL reply; `None` means the key does not exist.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            TTL_PERSISTENT => Some(Ttl::Persistent),
            n if n >= 0 => Some(Ttl::Expires(n as u64)),
            _ => None,
        }
    }

    /// Seconds remaining, or the `-1` sentinel for persistent keys
    pub fn as_seconds(&self) -> i64 {
        match self {
            Ttl::Persistent => TTL_PERSISTENT,
            Ttl::Expires(secs) => i64::try_from(*secs).unwrap_or(i64::MAX),
        }
    }
}
