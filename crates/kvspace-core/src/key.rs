//! Key namespacing.
//!
//! Every engine instance owns a [`Namespace`]. Logical keys supplied by
//! callers become physical keys `prefix:logical`, or stay untouched when the
//! namespace is empty. This is the only place that translation happens.

use std::fmt;

/// Separator placed between the namespace prefix and the logical key
pub const SEPARATOR: char = ':';

/// Key namespace that maps logical keys to physical store keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Namespace {
    prefix: Option<String>,
}

impl Namespace {
    /// Create a namespace. An empty prefix yields the root namespace.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: (!prefix.is_empty()).then_some(prefix),
        }
    }

    /// Namespace without a prefix; physical keys equal logical keys
    pub fn root() -> Self {
        Self { prefix: None }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.prefix.is_none()
    }

    /// Physical key for a logical key
    pub fn physical(&self, logical: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}{}", prefix, SEPARATOR, logical),
            None => logical.to_string(),
        }
    }

    /// Store-side glob pattern for a logical pattern
    pub fn pattern(&self, logical_pattern: &str) -> String {
        self.physical(logical_pattern)
    }

    /// Strip a leading `prefix:` from a physical key. Keys that do not carry
    /// the prefix are returned unchanged.
    pub fn logical<'a>(&self, physical: &'a str) -> &'a str {
        match &self.prefix {
            Some(prefix) => physical
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix(SEPARATOR))
                .unwrap_or(physical),
            None => physical,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix.as_deref().unwrap_or(""))
    }
}

impl From<&str> for Namespace {
    fn from(prefix: &str) -> Self {
        Namespace::new(prefix)
    }
}

impl From<String> for Namespace {
    fn from(prefix: String) -> Self {
        Namespace::new(prefix)
    }
}

impl From<Option<&str>> for Namespace {
    fn from(prefix: Option<&str>) -> Self {
        prefix.map(Namespace::new).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("users", "42", "users:42")]
    #[case("app:v1", "session", "app:v1:session")]
    #[case("", "plain", "plain")]
    #[case("users", "", "users:")]
    fn test_physical_key(#[case] prefix: &str, #[case] logical: &str, #[case] expected: &str) {
        assert_eq!(Namespace::new(prefix).physical(logical), expected);
    }

    #[rstest]
    #[case("users", "*", "users:*")]
    #[case("users", "user:?", "users:user:?")]
    #[case("", "user:*", "user:*")]
    fn test_pattern(#[case] prefix: &str, #[case] pattern: &str, #[case] expected: &str) {
        assert_eq!(Namespace::new(prefix).pattern(pattern), expected);
    }

    #[rstest]
    #[case("users", "users:42", "42")]
    #[case("users", "users:users:42", "users:42")]
    #[case("users", "other:42", "other:42")]
    #[case("users", "users42", "users42")]
    #[case("", "users:42", "users:42")]
    fn test_logical_strips_only_leading_prefix(
        #[case] prefix: &str,
        #[case] physical: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(Namespace::new(prefix).logical(physical), expected);
    }

    #[test]
    fn test_empty_prefix_is_root() {
        assert!(Namespace::new("").is_root());
        assert!(Namespace::root().is_root());
        assert_eq!(Namespace::from(None), Namespace::root());
        assert_eq!(Namespace::from(Some("a")).prefix(), Some("a"));
    }
}
