use std::{borrow::Borrow, hash::Hash, sync::Arc};

/// Human-readable name bound to exactly one [`EntryId`](crate::EntryId) at a time.
///
/// Aliases are plain strings. Many aliases may point at the same entry, and
/// an alias may point at an entry that has not arrived yet (or never will).
/// Resolution is always a single hop: an alias never points at another alias.
///
/// `Alias` is cheap to clone. Equality takes a fast path when two aliases
/// share the same allocation and falls back to string comparison.
///
/// Versioned aliases (`orders-v1a`) are produced by
/// [`NameVersion::alias`](crate::NameVersion::alias).
#[derive(Debug, Clone, Ord, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Alias(Arc<str>);

impl Alias {
    pub fn new(alias: &str) -> Self {
        Self(Arc::from(alias))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Alias {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for Alias {}

impl Hash for Alias {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Borrow<str> for Alias {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Alias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Alias {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Alias {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(Alias::from("orders-v0"), 1);
        assert_eq!(map.get("orders-v0"), Some(&1));
    }

    #[test]
    fn test_equality_across_allocations() {
        assert_eq!(Alias::from("a"), Alias::from(String::from("a")));
        assert_ne!(Alias::from("a"), Alias::from("b"));
    }
}
