use std::{fmt, str::FromStr};

use crate::{Alias, Error, Result};

const SEPARATOR: &str = "-v";

/// A schema name paired with a monotonically increasing version.
///
/// Every `NameVersion` has a deterministic alias, `name + "-v" + hex(version)`:
///
/// ```rust
/// use schemata::NameVersion;
///
/// let v = NameVersion::new("orders", 26);
/// assert_eq!(v.alias().as_str(), "orders-v1a");
/// assert_eq!(NameVersion::from_alias("orders-v1a").unwrap(), v);
/// ```
///
/// Version 0 is the origin and has no predecessor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct NameVersion {
    name: String,
    version: u64,
}

impl NameVersion {
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// The first version of `name`.
    pub fn origin(name: impl Into<String>) -> Self {
        Self::new(name, 0)
    }

    pub fn is_origin(&self) -> bool {
        self.version == 0
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// The preceding version. The origin is its own predecessor.
    #[must_use]
    pub fn previous(&self) -> Self {
        Self::new(self.name.clone(), self.version.saturating_sub(1))
    }

    /// The following version, saturating at `u64::MAX`.
    #[must_use]
    pub fn next(&self) -> Self {
        Self::new(self.name.clone(), self.version.saturating_add(1))
    }

    pub fn alias(&self) -> Alias {
        Alias::from(self.to_string())
    }

    /// Parse a versioned alias back into its name and version.
    ///
    /// The split happens on the last `-v`, so names may themselves contain
    /// `-v`. The version must be canonical lowercase hex, which keeps
    /// `from_alias(a).alias() == a` for every accepted `a`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersionAlias`] when `alias` has no separator,
    /// an empty name, or a version that is not canonical lowercase hex.
    pub fn from_alias(alias: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersionAlias(alias.into());

        let (name, hex) = alias.rsplit_once(SEPARATOR).ok_or_else(invalid)?;
        if name.is_empty() || !is_canonical_hex(hex) {
            return Err(invalid());
        }
        let version = u64::from_str_radix(hex, 16).map_err(|_| invalid())?;
        Ok(Self::new(name, version))
    }
}

fn is_canonical_hex(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        && (s == "0" || !s.starts_with('0'))
}

impl fmt::Display for NameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:x}", self.name, SEPARATOR, self.version)
    }
}

impl FromStr for NameVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_alias(s)
    }
}

impl From<&NameVersion> for Alias {
    fn from(value: &NameVersion) -> Self {
        value.alias()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_encoding() {
        assert_eq!(NameVersion::origin("myschema").alias().as_str(), "myschema-v0");
        assert_eq!(NameVersion::new("myschema", 13).alias().as_str(), "myschema-vd");
        assert_eq!(NameVersion::new("myschema", 255).to_string(), "myschema-vff");
    }

    #[test]
    fn test_previous_saturates_at_origin() {
        let origin = NameVersion::origin("a");
        assert!(origin.is_origin());
        assert_eq!(origin.previous(), origin);
        assert_eq!(NameVersion::new("a", 5).previous(), NameVersion::new("a", 4));
    }

    #[test]
    fn test_next_increments_and_saturates() {
        assert_eq!(NameVersion::origin("a").next(), NameVersion::new("a", 1));
        let max = NameVersion::new("a", u64::MAX);
        assert_eq!(max.next(), max);
    }

    #[test]
    fn test_parse_splits_on_last_separator() {
        let parsed = NameVersion::from_alias("my-vault-v2a").unwrap();
        assert_eq!(parsed.name(), "my-vault");
        assert_eq!(parsed.version(), 0x2a);
    }

    #[test]
    fn test_parse_reverses_alias() {
        for v in [0, 1, 15, 16, 4096, u64::MAX] {
            let nv = NameVersion::new("orders", v);
            assert_eq!(NameVersion::from_alias(nv.alias().as_str()).unwrap(), nv);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "orders",
            "orders-v",
            "-v1",
            "orders-vxyz",
            "orders-v01",
            "orders-vA",
            "orders-v+1",
            "orders-v1ffffffffffffffff",
        ] {
            assert_eq!(
                NameVersion::from_alias(bad),
                Err(Error::InvalidVersionAlias(bad.into())),
                "{bad} should be rejected"
            );
        }
    }
}
