use crate::{
    CatalogRepository, EntryId, Error, NameVersion, Result,
    codec::{Codec, Compiler},
    readiness::Ready,
    transport::Transport,
};

/// [`CatalogRepository`] addressed by [`NameVersion`] instead of entry id.
///
/// Every call translates the version into its alias (`name-v<hex>`) and
/// resolves it against the repository. The direct forms fail with
/// [`Error::UnknownSchema`] while the alias is unbound; use
/// [`wait_ready`](Self::wait_ready) to block until it is usable.
pub struct Versioned<'a, T: Transport, C: Compiler> {
    repo: &'a CatalogRepository<T, C>,
}

impl<'a, T: Transport, C: Compiler> Versioned<'a, T, C> {
    pub(crate) fn new(repo: &'a CatalogRepository<T, C>) -> Self {
        Self { repo }
    }

    /// The entry `version` currently resolves to.
    pub fn who_is(&self, version: &NameVersion) -> Option<EntryId> {
        self.repo.who_is(&version.alias())
    }

    fn resolve(&self, version: &NameVersion) -> Result<EntryId> {
        let alias = version.alias();
        self.repo.who_is(&alias).ok_or(Error::UnknownSchema(alias))
    }

    pub fn decode(
        &self,
        version: &NameVersion,
        bytes: &[u8],
    ) -> Result<<C::Codec as Codec>::Native> {
        let id = self.resolve(version)?;
        self.repo.decode(&id, bytes)
    }

    pub fn encode(
        &self,
        version: &NameVersion,
        value: &<C::Codec as Codec>::Native,
    ) -> Result<Vec<u8>> {
        let id = self.resolve(version)?;
        self.repo.encode(&id, value)
    }

    /// Fires once `version`'s alias is bound and its entry is present.
    pub fn wait_ready(&self, version: &NameVersion) -> Ready {
        self.repo.wait_alias_ready(&version.alias())
    }

    /// Highest version of `name` currently bound, if any.
    ///
    /// Aliases that do not parse as versioned aliases are ignored.
    pub fn latest_version(&self, name: &str) -> Option<NameVersion> {
        self.repo
            .list_aliases()
            .iter()
            .filter_map(|alias| match NameVersion::from_alias(alias.as_str()) {
                Ok(version) => Some(version),
                Err(e) => {
                    tracing::debug!(alias = %alias, error = %e, "skipping unversioned alias");
                    None
                }
            })
            .filter(|version| version.name() == name)
            .max_by_key(NameVersion::version)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::repository::tests::{PERSON, alias_update, entry_update, repository};

    #[tokio::test]
    async fn test_resolves_bound_version() {
        let repo = repository();
        let id = EntryId::new();
        repo.handle_entry_update(&entry_update(id, PERSON)).unwrap();
        repo.handle_alias_update(&alias_update(id, "person-v0"))
            .unwrap();

        let versioned = repo.versioned();
        let origin = NameVersion::origin("person");
        assert_eq!(versioned.who_is(&origin), Some(id));

        // A resolvable alias must be decoded through its entry, never
        // reported as unknown.
        let value = json!({"name": "Ada"});
        let bytes = versioned.encode(&origin, &value).unwrap();
        assert_eq!(versioned.decode(&origin, &bytes).unwrap(), value);
        versioned.wait_ready(&origin).await.unwrap();
    }

    #[tokio::test]
    async fn test_unbound_version_is_unknown() {
        let repo = repository();
        let versioned = repo.versioned();
        let v1 = NameVersion::new("person", 1);
        assert_eq!(
            versioned.decode(&v1, b"{}").unwrap_err(),
            Error::UnknownSchema(v1.alias())
        );
        assert_eq!(
            versioned.encode(&v1, &json!({})).unwrap_err(),
            Error::UnknownSchema(v1.alias())
        );
    }

    #[tokio::test]
    async fn test_bound_version_without_entry_is_not_found() {
        let repo = repository();
        let id = EntryId::new();
        repo.handle_alias_update(&alias_update(id, "person-v2"))
            .unwrap();
        let v2 = NameVersion::new("person", 2);
        assert_eq!(
            repo.versioned().decode(&v2, b"{}").unwrap_err(),
            Error::NotFound(id)
        );
    }

    #[test]
    fn test_latest_version() {
        let repo = repository();
        for (alias, id) in [
            ("person-v0", 1u128),
            ("person-va", 2),
            ("person-v3", 3),
            ("people-v1f", 4),
            ("person", 5),
            ("person-vlatest", 6),
        ] {
            repo.handle_alias_update(&alias_update(EntryId::from(id), alias))
                .unwrap();
        }

        let versioned = repo.versioned();
        assert_eq!(
            versioned.latest_version("person"),
            Some(NameVersion::new("person", 10))
        );
        assert_eq!(
            versioned.latest_version("people"),
            Some(NameVersion::new("people", 0x1f))
        );
        assert_eq!(versioned.latest_version("nobody"), None);
    }
}
