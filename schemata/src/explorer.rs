//! Response bodies for browsing a repository.
//!
//! These are the JSON shapes an exploration endpoint serves. Serving them
//! is up to the caller; this module only builds them from a
//! [`CatalogRepository`]. Every listing is sorted so the output is stable.

use serde::{Deserialize, Serialize};

use crate::{Alias, CatalogRepository, EntryId, codec::Compiler, transport::Transport};

/// All entry ids held by a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaListDto {
    pub count: usize,
    pub schemata: Vec<EntryId>,
}

impl SchemaListDto {
    pub fn collect<T: Transport, C: Compiler>(repo: &CatalogRepository<T, C>) -> Self {
        let mut schemata = repo.list_entries();
        schemata.sort();
        Self {
            count: schemata.len(),
            schemata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDto {
    pub uuid: EntryId,
    pub spec: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemataDto {
    pub schemata: Vec<SchemaDto>,
}

impl SchemataDto {
    /// Specifications of the requested entries. Ids that are not present
    /// are left out.
    pub fn describe<T: Transport, C: Compiler>(
        repo: &CatalogRepository<T, C>,
        ids: &[EntryId],
    ) -> Self {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        let schemata = ids
            .into_iter()
            .filter_map(|uuid| {
                repo.specification_of(&uuid)
                    .map(|spec| SchemaDto { uuid, spec })
            })
            .collect();
        Self { schemata }
    }
}

/// All aliases bound in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasListDto {
    pub aliases: Vec<Alias>,
    pub count: usize,
}

impl AliasListDto {
    pub fn collect<T: Transport, C: Compiler>(repo: &CatalogRepository<T, C>) -> Self {
        let mut aliases = repo.list_aliases();
        aliases.sort();
        Self {
            count: aliases.len(),
            aliases,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasDto {
    pub alias: Alias,
    pub uuid: EntryId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasesDto {
    pub aliases: Vec<AliasDto>,
}

impl AliasesDto {
    /// Bindings of the requested aliases. Unbound aliases are left out.
    pub fn describe<T: Transport, C: Compiler>(
        repo: &CatalogRepository<T, C>,
        aliases: &[Alias],
    ) -> Self {
        let mut aliases = aliases.to_vec();
        aliases.sort();
        aliases.dedup();
        let aliases = aliases
            .into_iter()
            .filter_map(|alias| repo.who_is(&alias).map(|uuid| AliasDto { alias, uuid }))
            .collect();
        Self { aliases }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::repository::tests::{PERSON, alias_update, entry_update, repository};

    #[test]
    fn test_listings_are_sorted() {
        let repo = repository();
        let (a, b) = (EntryId::from(2u128), EntryId::from(1u128));
        repo.handle_entry_update(&entry_update(a, PERSON)).unwrap();
        repo.handle_entry_update(&entry_update(b, PERSON)).unwrap();
        repo.handle_alias_update(&alias_update(a, "zeta")).unwrap();
        repo.handle_alias_update(&alias_update(b, "alpha")).unwrap();

        assert_eq!(
            SchemaListDto::collect(&repo),
            SchemaListDto {
                count: 2,
                schemata: vec![b, a],
            }
        );
        let aliases = AliasListDto::collect(&repo);
        assert_eq!(aliases.count, 2);
        assert_eq!(aliases.aliases, vec![Alias::from("alpha"), Alias::from("zeta")]);
    }

    #[test]
    fn test_describe_skips_missing_keys() {
        let repo = repository();
        let id = EntryId::from(1u128);
        repo.handle_entry_update(&entry_update(id, PERSON)).unwrap();
        repo.handle_alias_update(&alias_update(id, "person-v0")).unwrap();

        let schemata = SchemataDto::describe(&repo, &[EntryId::from(9u128), id]);
        assert_eq!(
            schemata.schemata,
            vec![SchemaDto {
                uuid: id,
                spec: PERSON.to_owned(),
            }]
        );

        let aliases =
            AliasesDto::describe(&repo, &[Alias::from("nobody"), Alias::from("person-v0")]);
        assert_eq!(
            serde_json::to_value(&aliases).unwrap(),
            json!({"aliases": [
                {"alias": "person-v0", "uuid": "00000000-0000-0000-0000-000000000001"}
            ]})
        );
    }
}
