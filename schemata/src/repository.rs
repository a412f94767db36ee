use std::{fmt, sync::Arc};

use crate::{
    Alias, Config, EntryId, Error, EventRouter, ObservableStore, Result, RouterState, StopHandle,
    codec::{Codec, Compiler, JsonSchemaCompiler},
    commands::{AliasRequest, UpdateRequest},
    readiness::Ready,
    transport::{Message, Transport},
    versioned::Versioned,
};

/// The materialized state, shared between the repository and its handlers.
struct Catalog<C: Compiler> {
    entries: ObservableStore<EntryId, Arc<C::Codec>>,
    aliases: ObservableStore<Alias, EntryId>,
    compiler: C,
}

impl<C: Compiler> Catalog<C> {
    fn apply_entry_update(&self, message: &Message) -> Result<bool> {
        let request: UpdateRequest = parse(message)?;
        let codec = self.compiler.compile(&request.spec)?;
        let overwritten = self.entries.upsert(request.id, Arc::new(codec));
        tracing::debug!(entry_id = %request.id, overwritten, "entry materialized");
        Ok(overwritten)
    }

    fn apply_alias_update(&self, message: &Message) -> Result<bool> {
        let request: AliasRequest = parse(message)?;
        let overwritten = self.aliases.upsert(request.alias.clone(), request.id);
        tracing::debug!(alias = %request.alias, entry_id = %request.id, overwritten, "alias bound");
        Ok(overwritten)
    }
}

fn parse<'a, P: serde::Deserialize<'a>>(message: &'a Message) -> Result<P> {
    serde_json::from_slice(message.payload())
        .map_err(|e| Error::MalformedEvent(message.topic().clone(), Arc::new(e)))
}

/// Local, continuously updated replica of the schema catalog.
///
/// The repository holds two stores, entry id to compiled codec and alias to
/// entry id, and fills them from the entry and alias topics named in
/// [`Config`]. Nothing is persisted: every replica rebuilds its state by
/// consuming the topics from the beginning.
///
/// Any key can be waited for before it arrives, see
/// [`wait_entry_ready`](Self::wait_entry_ready) and
/// [`wait_alias_ready`](Self::wait_alias_ready).
///
/// # Consistency
///
/// Updates are dispatched in transport order but applied by concurrently
/// running handlers, so two updates of the same key resolve last-write-wins
/// in real time. Listings are point-in-time snapshots. Keys are never
/// removed.
///
/// # Example
///
/// ```rust,ignore
/// let repo = CatalogRepository::new(log.connect(), Config::default());
/// let handle = repo.run().await?;
///
/// repo.wait_alias_ready(&Alias::from("orders-v0")).await?;
/// let id = repo.who_is(&Alias::from("orders-v0")).unwrap();
/// let bytes = repo.encode(&id, &json!({"sku": "A-1"}))?;
/// ```
pub struct CatalogRepository<T: Transport, C: Compiler = JsonSchemaCompiler> {
    catalog: Arc<Catalog<C>>,
    router: EventRouter<T>,
}

impl<T: Transport> CatalogRepository<T> {
    /// Repository over JSON Schema specifications.
    pub fn new(transport: T, config: Config) -> Self {
        Self::with_compiler(transport, JsonSchemaCompiler, config)
    }
}

impl<T: Transport, C: Compiler> CatalogRepository<T, C> {
    pub fn with_compiler(transport: T, compiler: C, config: Config) -> Self {
        let config = Arc::new(config);
        let catalog = Arc::new(Catalog {
            entries: ObservableStore::new(),
            aliases: ObservableStore::new(),
            compiler,
        });
        let router = EventRouter::new(transport, config.clone());

        let entries = catalog.clone();
        router.add_route(config.entry_topic().clone(), move |message| {
            let catalog = entries.clone();
            async move { catalog.apply_entry_update(&message).map(|_| ()) }
        });
        let aliases = catalog.clone();
        router.add_route(config.alias_topic().clone(), move |message| {
            let catalog = aliases.clone();
            async move { catalog.apply_alias_update(&message).map(|_| ()) }
        });

        Self { catalog, router }
    }

    /// Start consuming the catalog topics. See [`EventRouter::run`].
    pub async fn run(&self) -> Result<StopHandle> {
        self.router.run().await
    }

    pub fn state(&self) -> RouterState {
        self.router.state()
    }

    /// Apply an entry update directly, bypassing the transport.
    ///
    /// Returns whether an existing entry was overwritten.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedEvent`] if the payload is not an entry update and
    /// [`Error::InvalidSpecification`] if the specification does not
    /// compile. In both cases nothing is applied.
    pub fn handle_entry_update(&self, message: &Message) -> Result<bool> {
        self.catalog.apply_entry_update(message)
    }

    /// Apply an alias binding directly, bypassing the transport.
    ///
    /// The target entry does not need to exist.
    pub fn handle_alias_update(&self, message: &Message) -> Result<bool> {
        self.catalog.apply_alias_update(message)
    }

    pub fn codec_of(&self, id: &EntryId) -> Option<Arc<C::Codec>> {
        self.catalog.entries.lookup(id)
    }

    fn require(&self, id: &EntryId) -> Result<Arc<C::Codec>> {
        self.codec_of(id).ok_or(Error::NotFound(*id))
    }

    /// Decode `bytes` with the codec of entry `id`.
    pub fn decode(&self, id: &EntryId, bytes: &[u8]) -> Result<<C::Codec as Codec>::Native> {
        self.require(id)?.decode(bytes)
    }

    /// Encode `value` with the codec of entry `id`.
    pub fn encode(&self, id: &EntryId, value: &<C::Codec as Codec>::Native) -> Result<Vec<u8>> {
        self.require(id)?.encode(value)
    }

    /// Fires once entry `id` is present.
    pub fn wait_entry_ready(&self, id: &EntryId) -> Ready {
        self.catalog.entries.wait_ready(id)
    }

    /// Fires once `alias` is bound *and* the entry it points at is present,
    /// whichever happens first.
    ///
    /// The entry is looked up only after the binding is known, so an alias
    /// that arrives before its entry keeps the wait pending until the entry
    /// follows.
    pub fn wait_alias_ready(&self, alias: &Alias) -> Ready {
        let bound = self.catalog.aliases.wait_ready(alias);
        let catalog = self.catalog.clone();
        let alias = alias.clone();
        Ready::derived(async move {
            bound.await?;
            let id = catalog
                .aliases
                .lookup(&alias)
                .ok_or(Error::UnknownSchema(alias))?;
            catalog.entries.wait_ready(&id).await
        })
    }

    pub fn list_entries(&self) -> Vec<EntryId> {
        self.catalog.entries.keys()
    }

    pub fn list_aliases(&self) -> Vec<Alias> {
        self.catalog.aliases.keys()
    }

    /// Resolve `alias` to the entry it is bound to. The entry itself may not
    /// be present yet.
    pub fn who_is(&self, alias: &Alias) -> Option<EntryId> {
        self.catalog.aliases.lookup(alias)
    }

    /// The exact text entry `id` was compiled from.
    pub fn specification_of(&self, id: &EntryId) -> Option<String> {
        self.codec_of(id).map(|codec| codec.specification().to_owned())
    }

    /// Number of distinct entries held.
    pub fn count(&self) -> usize {
        self.catalog.entries.len()
    }

    pub fn alias_count(&self) -> usize {
        self.catalog.aliases.len()
    }

    /// View that addresses entries by [`NameVersion`](crate::NameVersion).
    pub fn versioned(&self) -> Versioned<'_, T, C> {
        Versioned::new(self)
    }
}

impl<T: Transport, C: Compiler> fmt::Debug for CatalogRepository<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogRepository")
            .field("entries", &self.count())
            .field("aliases", &self.alias_count())
            .field("router", &self.router)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use super::*;
    use crate::{
        Topic,
        memory::{MemoryLog, MemoryTransport},
    };

    pub(crate) const PERSON: &str = r#"{
        "type": "object",
        "properties": { "name": { "type": "string" } },
        "required": ["name"]
    }"#;

    const PENDING: Duration = Duration::from_millis(30);
    const FIRES: Duration = Duration::from_secs(2);

    pub(crate) fn entry_update(id: EntryId, spec: &str) -> Message {
        let payload = json!({"UUID": id.to_string(), "spec": spec}).to_string();
        Message::new(Topic::SCHEMA_UPDATE, 0, payload.into_bytes())
    }

    pub(crate) fn alias_update(id: EntryId, alias: &str) -> Message {
        let payload = json!({"UUID": id.to_string(), "alias": alias}).to_string();
        Message::new(Topic::SCHEMA_ALIAS, 0, payload.into_bytes())
    }

    pub(crate) fn repository() -> CatalogRepository<MemoryTransport> {
        CatalogRepository::new(MemoryLog::new().connect(), Config::default())
    }

    async fn fires(ready: Ready) {
        timeout(FIRES, ready)
            .await
            .expect("readiness never fired")
            .unwrap();
    }

    async fn stays_pending(ready: &mut Ready) {
        assert!(timeout(PENDING, ready).await.is_err(), "fired too early");
    }

    #[tokio::test]
    async fn test_specification_round_trips() {
        let repo = repository();
        let id = EntryId::new();
        assert!(!repo.handle_entry_update(&entry_update(id, PERSON)).unwrap());

        assert_eq!(repo.specification_of(&id).as_deref(), Some(PERSON));
        assert_eq!(repo.list_entries(), vec![id]);
        fires(repo.wait_entry_ready(&id)).await;
    }

    #[tokio::test]
    async fn test_wait_registered_before_update() {
        let repo = repository();
        let id = EntryId::new();
        let mut ready = repo.wait_entry_ready(&id);
        stays_pending(&mut ready).await;

        repo.handle_entry_update(&entry_update(id, PERSON)).unwrap();
        fires(ready).await;
    }

    #[tokio::test]
    async fn test_alias_wait_entry_first() {
        let repo = repository();
        let id = EntryId::new();
        let alias = Alias::from("person-v0");
        let mut ready = repo.wait_alias_ready(&alias);

        repo.handle_entry_update(&entry_update(id, PERSON)).unwrap();
        stays_pending(&mut ready).await;

        repo.handle_alias_update(&alias_update(id, "person-v0")).unwrap();
        fires(ready).await;
    }

    #[tokio::test]
    async fn test_alias_wait_alias_first() {
        let repo = repository();
        let id = EntryId::new();
        let alias = Alias::from("person-v0");
        let mut ready = repo.wait_alias_ready(&alias);

        repo.handle_alias_update(&alias_update(id, "person-v0")).unwrap();
        stays_pending(&mut ready).await;

        repo.handle_entry_update(&entry_update(id, PERSON)).unwrap();
        fires(ready).await;
    }

    #[tokio::test]
    async fn test_alias_wait_when_both_present() {
        let repo = repository();
        let id = EntryId::new();
        repo.handle_entry_update(&entry_update(id, PERSON)).unwrap();
        repo.handle_alias_update(&alias_update(id, "person-v0")).unwrap();
        fires(repo.wait_alias_ready(&Alias::from("person-v0"))).await;
    }

    #[tokio::test]
    async fn test_same_update_twice_reports_overwrite() {
        let repo = repository();
        let id = EntryId::new();
        let update = entry_update(id, PERSON);
        assert!(!repo.handle_entry_update(&update).unwrap());
        assert!(repo.handle_entry_update(&update).unwrap());
        assert_eq!(repo.specification_of(&id).as_deref(), Some(PERSON));
        assert_eq!(repo.count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_specification_is_not_materialized() {
        let repo = repository();
        let id = EntryId::new();
        let res = repo.handle_entry_update(&entry_update(id, "not a valid spec"));
        assert!(matches!(res, Err(Error::InvalidSpecification(_))));
        assert!(!repo.list_entries().contains(&id));
        assert_eq!(repo.count(), 0);
    }

    #[tokio::test]
    async fn test_dangling_alias() {
        let repo = repository();
        let id = EntryId::new();
        repo.handle_alias_update(&alias_update(id, "ghost")).unwrap();

        let alias = Alias::from("ghost");
        assert_eq!(repo.who_is(&alias), Some(id));
        stays_pending(&mut repo.wait_alias_ready(&alias)).await;
        assert_eq!(
            repo.decode(&id, b"{}").unwrap_err(),
            Error::NotFound(id)
        );
    }

    #[tokio::test]
    async fn test_alias_rebinding() {
        let repo = repository();
        let (first, second) = (EntryId::new(), EntryId::new());
        assert!(!repo.handle_alias_update(&alias_update(first, "a")).unwrap());
        assert!(repo.handle_alias_update(&alias_update(second, "a")).unwrap());
        assert_eq!(repo.who_is(&Alias::from("a")), Some(second));
        assert_eq!(repo.alias_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_events_are_rejected() {
        let repo = repository();
        let garbage = Message::new(Topic::SCHEMA_UPDATE, 0, b"{not json".to_vec());
        assert!(matches!(
            repo.handle_entry_update(&garbage),
            Err(Error::MalformedEvent(topic, _)) if topic.as_str() == Topic::SCHEMA_UPDATE
        ));

        let missing_alias = Message::new(
            Topic::SCHEMA_ALIAS,
            0,
            json!({"UUID": EntryId::new().to_string()}).to_string().into_bytes(),
        );
        assert!(matches!(
            repo.handle_alias_update(&missing_alias),
            Err(Error::MalformedEvent(..))
        ));
        assert_eq!(repo.alias_count(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_with_origin_alias() {
        let repo = repository();
        let u1 = EntryId::new();
        repo.handle_entry_update(&entry_update(u1, PERSON)).unwrap();
        repo.handle_alias_update(&alias_update(u1, "myschema-v0")).unwrap();

        let alias = Alias::from("myschema-v0");
        assert_eq!(repo.who_is(&alias), Some(u1));
        fires(repo.wait_alias_ready(&alias)).await;
        assert_eq!(repo.count(), 1);
        assert_eq!(repo.list_entries().len(), repo.count());
    }

    #[tokio::test]
    async fn test_encode_decode() {
        let repo = repository();
        let id = EntryId::new();
        let value = json!({"name": "Ada"});
        assert_eq!(repo.encode(&id, &value).unwrap_err(), Error::NotFound(id));

        repo.handle_entry_update(&entry_update(id, PERSON)).unwrap();
        let bytes = repo.encode(&id, &value).unwrap();
        assert_eq!(repo.decode(&id, &bytes).unwrap(), value);
    }

    struct Verbatim;

    struct VerbatimCodec(String);

    impl Compiler for Verbatim {
        type Codec = VerbatimCodec;

        fn compile(&self, specification: &str) -> Result<VerbatimCodec> {
            if specification.is_empty() {
                return Err(Error::invalid_specification("empty"));
            }
            Ok(VerbatimCodec(specification.to_owned()))
        }
    }

    impl Codec for VerbatimCodec {
        type Native = Vec<u8>;

        fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
            Ok(bytes.to_vec())
        }

        fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
            Ok(value.clone())
        }

        fn specification(&self) -> &str {
            &self.0
        }
    }

    #[tokio::test]
    async fn test_custom_compiler() {
        let repo =
            CatalogRepository::with_compiler(MemoryLog::new().connect(), Verbatim, Config::default());
        let id = EntryId::new();
        assert!(repo.handle_entry_update(&entry_update(id, "")).is_err());
        repo.handle_entry_update(&entry_update(id, "raw")).unwrap();
        assert_eq!(repo.specification_of(&id).as_deref(), Some("raw"));
        assert_eq!(repo.decode(&id, b"\x00\xff").unwrap(), vec![0, 255]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_waiters_all_fire() {
        let repo = Arc::new(repository());
        let id = EntryId::new();
        let alias = Alias::from("busy-v0");

        let mut waits = Vec::new();
        for i in 0..64 {
            let ready = if i % 2 == 0 {
                repo.wait_entry_ready(&id)
            } else {
                repo.wait_alias_ready(&alias)
            };
            waits.push(tokio::spawn(ready));
        }

        let writer = repo.clone();
        tokio::spawn(async move {
            writer.handle_alias_update(&alias_update(id, "busy-v0")).unwrap();
            writer.handle_entry_update(&entry_update(id, PERSON)).unwrap();
        });

        for wait in waits {
            timeout(FIRES, wait).await.unwrap().unwrap().unwrap();
        }
    }
}
