use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Alias, Config, EntryId, NameVersion, Result, Topic,
    codec::Compiler,
    transport::{Delivery, Transport},
};

/// Payload of an entry update: "entry `id` now has specification `spec`".
///
/// Serialized as `{"UUID": "...", "spec": "..."}`. The id is also accepted
/// as `id` when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(rename = "UUID", alias = "id")]
    pub id: EntryId,
    pub spec: String,
}

/// Payload of an alias binding: "`alias` now points at entry `id`".
///
/// Serialized as `{"UUID": "...", "alias": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRequest {
    #[serde(rename = "UUID", alias = "id")]
    pub id: EntryId,
    pub alias: Alias,
}

/// Producer side of the catalog.
///
/// Publishes entry updates and alias bindings to the topics named in
/// [`Config`], which is how every replica, including the publisher's own,
/// learns about them. Nothing is applied locally.
#[derive(Debug)]
pub struct Updater<T: Transport> {
    transport: T,
    config: Arc<Config>,
}

impl<T: Transport> Updater<T> {
    pub fn new(transport: T, config: Config) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Publish `spec` as the specification of entry `id`.
    ///
    /// The specification is not checked here; replicas drop it if it does
    /// not compile.
    pub async fn update_schema(&self, id: EntryId, spec: &str) -> Result<Delivery> {
        let request = UpdateRequest {
            id,
            spec: spec.to_owned(),
        };
        let delivery = self.publish(self.config.entry_topic(), &request).await?;
        tracing::info!(entry_id = %id, offset = delivery.offset, "entry update published");
        Ok(delivery)
    }

    /// Bind `alias` to entry `id`.
    pub async fn update_alias(&self, alias: &Alias, id: EntryId) -> Result<Delivery> {
        let request = AliasRequest {
            id,
            alias: alias.clone(),
        };
        let delivery = self.publish(self.config.alias_topic(), &request).await?;
        tracing::info!(alias = %alias, entry_id = %id, offset = delivery.offset, "alias binding published");
        Ok(delivery)
    }

    /// Register a brand-new schema under `name`.
    ///
    /// Checks that `spec` compiles with `compiler`, mints a fresh id,
    /// publishes the entry and then binds the origin alias `name-v0` to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpecification`](crate::Error::InvalidSpecification)
    /// without publishing anything if `spec` does not compile, or the
    /// transport error of whichever publish failed.
    pub async fn create_schema<C: Compiler>(
        &self,
        name: &str,
        spec: &str,
        compiler: &C,
    ) -> Result<(EntryId, NameVersion)> {
        let version = NameVersion::origin(name);
        let id = self.publish_version(&version, spec, compiler).await?;
        Ok((id, version))
    }

    /// Publish `spec` as a new entry and bind `version`'s alias to it.
    pub async fn publish_version<C: Compiler>(
        &self,
        version: &NameVersion,
        spec: &str,
        compiler: &C,
    ) -> Result<EntryId> {
        compiler.compile(spec)?;

        let id = EntryId::new();
        self.update_schema(id, spec).await?;
        self.update_alias(&version.alias(), id).await?;
        Ok(id)
    }

    async fn publish<P: Serialize>(&self, topic: &Topic, payload: &P) -> Result<Delivery> {
        let bytes = serde_json::to_vec(payload).map_err(crate::Error::external)?;
        self.transport.produce(topic, bytes).await
    }
}
