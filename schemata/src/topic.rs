use std::{borrow::Borrow, hash::Hash, sync::Arc};

/// Routing key of the transport.
///
/// Every event consumed from the transport carries the topic it was
/// published to. The [`EventRouter`](crate::EventRouter) subscribes to the
/// union of the topics it has routes for and dispatches each event to the
/// single handler registered for its topic.
///
/// The catalog uses two topics, configurable through
/// [`Config`](crate::Config): [`Topic::SCHEMA_UPDATE`] for entry updates and
/// [`Topic::SCHEMA_ALIAS`] for alias bindings.
#[derive(Debug, Clone, Ord, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Topic(Arc<str>);

impl Topic {
    pub const SCHEMA_UPDATE: &'static str = "schema_update";
    pub const SCHEMA_ALIAS: &'static str = "schema_alias";

    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Topic {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for Topic {}

impl Hash for Topic {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}
