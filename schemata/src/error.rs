use std::sync::Arc;

use crate::{Alias, EntryId, Topic};

/// The single error type for all catalog operations.
///
/// Every fallible API returns `schemata::Result<T>` (alias for
/// `Result<T, schemata::Error>`). Failures of the collaborators underneath
/// (transport, codec compiler, JSON payload parsing) are mapped into
/// variants of this enum so callers only need to handle one error type.
///
/// Per-event failures (`InvalidSpecification`, `MalformedEvent`,
/// `Transport`) are logged by the poll loop and never stop it. Only
/// `Startup` is meant to be fatal, and even then the decision to abort is
/// left to the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Entry {0} is not present")]
    NotFound(EntryId),

    #[error("Schema '{0}' is not known to this repository")]
    UnknownSchema(Alias),

    #[error("Invalid specification: {0}")]
    InvalidSpecification(Arc<str>),

    #[error("Malformed event on topic '{0}': {1}")]
    MalformedEvent(Topic, #[source] Arc<serde_json::Error>),

    #[error("Transport error: {0}")]
    Transport(Arc<str>),

    #[error("Unable to start: {0}")]
    Startup(Arc<str>),

    #[error("Codec error: {0}")]
    Codec(Arc<str>),

    #[error("'{0}' is not a versioned alias")]
    InvalidVersionAlias(Arc<str>),

    #[error("Router has already been started.")]
    AlreadyRunning,

    #[error("Readiness signal dropped before delivery")]
    SignalDropped,

    #[error("External error: {0}")]
    External(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn external(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::External(Arc::new(e))
    }

    pub(crate) fn invalid_specification(reason: impl ToString) -> Self {
        Error::InvalidSpecification(reason.to_string().into())
    }

    pub(crate) fn codec(reason: impl ToString) -> Self {
        Error::Codec(reason.to_string().into())
    }

    pub(crate) fn transport(reason: impl ToString) -> Self {
        Error::Transport(reason.to_string().into())
    }

    pub(crate) fn startup(reason: impl ToString) -> Self {
        Error::Startup(reason.to_string().into())
    }

    /// Whether this error only concerns a single event and must not stop
    /// the poll loop.
    pub fn is_per_event(&self) -> bool {
        matches!(
            self,
            Error::InvalidSpecification(_) | Error::MalformedEvent(..) | Error::Transport(_)
        )
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::UnknownSchema(a), Self::UnknownSchema(b)) => a == b,
            (Self::InvalidSpecification(a), Self::InvalidSpecification(b)) => a == b,
            (Self::MalformedEvent(t1, a), Self::MalformedEvent(t2, b)) => {
                t1 == t2 && Arc::ptr_eq(a, b)
            }
            (Self::Transport(a), Self::Transport(b)) => a == b,
            (Self::Startup(a), Self::Startup(b)) => a == b,
            (Self::Codec(a), Self::Codec(b)) => a == b,
            (Self::InvalidVersionAlias(a), Self::InvalidVersionAlias(b)) => a == b,
            (Self::AlreadyRunning, Self::AlreadyRunning) => true,
            (Self::SignalDropped, Self::SignalDropped) => true,
            (Self::External(a), Self::External(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Error {}
