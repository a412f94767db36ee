use std::time::Duration;

use tokio::sync::Semaphore;

use crate::Topic;

/// Runtime configuration for the event router and the repository.
///
/// Use the builder methods to customize, or [`Default`] for the values the
/// catalog topics are normally published with.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use schemata::Config;
///
/// let config = Config::default()
///     .with_poll_timeout(Duration::from_millis(20))   // React to stop faster
///     .with_max_in_flight_handlers(64)                // Tighter handler pool
///     .with_entry_topic("catalog_update");            // Custom topic name
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound for a single transport poll.
    /// Also bounds how long the loop takes to notice a stop request.
    /// Default: 100ms
    poll_timeout: Duration,

    /// Maximum number of handler invocations running at the same time.
    /// When the pool is exhausted the poll loop waits for a free slot.
    /// Default: 256
    max_in_flight_handlers: usize,

    /// Topic carrying entry updates (`{UUID, spec}`).
    /// Default: `schema_update`
    entry_topic: Topic,

    /// Topic carrying alias bindings (`{UUID, alias}`).
    /// Default: `schema_alias`
    alias_topic: Topic,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            poll_timeout: Duration::from_millis(100),
            max_in_flight_handlers: 256,
            entry_topic: Topic::new(Topic::SCHEMA_UPDATE),
            alias_topic: Topic::new(Topic::SCHEMA_ALIAS),
        }
    }
}

impl Config {
    /// Set the upper bound for a single transport poll.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Set the size of the handler pool.
    ///
    /// Values below 1 are raised to 1; a pool without slots would never
    /// dispatch anything. Values above [`Semaphore::MAX_PERMITS`] are
    /// lowered to it.
    pub fn with_max_in_flight_handlers(mut self, limit: usize) -> Self {
        self.max_in_flight_handlers = clamp_pool(limit);
        self
    }

    /// Size of the handler pool, always within `1..=Semaphore::MAX_PERMITS`,
    /// including for deserialized configurations.
    pub fn max_in_flight_handlers(&self) -> usize {
        clamp_pool(self.max_in_flight_handlers)
    }

    pub fn with_entry_topic(mut self, topic: impl Into<Topic>) -> Self {
        self.entry_topic = topic.into();
        self
    }

    pub fn entry_topic(&self) -> &Topic {
        &self.entry_topic
    }

    pub fn with_alias_topic(mut self, topic: impl Into<Topic>) -> Self {
        self.alias_topic = topic.into();
        self
    }

    pub fn alias_topic(&self) -> &Topic {
        &self.alias_topic
    }
}

fn clamp_pool(limit: usize) -> usize {
    limit.clamp(1, Semaphore::MAX_PERMITS)
}
