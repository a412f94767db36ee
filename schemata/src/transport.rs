use std::{future::Future, sync::Arc, time::Duration};

use crate::{Error, Result, Topic};

/// A record consumed from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    topic: Topic,
    offset: u64,
    payload: Arc<[u8]>,
}

impl Message {
    pub fn new(topic: impl Into<Topic>, offset: u64, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            topic: topic.into(),
            offset,
            payload: payload.into(),
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Position of the record in its log.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Outcome of a single [`Transport::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(Message),
    /// A non-fatal problem reported by the transport. The poll loop logs it
    /// and keeps going.
    Error(Error),
}

/// Acknowledgement of a produced record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: Topic,
    pub offset: u64,
}

/// The publish/subscribe transport the replica is built from.
///
/// The engine relies only on the order in which `poll` hands out records;
/// it adds no ordering of its own. Connection, partition and offset
/// management are the implementor's concern.
///
/// Methods return futures but can be implemented as `async fn` directly.
pub trait Transport: Send + Sync + 'static {
    /// Subscribe to `topics`. Failure here is a startup failure.
    fn subscribe(&self, topics: &[Topic]) -> impl Future<Output = Result<()>> + Send;

    /// Wait up to `timeout` for the next event.
    ///
    /// Returns `None` when nothing arrived in time. Must be cancel-safe: the
    /// poll loop drops an in-flight `poll` when it is asked to stop, and no
    /// record may be lost because of that.
    fn poll(&self, timeout: Duration) -> impl Future<Output = Option<TransportEvent>> + Send;

    /// Publish `payload` to `topic` and wait for the acknowledgement.
    fn produce(
        &self,
        topic: &Topic,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<Delivery>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn subscribe(&self, topics: &[Topic]) -> impl Future<Output = Result<()>> + Send {
        self.as_ref().subscribe(topics)
    }

    fn poll(&self, timeout: Duration) -> impl Future<Output = Option<TransportEvent>> + Send {
        self.as_ref().poll(timeout)
    }

    fn produce(
        &self,
        topic: &Topic,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<Delivery>> + Send {
        self.as_ref().produce(topic, payload)
    }
}
