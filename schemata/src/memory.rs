use std::{
    collections::HashSet,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use tokio::{sync::Notify, time::Instant};

use crate::{
    Error, Result, Topic,
    transport::{Delivery, Message, Transport, TransportEvent},
};

enum Record {
    Data(Message),
    Fault(Arc<str>),
}

/// In-process, append-only event log.
///
/// All records share one total order. Every [`MemoryTransport`] connected to
/// the log reads it from offset 0 with its own cursor, so each replica
/// rebuilds its state from the whole history, as it would against a
/// retained broker topic consumed from the earliest offset.
///
/// # Example
///
/// ```rust,ignore
/// let log = MemoryLog::new();
/// let repo = CatalogRepository::new(log.connect(), Config::default());
/// let updater = Updater::new(log.connect(), Config::default());
/// ```
pub struct MemoryLog {
    records: Mutex<Vec<Record>>,
    appended: Notify,
    closed: AtomicBool,
}

impl MemoryLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            appended: Notify::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Create a consumer/producer handle with a fresh cursor at offset 0.
    pub fn connect(self: &Arc<Self>) -> MemoryTransport {
        MemoryTransport {
            log: self.clone(),
            cursor: Mutex::new(0),
            topics: RwLock::new(HashSet::new()),
        }
    }

    /// Append a record and wake every waiting consumer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] once the log is closed.
    pub fn append(&self, topic: &Topic, payload: impl Into<Arc<[u8]>>) -> Result<Delivery> {
        if self.is_closed() {
            return Err(Error::transport("log is closed"));
        }
        let offset = {
            let mut records = self.records.lock();
            let offset = records.len() as u64;
            records.push(Record::Data(Message::new(topic.clone(), offset, payload)));
            offset
        };
        self.appended.notify_waiters();
        Ok(Delivery {
            topic: topic.clone(),
            offset,
        })
    }

    /// Append a transport fault. Each subscribed consumer observes it once,
    /// in log order, as [`TransportEvent::Error`].
    pub fn inject_fault(&self, reason: &str) {
        self.records.lock().push(Record::Fault(reason.into()));
        self.appended.notify_waiters();
    }

    /// Refuse new subscriptions and appends. Already appended records stay
    /// readable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MemoryLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLog")
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A connection to a [`MemoryLog`].
pub struct MemoryTransport {
    log: Arc<MemoryLog>,
    cursor: Mutex<usize>,
    topics: RwLock<HashSet<Topic>>,
}

impl MemoryTransport {
    pub fn log(&self) -> &Arc<MemoryLog> {
        &self.log
    }

    /// Offset of the next record this connection will look at.
    pub fn position(&self) -> usize {
        *self.cursor.lock()
    }

    /// Take the next record visible to this connection, if any.
    ///
    /// Never awaits, which is what keeps `poll` cancel-safe.
    fn next_event(&self) -> Option<TransportEvent> {
        let topics = self.topics.read();
        if topics.is_empty() {
            return None;
        }
        let mut cursor = self.cursor.lock();
        let records = self.log.records.lock();
        while let Some(record) = records.get(*cursor) {
            *cursor += 1;
            match record {
                Record::Data(message) if topics.contains(message.topic()) => {
                    return Some(TransportEvent::Message(message.clone()));
                }
                Record::Data(_) => {}
                Record::Fault(reason) => {
                    return Some(TransportEvent::Error(Error::Transport(reason.clone())));
                }
            }
        }
        None
    }
}

impl Transport for MemoryTransport {
    async fn subscribe(&self, topics: &[Topic]) -> Result<()> {
        if self.log.is_closed() {
            return Err(Error::startup("cannot subscribe to a closed log"));
        }
        self.topics.write().extend(topics.iter().cloned());
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Option<TransportEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let appended = self.log.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            if let Some(event) = self.next_event() {
                return Some(event);
            }
            if tokio::time::timeout_at(deadline, appended).await.is_err() {
                return None;
            }
        }
    }

    async fn produce(&self, topic: &Topic, payload: Vec<u8>) -> Result<Delivery> {
        self.log.append(topic, payload)
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("position", &self.position())
            .field("topics", &self.topics.read().len())
            .finish()
    }
}
