use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use futures_util::{FutureExt, future::BoxFuture};
use parking_lot::RwLock;
use tokio::{select, sync::Semaphore, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    Config, Error, Result, Topic,
    transport::{Message, Transport, TransportEvent},
};

/// Handles every message consumed from one topic.
///
/// Errors are logged by the router and never reach the poll loop.
pub type Handler = Arc<dyn Fn(Message) -> BoxFuture<'static, Result<()>> + Send + Sync>;

type Routes = Arc<RwLock<HashMap<Topic, Handler>>>;

/// Lifecycle of an [`EventRouter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RouterState {
    /// Constructed, not yet subscribed.
    Idle = 0,
    /// Subscribed, poll loop live.
    Running = 1,
    /// Stop requested, loop finishing its current iteration.
    Stopping = 2,
    /// Loop exited.
    Stopped = 3,
}

impl RouterState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RouterState::Idle,
            1 => RouterState::Running,
            2 => RouterState::Stopping,
            _ => RouterState::Stopped,
        }
    }
}

#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn get(&self) -> RouterState {
        RouterState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: RouterState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: RouterState, to: RouterState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Owns the transport subscription and the poll loop, and dispatches each
/// consumed message to the handler registered for its topic.
///
/// # Dispatch
///
/// The loop polls with a bounded timeout and hands every message to its
/// handler as an independently spawned task, so a slow handler never stalls
/// polling. Dispatch follows transport order; completion order is not
/// preserved, even for messages on the same topic. The number of handler
/// tasks alive at once is capped by [`Config::max_in_flight_handlers`].
///
/// Unknown topics, transport errors and handler errors are logged and the
/// loop continues.
///
/// # Routes
///
/// One handler per topic. Registering a topic again replaces its handler.
/// Routes may be added while the loop runs; the subscription itself is
/// fixed when [`run`](Self::run) is called.
pub struct EventRouter<T: Transport> {
    transport: Arc<T>,
    routes: Routes,
    state: SharedState,
    config: Arc<Config>,
}

impl<T: Transport> EventRouter<T> {
    pub fn new(transport: T, config: Arc<Config>) -> Self {
        Self {
            transport: Arc::new(transport),
            routes: Arc::new(RwLock::new(HashMap::new())),
            state: SharedState(Arc::new(AtomicU8::new(RouterState::Idle as u8))),
            config,
        }
    }

    /// Register `handler` for `topic`, replacing any previous handler.
    ///
    /// # Example
    ///
    /// ```ignore
    /// router.add_route("schema_update", |message| async move {
    ///     println!("{} bytes at offset {}", message.payload().len(), message.offset());
    ///     Ok(())
    /// });
    /// ```
    pub fn add_route<F, Fut>(&self, topic: impl Into<Topic>, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let topic = topic.into();
        tracing::debug!(topic = %topic, "new route");
        let handler: Handler = Arc::new(move |message| handler(message).boxed());
        self.routes.write().insert(topic, handler);
    }

    /// Topics that currently have a route, sorted.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<_> = self.routes.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn state(&self) -> RouterState {
        self.state.get()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Subscribe to all routed topics and start the poll loop in a
    /// background task. Returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRunning`] unless the router is idle, and
    /// [`Error::Startup`] if the subscription fails. After a failed
    /// subscription the router is idle again and `run` may be retried.
    pub async fn run(&self) -> Result<StopHandle> {
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight_handlers()));
        if !self.state.transition(RouterState::Idle, RouterState::Running) {
            return Err(Error::AlreadyRunning);
        }

        let topics = self.topics();
        if let Err(e) = self.transport.subscribe(&topics).await {
            self.state.set(RouterState::Idle);
            tracing::error!(error = %e, "unable to subscribe");
            return Err(match e {
                Error::Startup(_) => e,
                other => Error::startup(other),
            });
        }
        tracing::info!(topics = ?topics, "subscribed, starting poll loop");

        let token = CancellationToken::new();
        let poll_loop = PollLoop {
            transport: self.transport.clone(),
            routes: self.routes.clone(),
            state: self.state.clone(),
            permits,
            config: self.config.clone(),
            token: token.clone(),
        };
        let task = tokio::spawn(poll_loop.run());

        Ok(StopHandle {
            token,
            task: Some(task),
            state: self.state.clone(),
        })
    }
}

impl<T: Transport> fmt::Debug for EventRouter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("topics", &self.topics())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct PollLoop<T: Transport> {
    transport: Arc<T>,
    routes: Routes,
    state: SharedState,
    permits: Arc<Semaphore>,
    config: Arc<Config>,
    token: CancellationToken,
}

impl<T: Transport> PollLoop<T> {
    async fn run(self) {
        let timeout = self.config.poll_timeout();
        loop {
            let permit = select! {
                biased;
                _ = self.token.cancelled() => break,
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let event = select! {
                biased;
                _ = self.token.cancelled() => break,
                event = self.transport.poll(timeout) => event,
            };

            match event {
                None => continue,
                Some(TransportEvent::Message(message)) => {
                    let Some(handler) = self.route_for(message.topic()) else {
                        tracing::debug!(topic = %message.topic(), offset = message.offset(), "no route, ignored");
                        continue;
                    };
                    tokio::spawn(async move {
                        let topic = message.topic().clone();
                        let offset = message.offset();
                        match handler(message).await {
                            Ok(()) => {}
                            Err(e) if e.is_per_event() => {
                                tracing::warn!(topic = %topic, offset, error = %e, "event dropped");
                            }
                            Err(e) => {
                                tracing::error!(topic = %topic, offset, error = %e, "error in route handler");
                            }
                        }
                        drop(permit);
                    });
                }
                Some(TransportEvent::Error(e)) => {
                    tracing::warn!(error = %e, "transport error");
                }
            }
        }
        self.state.set(RouterState::Stopped);
        tracing::info!("poll loop stopped");
    }

    fn route_for(&self, topic: &Topic) -> Option<Handler> {
        self.routes.read().get(topic).cloned()
    }
}

/// Controls a running poll loop.
///
/// Stopping does not wait for, or cancel, handler tasks that were already
/// dispatched; they run to completion on their own. Dropping the handle
/// leaves the loop running.
#[derive(Debug)]
pub struct StopHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    state: SharedState,
}

impl StopHandle {
    /// Request the loop to exit after its current iteration.
    pub fn stop(&self) {
        if self
            .state
            .transition(RouterState::Running, RouterState::Stopping)
        {
            tracing::debug!("stop requested");
        }
        self.token.cancel();
    }

    /// Wait for the loop to exit. Does not request it; see [`stop`](Self::stop).
    ///
    /// # Errors
    ///
    /// Returns [`Error::External`] if the poll loop task panicked.
    pub async fn stopped(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.await.map_err(Error::external)?;
        }
        Ok(())
    }

    /// [`stop`](Self::stop), then [`stopped`](Self::stopped).
    pub async fn shutdown(mut self) -> Result<()> {
        self.stop();
        self.stopped().await
    }

    /// The cancellation token driving the loop. Cancelling it is the same
    /// as calling [`stop`](Self::stop), minus the state transition.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_stopped(&self) -> bool {
        self.state.get() == RouterState::Stopped
    }
}
