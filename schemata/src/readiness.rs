use std::{
    collections::HashMap,
    fmt,
    future::Future,
    hash::Hash,
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::{FutureExt, future::BoxFuture};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// One-shot signal that a key has become present.
///
/// `Ready` is a future. It resolves to `Ok(())` once the key it was created
/// for is satisfied, or to `Err(Error::SignalDropped)` if whatever was
/// supposed to deliver the signal went away first. It is consumed at most
/// once and holds no reference to the value behind the key.
///
/// Dropping a `Ready` abandons the wait. The eventual notification then
/// becomes a no-op instead of a pending send.
///
/// No timeout is imposed. Compose with [`tokio::time::timeout`] or
/// [`Ready::or_cancelled`] to bound a wait.
#[must_use = "a readiness signal does nothing unless awaited"]
pub struct Ready {
    inner: Inner,
}

enum Inner {
    Signal(oneshot::Receiver<()>),
    Derived(BoxFuture<'static, Result<()>>),
}

impl Ready {
    /// A signal that is already satisfied.
    ///
    /// It travels through the same channel shape as a deferred signal, so
    /// callers never need to distinguish the two.
    pub(crate) fn satisfied() -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        Self::from_receiver(rx)
    }

    pub(crate) fn from_receiver(receiver: oneshot::Receiver<()>) -> Self {
        Self {
            inner: Inner::Signal(receiver),
        }
    }

    /// A signal derived from other signals, e.g. "alias bound, then entry present".
    pub(crate) fn derived<F>(future: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            inner: Inner::Derived(future.boxed()),
        }
    }

    /// Wait for the signal unless `token` is cancelled first.
    ///
    /// Returns `Ok(true)` when the key became ready and `Ok(false)` when the
    /// wait was aborted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignalDropped`] if the signal can no longer fire.
    pub async fn or_cancelled(self, token: &CancellationToken) -> Result<bool> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Ok(false),
            res = self => res.map(|_| true),
        }
    }
}

impl Future for Ready {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            Inner::Signal(rx) => Pin::new(rx).poll(cx).map_err(|_| Error::SignalDropped),
            Inner::Derived(fut) => fut.as_mut().poll(cx),
        }
    }
}

impl fmt::Debug for Ready {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.inner {
            Inner::Signal(_) => "signal",
            Inner::Derived(_) => "derived",
        };
        f.debug_struct("Ready").field("kind", &kind).finish()
    }
}

/// Thread-safe, key-addressable table of one-shot waiters.
///
/// [`wait`](Self::wait) always hands out a fresh, unsatisfied signal. It
/// never checks whether the key is already present; that is the job of the
/// store the registry decorates (see [`ObservableStore`](crate::ObservableStore)).
///
/// [`notify`](Self::notify) fires every waiter registered for the key at the
/// moment of the call and forgets them. Waiters registered afterwards are
/// unaffected: there is no history and no replay.
///
/// The waiter table has its own lock. It is never held while the decorated
/// data lock is taken by a notifier, and no send happens while it is held.
pub struct ReadinessRegistry<K> {
    waiters: Mutex<Waiters<K>>,
}

/// Below this many tracked keys the table is never swept.
const MIN_SWEEP: usize = 64;

struct Waiters<K> {
    lists: HashMap<K, Vec<oneshot::Sender<()>>>,
    sweep_at: usize,
}

impl<K: Eq + Hash> Waiters<K> {
    /// Drop closed waiters everywhere, and keys left without waiters.
    fn sweep(&mut self) -> usize {
        let before = self.lists.len();
        self.lists.retain(|_, list| {
            list.retain(|waiter| !waiter.is_closed());
            !list.is_empty()
        });
        self.sweep_at = (self.lists.len() * 2).max(MIN_SWEEP);
        before - self.lists.len()
    }
}

impl<K: Eq + Hash> ReadinessRegistry<K> {
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(Waiters {
                lists: HashMap::new(),
                sweep_at: MIN_SWEEP,
            }),
        }
    }

    /// Register a new waiter for `key`.
    ///
    /// Abandoned waiters for the same key are pruned here. Once the table
    /// has doubled since the last sweep, abandoned waiters of every key are
    /// pruned too, so keys that are waited on once and never arrive do not
    /// accumulate.
    pub fn wait(&self, key: K) -> Ready {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.waiters.lock();
        if waiters.lists.len() >= waiters.sweep_at {
            waiters.sweep();
        }
        let list = waiters.lists.entry(key).or_default();
        list.retain(|waiter| !waiter.is_closed());
        list.push(tx);
        Ready::from_receiver(rx)
    }

    /// Signal every waiter currently registered for `key`.
    ///
    /// Returns the number of waiters that were still listening.
    pub fn notify(&self, key: &K) -> usize {
        let Some(waiters) = self.waiters.lock().lists.remove(key) else {
            return 0;
        };
        waiters
            .into_iter()
            .map(|waiter| waiter.send(()))
            .filter(|sent| sent.is_ok())
            .count()
    }

    /// Number of registered, not yet notified waiters for `key`.
    pub fn pending(&self, key: &K) -> usize {
        self.waiters
            .lock()
            .lists
            .get(key)
            .map(|list| list.iter().filter(|w| !w.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drop every abandoned waiter now. Returns how many keys were released.
    pub fn prune(&self) -> usize {
        self.waiters.lock().sweep()
    }

    /// Number of keys with registered waiters, abandoned ones included
    /// until they are pruned.
    pub fn tracked_keys(&self) -> usize {
        self.waiters.lock().lists.len()
    }
}

impl<K: Eq + Hash> Default for ReadinessRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for ReadinessRegistry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessRegistry")
            .field("keys", &self.waiters.lock().lists.len())
            .finish()
    }
}
