//! Publish/subscribe primitive shared by the feedback, error and stopped
//! signals.
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Notifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Emitted once the scheduler loop has halted after a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped {
    /// Generation of the run that halted; each spawned loop gets a new one.
    pub run: u64,
}

/// Synchronous event bus for one payload type.
///
/// `publish` runs the optional hook first, then every handler subscribed at
/// the time of the call in subscription order. Nothing is buffered: handlers
/// subscribed later never see earlier payloads. Cloning yields another handle
/// to the same subscriber list.
pub struct Notifier<T> {
    inner: Arc<NotifierInner<T>>,
}

struct NotifierInner<T> {
    hook: Option<Handler<T>>,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(Subscription, Handler<T>)>>,
}

impl<T> Notifier<T> {
    pub fn new() -> Self {
        Self::from_hook(None)
    }

    /// Notifier whose `hook` runs before the subscribers on every publish.
    pub fn with_hook(hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self::from_hook(Some(Arc::new(hook)))
    }

    fn from_hook(hook: Option<Handler<T>>) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                hook,
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.subscribe_shared(Arc::new(handler))
    }

    pub fn subscribe_shared(&self, handler: Handler<T>) -> Subscription {
        let id = Subscription(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers().push((id, handler));
        id
    }

    /// Returns `false` when the subscription was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut subscribers = self.subscribers();
        match subscribers.iter().position(|(id, _)| *id == subscription) {
            Some(idx) => {
                subscribers.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn publish(&self, payload: &T) {
        if let Some(hook) = &self.inner.hook {
            hook(payload);
        }
        // Snapshot so handlers may (un)subscribe while being called.
        let handlers: Vec<Handler<T>> = self
            .subscribers()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(payload);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    fn subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(Subscription, Handler<T>)>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Notifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Notifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("hook", &self.inner.hook.is_some())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
