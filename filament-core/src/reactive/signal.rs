//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which effects depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect runs, the effect becomes a
//!    subscriber of the signal.
//!
//! 2. When the value changes, every subscriber is notified (or queued, if a
//!    batch is open).
//!
//! 3. Writing a value equal to the current one notifies nobody.
//!
//! # Lazy Materialization
//!
//! A freshly constructed signal is only a pending-value holder. The
//! subscriber set is allocated on the first read or the first access other
//! than `set`. Writes before that point replace the pending value without
//! notifying anyone.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value, behind a shared `RefCell`
//! - Once materialized, a bounded set of subscribers and a disposed flag

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::context::ReactiveContext;
use super::runtime::{Runtime, Source};
use super::subscriber::{Subscriber, SubscriberId, SubscriberSet};
use crate::config;
use crate::error::{Error, Result};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Read access shared by signals and computed values.
pub trait Read<T> {
    /// Current value, tracked by the running effect.
    fn get(&self) -> T;

    /// Current value without establishing a dependency.
    fn get_untracked(&self) -> T;
}

/// Optional sanitize/validate/lifecycle configuration for a signal.
pub struct SignalConfig<T> {
    sanitize: Option<Box<dyn Fn(T) -> T>>,
    validate: Option<Box<dyn Fn(&T) -> bool>>,
    on_read: Option<Box<dyn Fn(&T)>>,
    on_write: Option<Box<dyn Fn(&T, &T)>>,
    on_subscribe: Option<Box<dyn Fn(usize)>>,
    on_unsubscribe: Option<Box<dyn Fn(usize)>>,
    on_dispose: Option<Box<dyn Fn()>>,
    max_subscribers: Option<usize>,
}

impl<T> Default for SignalConfig<T> {
    fn default() -> Self {
        Self {
            sanitize: None,
            validate: None,
            on_read: None,
            on_write: None,
            on_subscribe: None,
            on_unsubscribe: None,
            on_dispose: None,
            max_subscribers: None,
        }
    }
}

impl<T> SignalConfig<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform every value (initial and written) before it is stored.
    pub fn sanitize(mut self, f: impl Fn(T) -> T + 'static) -> Self {
        self.sanitize = Some(Box::new(f));
        self
    }

    /// Reject values for which `f` returns false.
    pub fn validate(mut self, f: impl Fn(&T) -> bool + 'static) -> Self {
        self.validate = Some(Box::new(f));
        self
    }

    pub fn on_read(mut self, f: impl Fn(&T) + 'static) -> Self {
        self.on_read = Some(Box::new(f));
        self
    }

    /// Called with `(old, new)` just before a changed value is stored.
    pub fn on_write(mut self, f: impl Fn(&T, &T) + 'static) -> Self {
        self.on_write = Some(Box::new(f));
        self
    }

    /// Called with the subscriber count after each new subscriber.
    pub fn on_subscribe(mut self, f: impl Fn(usize) + 'static) -> Self {
        self.on_subscribe = Some(Box::new(f));
        self
    }

    /// Called with the subscriber count after each removal.
    pub fn on_unsubscribe(mut self, f: impl Fn(usize) + 'static) -> Self {
        self.on_unsubscribe = Some(Box::new(f));
        self
    }

    pub fn on_dispose(mut self, f: impl Fn() + 'static) -> Self {
        self.on_dispose = Some(Box::new(f));
        self
    }

    /// Override the runtime-wide subscriber limit for this signal.
    pub fn max_subscribers(mut self, limit: usize) -> Self {
        self.max_subscribers = Some(limit);
        self
    }

    fn apply_sanitize(&self, value: T) -> T {
        match &self.sanitize {
            Some(sanitize) => sanitize(value),
            None => value,
        }
    }

    fn check(&self, value: &T) -> Result<()> {
        match &self.validate {
            Some(validate) if !validate(value) => Err(Error::validation::<T>()),
            _ => Ok(()),
        }
    }
}

/// Allocated on first meaningful access.
struct Core {
    subscribers: SubscriberSet,
    disposed: bool,
}

struct SignalInner<T> {
    id: u64,
    /// Pending value before materialization, current value after.
    value: RefCell<T>,
    core: RefCell<Option<Core>>,
    config: SignalConfig<T>,
}

impl<T> SignalInner<T> {
    fn materialize(&self) {
        let mut core = self.core.borrow_mut();
        if core.is_none() {
            let limit = self
                .config
                .max_subscribers
                .unwrap_or_else(|| config::current().max_subscribers);
            *core = Some(Core {
                subscribers: SubscriberSet::new(limit),
                disposed: false,
            });
        }
    }

    fn is_materialized(&self) -> bool {
        self.core.borrow().is_some()
    }

    fn is_disposed(&self) -> bool {
        self.core
            .borrow()
            .as_ref()
            .is_some_and(|core| core.disposed)
    }

    /// Add a subscriber; returns the new count if it was not present yet.
    fn add_subscriber(&self, subscriber: Subscriber) -> Result<Option<usize>> {
        let mut core = self.core.borrow_mut();
        match core.as_mut() {
            Some(core) if !core.disposed => Ok(core
                .subscribers
                .insert(subscriber)?
                .then(|| core.subscribers.len())),
            _ => Ok(None),
        }
    }
}

impl<T: 'static> Source for SignalInner<T> {
    fn unsubscribe(&self, subscriber: SubscriberId) {
        let remaining = {
            let mut core = self.core.borrow_mut();
            match core.as_mut() {
                Some(core) if !core.disposed => core
                    .subscribers
                    .remove(subscriber)
                    .then(|| core.subscribers.len()),
                _ => None,
            }
        };
        if let (Some(count), Some(hook)) = (remaining, &self.config.on_unsubscribe) {
            hook(count);
        }
    }
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use filament_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5).unwrap();
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self::build(value, SignalConfig::default())
    }

    /// Create a signal with sanitization, validation or lifecycle hooks.
    ///
    /// The initial value is sanitized, then validated; a rejected initial
    /// value fails construction before anything is stored.
    pub fn with_config(value: T, config: SignalConfig<T>) -> Result<Self> {
        let value = config.apply_sanitize(value);
        config.check(&value)?;
        Ok(Self::build(value, config))
    }

    fn build(value: T, config: SignalConfig<T>) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: next_signal_id(),
                value: RefCell::new(value),
                core: RefCell::new(None),
                config,
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called while an effect runs, this also registers that effect as a
    /// subscriber. A disposed signal returns its last value and tracks
    /// nothing.
    pub fn get(&self) -> T {
        self.inner.materialize();
        let value = self.inner.value.borrow().clone();
        if self.inner.is_disposed() {
            return value;
        }

        if let Some(on_read) = &self.inner.config.on_read {
            on_read(&value);
        }
        self.track();
        value
    }

    fn track(&self) {
        let Some(subscriber) = ReactiveContext::current_subscriber() else {
            return;
        };
        match self.inner.add_subscriber(subscriber) {
            Ok(Some(count)) => {
                if let Some(hook) = &self.inner.config.on_subscribe {
                    hook(count);
                }
                let source: Weak<dyn Source> = Rc::downgrade(&self.inner) as Weak<dyn Source>;
                ReactiveContext::track_dependency(source);
            }
            Ok(None) => {}
            Err(error) => Runtime::report(error),
        }
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.materialize();
        self.inner.value.borrow().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// The value is sanitized first. Before materialization it only
    /// replaces the pending value. Equal values and writes to a disposed
    /// signal are no-ops. Errors from effects re-run by this write are
    /// returned here.
    pub fn set(&self, value: T) -> Result<()> {
        let config = &self.inner.config;
        let value = config.apply_sanitize(value);

        if !self.inner.is_materialized() {
            config.check(&value)?;
            *self.inner.value.borrow_mut() = value;
            return Ok(());
        }

        if self.inner.is_disposed() || *self.inner.value.borrow() == value {
            return Ok(());
        }

        config.check(&value)?;

        if let Some(on_write) = &config.on_write {
            let old = self.inner.value.borrow().clone();
            on_write(&old, &value);
        }
        *self.inner.value.borrow_mut() = value;

        let subscribers = match self.inner.core.borrow().as_ref() {
            Some(core) => core.subscribers.snapshot(),
            None => return Ok(()),
        };
        tracing::trace!(signal = self.inner.id, "signal changed");
        Runtime::notify(subscribers)
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.get_untracked());
        self.set(next)
    }

    /// Register a callback invoked on every change.
    ///
    /// A disposed signal accepts the call and never invokes the callback.
    pub fn subscribe<F>(&self, f: F) -> Result<Subscription>
    where
        F: Fn() + 'static,
    {
        self.inner.materialize();
        let subscriber = Subscriber::new(move || {
            f();
            Ok(())
        });
        let id = subscriber.id();

        if let Some(count) = self.inner.add_subscriber(subscriber)? {
            if let Some(hook) = &self.inner.config.on_subscribe {
                hook(count);
            }
        }

        let source: Weak<dyn Source> = Rc::downgrade(&self.inner) as Weak<dyn Source>;
        Ok(Subscription { id, source })
    }

    /// Dispose the signal: drop every subscriber and stop notifying.
    ///
    /// Later reads return the last value, later writes do nothing.
    /// Calling this more than once has no further effect.
    pub fn dispose(&self) {
        self.inner.materialize();
        {
            let mut core = self.inner.core.borrow_mut();
            match core.as_mut() {
                Some(core) if !core.disposed => {
                    core.disposed = true;
                    core.subscribers.clear();
                }
                _ => return,
            }
        }
        if let Some(on_dispose) = &self.inner.config.on_dispose {
            on_dispose();
        }
        tracing::trace!(signal = self.inner.id, "signal disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Whether the subscriber set has been allocated yet.
    pub fn is_materialized(&self) -> bool {
        self.inner.is_materialized()
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.materialize();
        self.inner
            .core
            .borrow()
            .as_ref()
            .map_or(0, |core| core.subscribers.len())
    }
}

impl<T> Read<T> for Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn get(&self) -> T {
        Signal::get(self)
    }

    fn get_untracked(&self) -> T {
        Signal::get_untracked(self)
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("materialized", &self.inner.is_materialized())
            .field("disposed", &self.inner.is_disposed())
            .finish()
    }
}

/// Handle returned by [`Signal::subscribe`].
#[must_use = "dropping a Subscription keeps the callback registered; call unsubscribe to remove it"]
pub struct Subscription {
    id: SubscriberId,
    source: Weak<dyn Source>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the callback from its signal.
    pub fn unsubscribe(self) {
        if let Some(source) = self.source.upgrade() {
            source.unsubscribe(self.id);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
