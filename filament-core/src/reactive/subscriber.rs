//! Subscriber types for the reactive system.
//!
//! A Subscriber is any callback a signal invokes when its value changes.
//! Effects subscribe through the same type, keyed by their own id, so a
//! signal never tells an effect twice about one write.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Unique identifier for a subscriber.
///
/// Each subscriber (effect, computed or raw callback) gets a unique ID when
/// created. Subscriber sets are keyed by this ID, which is what gives batch
/// queues and signal subscriber lists their set semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Notify = Rc<dyn Fn() -> Result<()>>;

/// A subscriber to reactive values.
///
/// Cloning is cheap and keeps the same identity.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    notify: Notify,
    /// Shared with the owning effect; cleared when the effect is disposed.
    active: Rc<Cell<bool>>,
    /// Feeds a computed value's cache. Flushed ahead of plain subscribers.
    derived: bool,
}

impl Subscriber {
    /// Create a new subscriber with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() -> Result<()> + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Rc::new(notify),
            active: Rc::new(Cell::new(true)),
            derived: false,
        }
    }

    pub(crate) fn with_flag(id: SubscriberId, notify: Notify, active: Rc<Cell<bool>>) -> Self {
        Self {
            id,
            notify,
            active,
            derived: false,
        }
    }

    pub(crate) fn derived(mut self, derived: bool) -> Self {
        self.derived = derived;
        self
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn is_derived(&self) -> bool {
        self.derived
    }

    /// Whether the owner of this subscriber is still live.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Notify the subscriber that one of its dependencies changed.
    pub fn notify(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        (self.notify)()
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Snapshot of a subscriber set, taken before notifying so callbacks can
/// freely re-subscribe or unsubscribe.
pub(crate) type SubscriberList = SmallVec<[Subscriber; 4]>;

/// Insertion-ordered, bounded set of subscribers.
pub(crate) struct SubscriberSet {
    entries: IndexMap<SubscriberId, Subscriber>,
    limit: usize,
}

impl SubscriberSet {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            limit,
        }
    }

    /// Insert a subscriber. Returns `Ok(false)` if it was already present.
    pub(crate) fn insert(&mut self, subscriber: Subscriber) -> Result<bool> {
        if self.entries.contains_key(&subscriber.id) {
            return Ok(false);
        }
        if self.entries.len() >= self.limit {
            return Err(Error::SubscriberLimit { limit: self.limit });
        }
        self.entries.insert(subscriber.id, subscriber);
        Ok(true)
    }

    pub(crate) fn remove(&mut self, id: SubscriberId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn snapshot(&self) -> SubscriberList {
        self.entries.values().cloned().collect()
    }
}
