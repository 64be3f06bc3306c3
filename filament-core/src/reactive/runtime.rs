//! Reactive Runtime
//!
//! The runtime is the process-wide registry that connects signals and
//! effects. Together with the context stack in `context.rs` it holds all
//! shared reactive state:
//!
//! - the active-effect stack (see `ReactiveContext`)
//! - the batch depth and the set of subscribers deferred during a batch
//! - the deferred-effect queue drained by [`tick`]
//!
//! # How It Works
//!
//! 1. A signal write hands a snapshot of its subscribers to
//!    [`Runtime::notify`].
//!
//! 2. Every active subscriber is queued once. Outside a batch the queue is
//!    flushed right away, so all of them have run before the write returns.
//!
//! 3. Inside a batch the queue is flushed when the outermost batch ends.
//!
//! 4. The flush keeps the queue open while it drains. Writes made by the
//!    subscribers it runs join the same queue, and a subscriber that is
//!    still waiting is not queued twice. Derived subscribers (the internal
//!    effects of computed values) are taken first, so effects reading both
//!    a signal and a value derived from it run once and see both updated.
//!
//! # Threading
//!
//! Execution is single-threaded and cooperative. All state lives in
//! thread-locals, so each thread is its own execution context.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId, SubscriberList};
use crate::error::{Error, Result};

/// Upper bound on subscriber runs in one flush. Effects that keep writing
/// each other's dependencies stop here instead of looping forever.
pub(crate) const MAX_FLUSH_RUNS: usize = 100_000;

/// Something a running effect can depend on.
pub trait Source {
    /// Drop `subscriber` from this source's subscriber set.
    fn unsubscribe(&self, subscriber: SubscriberId);
}

struct RuntimeState {
    batch_depth: Cell<usize>,
    pending: RefCell<IndexMap<SubscriberId, Subscriber>>,
    deferred: RefCell<VecDeque<Subscriber>>,
}

thread_local! {
    static STATE: RuntimeState = RuntimeState {
        batch_depth: Cell::new(0),
        pending: RefCell::new(IndexMap::new()),
        deferred: RefCell::new(VecDeque::new()),
    };
}

/// The reactive runtime.
///
/// A zero-sized accessor over the thread-local registry.
pub struct Runtime;

impl Runtime {
    /// Whether a batch is currently open.
    pub fn is_batching() -> bool {
        STATE.with(|state| state.batch_depth.get() > 0)
    }

    /// Number of subscribers queued by the open batch.
    pub fn pending_count() -> usize {
        STATE.with(|state| state.pending.borrow().len())
    }

    /// Number of effects waiting for the next [`tick`].
    pub fn deferred_count() -> usize {
        STATE.with(|state| state.deferred.borrow().len())
    }

    /// Notify a snapshot of subscribers that a source changed.
    ///
    /// Every subscriber runs even if an earlier one fails; the first error
    /// is returned.
    pub(crate) fn notify(subscribers: SubscriberList) -> Result<()> {
        STATE.with(|state| {
            let mut pending = state.pending.borrow_mut();
            for subscriber in subscribers.into_iter().filter(Subscriber::is_active) {
                pending.entry(subscriber.id()).or_insert(subscriber);
            }
        });
        if Self::is_batching() {
            return Ok(());
        }
        Self::flush_pending()
    }

    /// Queue a subscriber for the next deferred-execution tick.
    pub(crate) fn defer(subscriber: Subscriber) {
        STATE.with(|state| state.deferred.borrow_mut().push_back(subscriber));
    }

    /// Hand an error to the running effect, or log it if nothing is running.
    pub(crate) fn report(error: Error) {
        if let Some(error) = ReactiveContext::record_error(error) {
            tracing::error!(%error, "reactive error outside of any running effect");
        }
    }

    fn flush_pending() -> Result<()> {
        let _open = BatchGuard::enter();
        let mut first_error = None;
        let mut runs = 0;
        while let Some(subscriber) = next_pending() {
            runs += 1;
            if runs > MAX_FLUSH_RUNS {
                STATE.with(|state| state.pending.borrow_mut().clear());
                tracing::error!(limit = MAX_FLUSH_RUNS, "reactive updates did not settle; dropping queued subscribers");
                first_error.get_or_insert(Error::Unsettled { limit: MAX_FLUSH_RUNS });
                break;
            }
            if let Err(error) = subscriber.notify() {
                first_error.get_or_insert(error);
            }
        }
        if runs > 0 {
            tracing::trace!(runs, "flushed queued subscribers");
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Pop the next queued subscriber, derived ones first.
fn next_pending() -> Option<Subscriber> {
    STATE.with(|state| {
        let mut pending = state.pending.borrow_mut();
        let index = pending
            .values()
            .position(Subscriber::is_derived)
            .unwrap_or(0);
        pending.shift_remove_index(index).map(|(_, subscriber)| subscriber)
    })
}

/// Increments the batch depth for its lifetime.
struct BatchGuard;

impl BatchGuard {
    fn enter() -> Self {
        STATE.with(|state| state.batch_depth.set(state.batch_depth.get() + 1));
        BatchGuard
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        STATE.with(|state| state.batch_depth.set(state.batch_depth.get().saturating_sub(1)));
    }
}

/// Run `f` with signal notifications deferred and deduplicated.
///
/// Every subscriber queued by writes inside `f` runs exactly once after the
/// outermost batch ends. Nested batches only flush at depth zero.
pub fn batch_signals<R>(f: impl FnOnce() -> R) -> Result<R> {
    let guard = BatchGuard::enter();
    let result = f();
    drop(guard);

    if !Runtime::is_batching() {
        Runtime::flush_pending()?;
    }
    Ok(result)
}

/// Drain the deferred-effect queue.
///
/// This is the microtask-equivalent checkpoint: effects created without
/// `immediate` run here, as do any effects they defer in turn.
pub fn tick() -> Result<()> {
    let mut first_error = None;
    loop {
        let next = STATE.with(|state| state.deferred.borrow_mut().pop_front());
        let Some(subscriber) = next else { break };
        if let Err(error) = subscriber.notify() {
            first_error.get_or_insert(error);
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn counting() -> (Subscriber, Rc<Cell<i32>>) {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        let subscriber = Subscriber::new(move || {
            count_clone.set(count_clone.get() + 1);
            Ok(())
        });
        (subscriber, count)
    }

    #[test]
    fn notify_runs_synchronously_outside_batch() {
        let (sub, count) = counting();
        Runtime::notify(SubscriberList::from_iter([sub])).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn batch_dedupes_and_flushes_once() {
        let (sub, count) = counting();
        batch_signals(|| {
            Runtime::notify(SubscriberList::from_iter([sub.clone()])).unwrap();
            Runtime::notify(SubscriberList::from_iter([sub.clone()])).unwrap();
            assert_eq!(Runtime::pending_count(), 1);
            assert_eq!(count.get(), 0);
        })
        .unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(Runtime::pending_count(), 0);
    }

    #[test]
    fn nested_batches_flush_at_outermost_exit() {
        let (sub, count) = counting();
        batch_signals(|| {
            batch_signals(|| {
                Runtime::notify(SubscriberList::from_iter([sub.clone()])).unwrap();
            })
            .unwrap();
            assert!(Runtime::is_batching());
            assert_eq!(count.get(), 0);
        })
        .unwrap();
        assert!(!Runtime::is_batching());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn all_subscribers_run_and_first_error_wins() {
        let (ok, count) = counting();
        let failing = Subscriber::new(|| Err(Error::DisposedStore));
        let result = Runtime::notify(SubscriberList::from_iter([failing, ok]));
        assert_eq!(result, Err(Error::DisposedStore));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn tick_drains_deferred_queue() {
        let (sub, count) = counting();
        Runtime::defer(sub);
        assert_eq!(Runtime::deferred_count(), 1);
        tick().unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(Runtime::deferred_count(), 0);
    }

    #[test]
    fn derived_subscribers_flush_first() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (order.clone(), order.clone());
        let plain = Subscriber::new(move || {
            a.borrow_mut().push("plain");
            Ok(())
        });
        let derived = Subscriber::new(move || {
            b.borrow_mut().push("derived");
            Ok(())
        })
        .derived(true);

        Runtime::notify(SubscriberList::from_iter([plain, derived])).unwrap();
        assert_eq!(*order.borrow(), vec!["derived", "plain"]);
    }

    #[test]
    fn writes_during_a_flush_join_the_queue() {
        let (late, count) = counting();
        let queued = late.clone();
        let trigger = Subscriber::new(move || {
            // Queued behind the running flush, not run inline
            Runtime::notify(SubscriberList::from_iter([queued.clone()]))?;
            assert!(Runtime::is_batching());
            Ok(())
        });

        Runtime::notify(SubscriberList::from_iter([trigger, late])).unwrap();
        assert_eq!(count.get(), 1);
        assert!(!Runtime::is_batching());
    }
}
