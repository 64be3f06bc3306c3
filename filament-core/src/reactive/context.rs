//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This is
//! the "active-effect stack" of the registry: when a signal is read, the
//! top frame's subscriber becomes a subscriber of that signal and the
//! signal is recorded in the frame's dependency list.
//!
//! # Implementation
//!
//! We use a thread-local stack. Running an effect pushes a frame, and the
//! frame is popped when the guard finishes or is dropped. Nested frames
//! support an effect that creates or materializes another one (a computed
//! read for the first time inside a render, for instance).

use std::cell::RefCell;
use std::rc::Weak;

use smallvec::SmallVec;

use super::runtime::Source;
use super::subscriber::{Subscriber, SubscriberId};
use crate::error::Error;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = RefCell::new(Vec::new());
}

pub(crate) type Dependencies = SmallVec<[Weak<dyn Source>; 4]>;

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The subscriber registered on every signal read in this frame.
    subscriber: Subscriber,
    /// Sources read during this run.
    dependencies: Dependencies,
    /// First tracking failure seen in this frame.
    error: Option<Error>,
}

/// What a finished frame collected.
pub(crate) struct Frame {
    pub(crate) dependencies: Dependencies,
    pub(crate) error: Option<Error>,
}

/// Guard that pops the context when finished or dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
    finished: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    pub fn enter(subscriber: Subscriber) -> Self {
        let subscriber_id = subscriber.id();
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber,
                dependencies: SmallVec::new(),
                error: None,
            });
        });

        Self {
            subscriber_id,
            finished: false,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber, if any.
    pub fn current_subscriber() -> Option<Subscriber> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.subscriber.clone()))
    }

    /// Number of sources recorded in the current frame.
    pub fn dependency_count() -> usize {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.len())
                .unwrap_or_default()
        })
    }

    pub(crate) fn track_dependency(source: Weak<dyn Source>) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                entry.dependencies.push(source);
            }
        });
    }

    /// Attach an error to the running frame. Returns it back if no frame
    /// is running.
    pub(crate) fn record_error(error: Error) -> Option<Error> {
        CONTEXT_STACK.with(|stack| match stack.borrow_mut().last_mut() {
            Some(entry) => {
                entry.error.get_or_insert(error);
                None
            }
            None => Some(error),
        })
    }

    /// Pop this context and hand back what it collected.
    pub(crate) fn finish(mut self) -> Frame {
        self.finished = true;
        match self.pop() {
            Some(entry) => Frame {
                dependencies: entry.dependencies,
                error: entry.error,
            },
            None => Frame {
                dependencies: SmallVec::new(),
                error: None,
            },
        }
    }

    fn pop(&self) -> Option<ContextEntry> {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());
        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.subscriber.id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                entry.subscriber.id()
            );
        }
        popped
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            self.pop();
        }
    }
}

/// Run `f` without recording dependencies on any running effect.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    struct Restore(Vec<ContextEntry>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let saved = std::mem::take(&mut self.0);
            CONTEXT_STACK.with(|stack| {
                let mut stack = stack.borrow_mut();
                let inner = std::mem::replace(&mut *stack, saved);
                stack.extend(inner);
            });
        }
    }

    let _restore = Restore(CONTEXT_STACK.with(|stack| std::mem::take(&mut *stack.borrow_mut())));
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber() -> Subscriber {
        Subscriber::new(|| Ok(()))
    }

    #[test]
    fn context_tracks_subscriber() {
        let sub = subscriber();
        let id = sub.id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(sub);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber().map(|s| s.id()), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn nested_contexts() {
        let outer = subscriber();
        let inner = subscriber();
        let (outer_id, inner_id) = (outer.id(), inner.id());

        {
            let _ctx1 = ReactiveContext::enter(outer);
            assert_eq!(ReactiveContext::current_subscriber().map(|s| s.id()), Some(outer_id));

            {
                let _ctx2 = ReactiveContext::enter(inner);
                assert_eq!(ReactiveContext::current_subscriber().map(|s| s.id()), Some(inner_id));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber().map(|s| s.id()), Some(outer_id));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn errors_attach_to_the_running_frame() {
        let limit = Error::SubscriberLimit { limit: 1 };
        assert_eq!(ReactiveContext::record_error(limit.clone()), Some(limit.clone()));

        let ctx = ReactiveContext::enter(subscriber());
        assert_eq!(ReactiveContext::record_error(limit.clone()), None);
        let frame = ctx.finish();
        assert_eq!(frame.error, Some(limit));
        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn untrack_hides_and_restores_the_stack() {
        let _ctx = ReactiveContext::enter(subscriber());
        untrack(|| assert!(!ReactiveContext::is_active()));
        assert!(ReactiveContext::is_active());
    }
}
