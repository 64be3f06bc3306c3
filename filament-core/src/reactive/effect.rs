//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. An immediate effect runs on creation; a deferred one runs at the next
//!    [`tick`](super::tick).
//!
//! 2. Each run first unsubscribes from every signal read on the previous
//!    run, then records whatever it reads this time. The dependency set is
//!    rebuilt, never patched, so signals that stop being read stop
//!    triggering the effect.
//!
//! 3. When any dependency changes, the effect re-runs synchronously (or at
//!    the end of the open batch).
//!
//! 4. A change that lands while the body is still running marks the effect
//!    dirty, and the body runs again as soon as it returns. This repeats
//!    until a run ends clean, up to [`MAX_RERUNS`] times.
//!
//! # Cleanup
//!
//! The body may return a [`Cleanup`]. It runs right before the next run and
//! when the effect is disposed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::context::{Dependencies, ReactiveContext};
use super::runtime::Runtime;
use super::subscriber::{Subscriber, SubscriberId};
use crate::error::{Error, Result};

/// How many times a dirty effect re-runs back to back before giving up.
pub const MAX_RERUNS: usize = 100;

/// Options accepted by [`effect`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectOptions {
    /// Run now instead of at the next tick.
    pub immediate: bool,
}

impl EffectOptions {
    pub fn immediate() -> Self {
        Self { immediate: true }
    }
}

/// A teardown callback returned from an effect body.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(f))
    }

    pub(crate) fn run(self) {
        (self.0)()
    }
}

impl std::fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cleanup")
    }
}

/// Values an effect body may return.
pub trait EffectOutput {
    fn into_cleanup(self) -> Result<Option<Cleanup>>;
}

impl EffectOutput for () {
    fn into_cleanup(self) -> Result<Option<Cleanup>> {
        Ok(None)
    }
}

impl EffectOutput for Cleanup {
    fn into_cleanup(self) -> Result<Option<Cleanup>> {
        Ok(Some(self))
    }
}

impl EffectOutput for Option<Cleanup> {
    fn into_cleanup(self) -> Result<Option<Cleanup>> {
        Ok(self)
    }
}

impl<O: EffectOutput> EffectOutput for Result<O> {
    fn into_cleanup(self) -> Result<Option<Cleanup>> {
        self?.into_cleanup()
    }
}

type Body = Box<dyn FnMut() -> Result<Option<Cleanup>>>;

struct EffectInner {
    id: SubscriberId,
    /// Shared with every subscriber handed out for this effect.
    active: Rc<Cell<bool>>,
    running: Cell<bool>,
    /// Set when a dependency changed during the current run.
    dirty: Cell<bool>,
    /// Internal effect of a computed value.
    derived: bool,
    body: RefCell<Option<Body>>,
    dependencies: RefCell<Dependencies>,
    cleanup: RefCell<Option<Cleanup>>,
    run_count: Cell<usize>,
}

impl EffectInner {
    fn subscriber(self: &Rc<Self>) -> Subscriber {
        let this = Rc::clone(self);
        Subscriber::with_flag(self.id, Rc::new(move || this.run()), Rc::clone(&self.active))
            .derived(self.derived)
    }

    fn drop_dependencies(&self) {
        let dependencies = std::mem::take(&mut *self.dependencies.borrow_mut());
        for source in dependencies.iter().filter_map(|weak| weak.upgrade()) {
            source.unsubscribe(self.id);
        }
    }

    fn run(self: &Rc<Self>) -> Result<()> {
        if !self.active.get() {
            return Ok(());
        }
        if self.running.get() {
            self.dirty.set(true);
            return Ok(());
        }
        for _ in 0..MAX_RERUNS {
            self.dirty.set(false);
            self.run_once()?;
            if !self.dirty.get() || !self.active.get() {
                return Ok(());
            }
            tracing::trace!(effect = self.id.raw(), "dependency changed during run; running again");
        }
        self.dirty.set(false);
        tracing::warn!(effect = self.id.raw(), limit = MAX_RERUNS, "effect kept re-triggering itself");
        Err(Error::Unsettled { limit: MAX_RERUNS })
    }

    fn run_once(self: &Rc<Self>) -> Result<()> {
        let Some(mut body) = self.body.borrow_mut().take() else {
            return Ok(());
        };

        self.running.set(true);
        let previous_cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = previous_cleanup {
            cleanup.run();
        }
        self.drop_dependencies();

        tracing::trace!(effect = self.id.raw(), "running effect");
        let ctx = ReactiveContext::enter(self.subscriber());
        let outcome = body();
        let frame = ctx.finish();

        self.running.set(false);
        self.run_count.set(self.run_count.get() + 1);

        if !self.active.get() {
            // Disposed from inside its own body.
            for source in frame.dependencies.iter().filter_map(|weak| weak.upgrade()) {
                source.unsubscribe(self.id);
            }
            if let Ok(Some(cleanup)) = outcome {
                cleanup.run();
            }
            return Ok(());
        }

        *self.dependencies.borrow_mut() = frame.dependencies;
        *self.body.borrow_mut() = Some(body);

        let cleanup = outcome?;
        *self.cleanup.borrow_mut() = cleanup;
        frame.error.map_or(Ok(()), Err)
    }

    fn dispose(&self) {
        if !self.active.replace(false) {
            return;
        }
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }
        self.drop_dependencies();
        // The body is out of its cell while running; `run` drops it then.
        if let Ok(mut body) = self.body.try_borrow_mut() {
            body.take();
        }
        tracing::trace!(effect = self.id.raw(), "effect disposed");
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// The handle doubles as the effect's disposer. Dropping it does not stop
/// the effect: signals it depends on keep it alive until [`dispose`] is
/// called.
///
/// [`dispose`]: Effect::dispose
///
/// # Example
///
/// ```rust
/// use filament_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let reader = count.clone();
/// let effect = Effect::new(move || {
///     println!("Count is: {}", reader.get());
/// })
/// .unwrap();
///
/// count.set(5).unwrap(); // Prints: "Count is: 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create an effect and run it immediately.
    ///
    /// If the first run fails, the effect is disposed and the error
    /// returned.
    pub fn new<F, O>(f: F) -> Result<Self>
    where
        F: FnMut() -> O + 'static,
        O: EffectOutput,
    {
        let (effect, first_run) = Self::create(f, true);
        match first_run {
            Ok(()) => Ok(effect),
            Err(error) => {
                effect.dispose();
                Err(error)
            }
        }
    }

    /// Create an effect whose first run happens at the next tick.
    pub fn new_deferred<F, O>(f: F) -> Self
    where
        F: FnMut() -> O + 'static,
        O: EffectOutput,
    {
        Self::create(f, false).0
    }

    /// Build the effect and, if `immediate`, run it once, handing back the
    /// outcome of that run without disposing on failure.
    pub(crate) fn create<F, O>(f: F, immediate: bool) -> (Self, Result<()>)
    where
        F: FnMut() -> O + 'static,
        O: EffectOutput,
    {
        let effect = Self::build(f, false);
        if immediate {
            let outcome = effect.run();
            (effect, outcome)
        } else {
            Runtime::defer(effect.inner.subscriber());
            (effect, Ok(()))
        }
    }

    /// Build and run the internal effect of a computed value. Its
    /// notifications are flushed before those of plain effects.
    pub(crate) fn create_derived<F, O>(f: F) -> (Self, Result<()>)
    where
        F: FnMut() -> O + 'static,
        O: EffectOutput,
    {
        let effect = Self::build(f, true);
        let outcome = effect.run();
        (effect, outcome)
    }

    fn build<F, O>(mut f: F, derived: bool) -> Self
    where
        F: FnMut() -> O + 'static,
        O: EffectOutput,
    {
        let inner = Rc::new(EffectInner {
            id: SubscriberId::new(),
            active: Rc::new(Cell::new(true)),
            running: Cell::new(false),
            dirty: Cell::new(false),
            derived,
            body: RefCell::new(Some(Box::new(move || f().into_cleanup()))),
            dependencies: RefCell::new(Dependencies::new()),
            cleanup: RefCell::new(None),
            run_count: Cell::new(0),
        });
        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Execute the effect body now, tracking dependencies.
    pub fn run(&self) -> Result<()> {
        self.inner.run()
    }

    /// Stop the effect: run its cleanup and drop its dependencies.
    ///
    /// Repeated calls are no-ops.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        !self.inner.active.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of sources read on the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Register `f` as an effect.
///
/// Without `immediate` the first run happens at the next
/// [`tick`](super::tick); with it, the first run happens now and its error,
/// if any, is returned.
pub fn effect<F, O>(f: F, options: EffectOptions) -> Result<Effect>
where
    F: FnMut() -> O + 'static,
    O: EffectOutput,
{
    if options.immediate {
        Effect::new(f)
    } else {
        Ok(Effect::new_deferred(f))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reactive::{batch_signals, tick, Signal};

    fn counter() -> (Rc<Cell<i32>>, Rc<Cell<i32>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn effect_runs_on_creation() {
        let (run_count, run_count_clone) = counter();

        let _effect = Effect::new(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        })
        .unwrap();

        // Effect should have run once on creation
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn deferred_effect_waits_for_tick() {
        let (run_count, run_count_clone) = counter();

        let effect = effect(
            move || run_count_clone.set(run_count_clone.get() + 1),
            EffectOptions::default(),
        )
        .unwrap();

        assert_eq!(run_count.get(), 0);
        assert_eq!(effect.run_count(), 0);

        tick().unwrap();
        assert_eq!(run_count.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let signal = Signal::new(0);
        let seen = Rc::new(Cell::new(-1));
        let (reader, seen_clone) = (signal.clone(), seen.clone());

        let effect = Effect::new(move || seen_clone.set(reader.get())).unwrap();
        assert_eq!(seen.get(), 0);
        assert_eq!(effect.dependency_count(), 1);

        signal.set(42).unwrap();
        assert_eq!(seen.get(), 42);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn stale_dependencies_are_dropped() {
        let flag = Signal::new(true);
        let other = Signal::new(0);
        let (f, o) = (flag.clone(), other.clone());

        let effect = Effect::new(move || {
            if f.get() {
                o.get();
            }
        })
        .unwrap();
        assert_eq!(other.subscriber_count(), 1);

        flag.set(false).unwrap();
        assert_eq!(effect.run_count(), 2);
        assert_eq!(other.subscriber_count(), 0);

        other.set(5).unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn batch_runs_effect_once_with_final_value() {
        let signal = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (reader, seen_clone) = (signal.clone(), seen.clone());

        let effect = Effect::new(move || seen_clone.borrow_mut().push(reader.get())).unwrap();

        batch_signals(|| {
            for n in 1..=5 {
                signal.set(n).unwrap();
            }
        })
        .unwrap();

        assert_eq!(effect.run_count(), 2);
        assert_eq!(*seen.borrow(), vec![0, 5]);
    }

    #[test]
    fn cleanup_runs_before_next_run_and_on_dispose() {
        let signal = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let (reader, log_clone) = (signal.clone(), log.clone());

        let effect = Effect::new(move || {
            let value = reader.get();
            log_clone.borrow_mut().push(format!("run {value}"));
            let log_inner = log_clone.clone();
            Cleanup::new(move || log_inner.borrow_mut().push(format!("cleanup {value}")))
        })
        .unwrap();

        assert_eq!(*log.borrow(), vec!["run 0"]);

        signal.set(1).unwrap();
        assert_eq!(*log.borrow(), vec!["run 0", "cleanup 0", "run 1"]);

        effect.dispose();
        assert_eq!(*log.borrow(), vec!["run 0", "cleanup 0", "run 1", "cleanup 1"]);
    }

    #[test]
    fn dispose_is_idempotent_and_stops_reruns() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let effect = Effect::new(move || {
            reader.get();
        })
        .unwrap();

        effect.dispose();
        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(1).unwrap();
        effect.run().unwrap();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn disposed_before_tick_never_runs() {
        let (run_count, run_count_clone) = counter();
        let effect = Effect::new_deferred(move || run_count_clone.set(run_count_clone.get() + 1));
        effect.dispose();
        tick().unwrap();
        assert_eq!(run_count.get(), 0);
    }

    #[test]
    fn body_errors_reach_the_writer() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let _effect = Effect::new(move || -> Result<()> {
            if reader.get() > 1 {
                return Err(Error::DisposedStore);
            }
            Ok(())
        })
        .unwrap();

        assert!(signal.set(1).is_ok());
        assert_eq!(signal.set(2), Err(Error::DisposedStore));
    }

    #[test]
    fn failing_first_run_disposes_the_effect() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let result = Effect::new(move || -> Result<()> {
            reader.get();
            Err(Error::DisposedStore)
        });
        assert_eq!(result.unwrap_err(), Error::DisposedStore);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn self_triggering_write_converges() {
        let signal = Signal::new(0);
        let inner = signal.clone();
        let last_seen = Rc::new(Cell::new(-1));
        let seen = last_seen.clone();
        let effect = Effect::new(move || -> Result<()> {
            let value = inner.get();
            seen.set(value);
            if value < 3 {
                inner.set(value + 1)?;
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(signal.get(), 3);
        assert_eq!(last_seen.get(), 3);
        assert_eq!(effect.run_count(), 4);

        // A later write re-enters the same loop
        signal.set(0).unwrap();
        assert_eq!(signal.get(), 3);
        assert_eq!(last_seen.get(), 3);
    }

    #[test]
    fn endless_self_trigger_stops_at_the_limit() {
        let signal = Signal::new(0);
        let inner = signal.clone();
        let result = Effect::new(move || -> Result<()> {
            let value = inner.get();
            inner.set(value + 1)
        });

        assert_eq!(result.unwrap_err(), Error::Unsettled { limit: MAX_RERUNS });
        assert_eq!(signal.get_untracked(), MAX_RERUNS as i32);
    }

    #[test]
    fn subscriber_limit_surfaces_from_the_run() {
        use crate::reactive::SignalConfig;

        let signal = Signal::with_config(0, SignalConfig::new().max_subscribers(1)).unwrap();
        let _held = signal.subscribe(|| {}).unwrap();
        let reader = signal.clone();

        let result = Effect::new(move || {
            reader.get();
        });
        assert_eq!(result.unwrap_err(), Error::SubscriberLimit { limit: 1 });
    }
}
