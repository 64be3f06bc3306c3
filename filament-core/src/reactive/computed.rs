//! Computed Implementation
//!
//! A Computed is a read-only signal whose value is derived from other
//! signals.
//!
//! # How Computed Values Work
//!
//! 1. Construction is cheap: nothing runs until the first access.
//!
//! 2. On first access an immediate internal effect evaluates the derivation
//!    and creates the cache signal that consumers read.
//!
//! 3. When a dependency changes, the internal effect re-evaluates and writes
//!    the cache only if the new value differs from the previous one, so
//!    downstream effects are not notified about unchanged results.
//!
//! Because consumers read the cache signal, a computed built from another
//! computed subscribes through exactly the same mechanism as one built from
//! plain signals.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::effect::Effect;
use super::runtime::Runtime;
use super::signal::{Read, Signal, Subscription};
use crate::error::Result;

/// Optional naming and lifecycle hooks for a computed value.
pub struct ComputedConfig<T> {
    name: Option<String>,
    on_create: Option<Box<dyn Fn()>>,
    on_compute: Option<Box<dyn Fn(&T)>>,
}

impl<T> Default for ComputedConfig<T> {
    fn default() -> Self {
        Self {
            name: None,
            on_create: None,
            on_compute: None,
        }
    }
}

impl<T> ComputedConfig<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Called once, when the computed materializes.
    pub fn on_create(mut self, f: impl Fn() + 'static) -> Self {
        self.on_create = Some(Box::new(f));
        self
    }

    /// Called with every recomputed value that differs from the previous one.
    pub fn on_compute(mut self, f: impl Fn(&T) + 'static) -> Self {
        self.on_compute = Some(Box::new(f));
        self
    }
}

type Compute<T> = Box<dyn Fn() -> T>;

struct Ready<T: 'static> {
    cache: Signal<T>,
    effect: Effect,
}

struct ComputedInner<T: 'static> {
    /// Taken when the computed materializes.
    compute: RefCell<Option<Compute<T>>>,
    config: Rc<ComputedConfig<T>>,
    ready: RefCell<Option<Ready<T>>>,
}

/// A cached derived value.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. The `PartialEq` bound is what lets
///   an unchanged result skip notifying dependents.
///
/// # Example
///
/// ```rust
/// use filament_core::reactive::{Computed, Signal};
///
/// let c = Signal::new(0);
/// let source = c.clone();
/// let d = Computed::new(move || source.get() * 2);
///
/// c.set(3).unwrap();
/// assert_eq!(d.get(), 6);
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new computed value. The derivation runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::with_config(compute, ComputedConfig::default())
    }

    pub fn with_config<F>(compute: F, config: ComputedConfig<T>) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self {
            inner: Rc::new(ComputedInner {
                compute: RefCell::new(Some(Box::new(compute))),
                config: Rc::new(config),
                ready: RefCell::new(None),
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.config.name.as_deref()
    }

    /// Whether the internal effect and cache exist yet.
    pub fn is_materialized(&self) -> bool {
        self.inner.ready.borrow().is_some()
    }

    /// The cache signal consumers read, creating it on first access.
    ///
    /// # Panics
    ///
    /// Panics if the derivation reads this same computed during its first
    /// evaluation, which is a dependency cycle.
    pub fn signal(&self) -> Signal<T> {
        if let Some(ready) = self.inner.ready.borrow().as_ref() {
            return ready.cache.clone();
        }
        match self.materialize() {
            Some(cache) => cache,
            None => panic!("computed value read itself during its first evaluation"),
        }
    }

    fn materialize(&self) -> Option<Signal<T>> {
        let compute = self.inner.compute.borrow_mut().take()?;
        let config = Rc::clone(&self.inner.config);
        if let Some(on_create) = &config.on_create {
            on_create();
        }

        let slot: Rc<RefCell<Option<Signal<T>>>> = Rc::new(RefCell::new(None));
        let effect_slot = Rc::clone(&slot);
        let (effect, first_run) = Effect::create_derived(move || -> Result<()> {
            let value = compute();
            let cache = effect_slot.borrow().clone();
            match cache {
                None => *effect_slot.borrow_mut() = Some(Signal::new(value)),
                Some(cache) => {
                    if cache.get_untracked() != value {
                        if let Some(on_compute) = &config.on_compute {
                            on_compute(&value);
                        }
                        cache.set(value)?;
                    }
                }
            }
            Ok(())
        });
        if let Err(error) = first_run {
            Runtime::report(error);
        }

        let cache = slot.borrow().clone()?;
        tracing::trace!(name = ?self.inner.config.name, "computed materialized");
        *self.inner.ready.borrow_mut() = Some(Ready {
            cache: cache.clone(),
            effect,
        });
        Some(cache)
    }

    /// Current value, tracked by the running effect.
    pub fn get(&self) -> T {
        self.signal().get()
    }

    pub fn get_untracked(&self) -> T {
        self.signal().get_untracked()
    }

    /// Register a callback invoked whenever the derived value changes.
    pub fn subscribe<F>(&self, f: F) -> Result<Subscription>
    where
        F: Fn() + 'static,
    {
        self.signal().subscribe(f)
    }

    /// Stop recomputing and dispose the cache signal.
    pub fn dispose(&self) {
        let cache = self.signal();
        if let Some(ready) = self.inner.ready.borrow().as_ref() {
            ready.effect.dispose();
        }
        cache.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner
            .ready
            .borrow()
            .as_ref()
            .is_some_and(|ready| ready.cache.is_disposed())
    }
}

impl<T> Read<T> for Computed<T>
where
    T: Clone + PartialEq + 'static,
{
    fn get(&self) -> T {
        Computed::get(self)
    }

    fn get_untracked(&self) -> T {
        Computed::get_untracked(self)
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ready = self.inner.ready.borrow();
        f.debug_struct("Computed")
            .field("name", &self.inner.config.name)
            .field("cache", &ready.as_ref().map(|ready| &ready.cache))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
