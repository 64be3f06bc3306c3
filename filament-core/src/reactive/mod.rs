//! Reactive Primitives
//!
//! This module implements the dependency-tracking engine: signals, computed
//! values and effects. Every renderer update is driven through it.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while an effect runs, the signal registers that effect as a subscriber.
//! When the value changes, all subscribers are notified.
//!
//! ## Computed values
//!
//! A Computed is a read-only signal derived from other signals. It caches
//! its result and only notifies dependents when the result changes.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever a signal
//! it read on its last run changes. The renderer is one big effect per
//! mounted root.
//!
//! ## Batches
//!
//! [`batch_signals`] defers notifications until the outermost batch ends,
//! then runs each queued subscriber once.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: a thread-local stack records which
//! effect is running, and signal reads consult its top frame. Execution is
//! single-threaded, so all shared state is `Rc`/`RefCell` behind
//! thread-locals.

mod computed;
mod context;
mod effect;
mod runtime;
mod signal;
mod subscriber;

pub use computed::{Computed, ComputedConfig};
pub use context::{untrack, ReactiveContext};
pub use effect::{effect, Cleanup, Effect, EffectOptions, EffectOutput, MAX_RERUNS};
pub use runtime::{batch_signals, tick, Runtime, Source};
pub use signal::{Read, Signal, SignalConfig, Subscription};
pub use subscriber::{Subscriber, SubscriberId};
