//! Stores
//!
//! A [`Store`] groups named fields, one [`Signal`] per field, behind a
//! single handle with batched multi-field updates, store-scoped effects and
//! a derived snapshot of every field. Values are `serde_json::Value`, so a
//! store can be seeded straight from JSON.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::reactive::{batch_signals, effect, Computed, Effect, EffectOptions, EffectOutput, Signal};

/// Which fields reject writes through [`Store::set`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Readonly {
    #[default]
    None,
    All,
    Keys(Vec<String>),
}

impl Readonly {
    fn covers(&self, key: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Keys(keys) => keys.iter().any(|k| k == key),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub readonly: Readonly,
}

struct StoreInner {
    signals: IndexMap<String, Signal<Value>>,
    effects: RefCell<Vec<Effect>>,
    options: StoreOptions,
    disposed: Cell<bool>,
}

/// A named group of signals.
///
/// # Example
///
/// ```rust
/// use filament_core::store::{Store, StoreOptions};
/// use serde_json::json;
///
/// let store = Store::new([("count", json!(0)), ("step", json!(2))], StoreOptions::default());
/// store.set([("count", json!(4))]).unwrap();
/// assert_eq!(store.get("count").unwrap(), json!(4));
/// assert_eq!(store.computed().get(), json!({ "count": 4, "step": 2 }));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    pub fn new<I, K>(fields: I, options: StoreOptions) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let signals = fields
            .into_iter()
            .map(|(key, value)| (key.into(), Signal::new(value)))
            .collect();
        Self {
            inner: Rc::new(StoreInner {
                signals,
                effects: RefCell::new(Vec::new()),
                options,
                disposed: Cell::new(false),
            }),
        }
    }

    /// One field per entry of a JSON object.
    pub fn from_object(object: Map<String, Value>, options: StoreOptions) -> Self {
        Self::new(object, options)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.signals.keys().map(String::as_str)
    }

    /// The signal behind `key`.
    pub fn signal(&self, key: &str) -> Result<Signal<Value>> {
        self.inner
            .signals
            .get(key)
            .cloned()
            .ok_or_else(|| Error::UnknownStoreProperty {
                key: key.to_string(),
            })
    }

    /// Current value of `key`, tracked by the running effect.
    pub fn get(&self, key: &str) -> Result<Value> {
        Ok(self.signal(key)?.get())
    }

    /// Write several fields in one batch: dependents run once, after every
    /// write has landed.
    ///
    /// Fails without writing anything if the store is disposed or any key is
    /// readonly. Keys the store does not define are skipped.
    pub fn set<I, K>(&self, updates: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        if self.inner.disposed.get() {
            tracing::warn!("attempting to update a disposed store");
            return Err(Error::DisposedStore);
        }
        let updates: Vec<(String, Value)> = updates
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        if let Some((key, _)) = updates
            .iter()
            .find(|(key, _)| self.inner.options.readonly.covers(key))
        {
            return Err(Error::ReadonlyStoreProperty { key: key.clone() });
        }

        batch_signals(|| -> Result<()> {
            for (key, value) in updates {
                match self.inner.signals.get(&key) {
                    Some(signal) => signal.set(value)?,
                    None => tracing::warn!(key = %key, "ignoring update of undefined store property"),
                }
            }
            Ok(())
        })?
    }

    /// An effect owned by the store and disposed by [`cleanup`](Self::cleanup).
    pub fn effect<F, O>(&self, f: F, options: EffectOptions) -> Result<Effect>
    where
        F: FnMut() -> O + 'static,
        O: EffectOutput,
    {
        let handle = effect(f, options)?;
        self.inner.effects.borrow_mut().push(handle.clone());
        Ok(handle)
    }

    /// A computed JSON object holding every field.
    pub fn computed(&self) -> Computed<Value> {
        let signals = self.inner.signals.clone();
        Computed::new(move || {
            Value::Object(
                signals
                    .iter()
                    .map(|(key, signal)| (key.clone(), signal.get()))
                    .collect(),
            )
        })
    }

    /// Dispose every field signal and scoped effect. Repeated calls are
    /// no-ops.
    pub fn cleanup(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        for effect in self.inner.effects.borrow_mut().drain(..) {
            effect.dispose();
        }
        for signal in self.inner.signals.values() {
            signal.dispose();
        }
        tracing::debug!(fields = self.inner.signals.len(), "store disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.inner.signals.keys().collect::<Vec<_>>())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter(options: StoreOptions) -> Store {
        Store::new([("count", json!(0)), ("label", json!("clicks"))], options)
    }

    #[test]
    fn unknown_keys_fail() {
        let store = counter(StoreOptions::default());
        assert_eq!(
            store.get("missing").err(),
            Some(Error::UnknownStoreProperty { key: "missing".into() })
        );
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["count", "label"]);
    }

    #[test]
    fn set_is_batched() {
        let store = counter(StoreOptions::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (s, log) = (store.clone(), seen.clone());
        let watcher = store
            .effect(
                move || {
                    log.borrow_mut()
                        .push((s.get("count").unwrap(), s.get("label").unwrap()));
                },
                EffectOptions::immediate(),
            )
            .unwrap();

        store
            .set([("count", json!(5)), ("label", json!("taps"))])
            .unwrap();

        assert_eq!(watcher.run_count(), 2);
        assert_eq!(seen.borrow().last(), Some(&(json!(5), json!("taps"))));
    }

    #[test]
    fn readonly_rejects_without_writing() {
        let store = counter(StoreOptions {
            readonly: Readonly::Keys(vec!["label".into()]),
        });
        assert_eq!(
            store.set([("count", json!(1)), ("label", json!("x"))]),
            Err(Error::ReadonlyStoreProperty { key: "label".into() })
        );
        assert_eq!(store.get("count").unwrap(), json!(0));

        let locked = counter(StoreOptions {
            readonly: Readonly::All,
        });
        assert!(locked.set([("count", json!(1))]).is_err());
    }

    #[test]
    fn cleanup_disposes_everything() {
        let store = counter(StoreOptions::default());
        let s = store.clone();
        let watcher = store
            .effect(
                move || {
                    s.get("count").unwrap();
                },
                EffectOptions::immediate(),
            )
            .unwrap();

        store.cleanup();
        store.cleanup();

        assert!(store.is_disposed());
        assert!(watcher.is_disposed());
        assert!(store.signal("count").unwrap().is_disposed());
        assert_eq!(store.set([("count", json!(1))]), Err(Error::DisposedStore));
    }

    #[test]
    fn computed_snapshot_tracks_fields() {
        let store = Store::from_object(
            json!({ "a": 1, "b": [1, 2] }).as_object().cloned().unwrap(),
            StoreOptions::default(),
        );
        let snapshot = store.computed();
        assert_eq!(snapshot.get(), json!({ "a": 1, "b": [1, 2] }));

        store.set([("a", json!(2))]).unwrap();
        assert_eq!(snapshot.get(), json!({ "a": 2, "b": [1, 2] }));
    }
}
