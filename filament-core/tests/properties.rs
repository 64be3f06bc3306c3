//! Property Tests for Signal and Batch Laws

use std::cell::RefCell;
use std::rc::Rc;

use filament_core::reactive::{batch_signals, Effect, Signal, SignalConfig};
use proptest::prelude::*;

proptest! {
    /// `set(v)` then `get()` yields `v`, and a repeated write of the stored
    /// value notifies nobody.
    #[test]
    fn set_then_get_returns_value(initial in any::<i64>(), writes in proptest::collection::vec(any::<i64>(), 1..20)) {
        let signal = Signal::new(initial);
        let s = signal.clone();
        let effect = Effect::new(move || { s.get(); }).unwrap();

        let mut expected_runs = 1;
        let mut current = initial;
        for value in writes {
            signal.set(value).unwrap();
            if value != current {
                expected_runs += 1;
                current = value;
            }
            prop_assert_eq!(signal.get(), value);
            prop_assert_eq!(effect.run_count(), expected_runs);

            signal.set(value).unwrap();
            prop_assert_eq!(effect.run_count(), expected_runs);
        }
    }

    /// Any number of writes inside one batch runs a dependent at most once,
    /// and it observes only the final value.
    #[test]
    fn batch_runs_dependents_once(writes in proptest::collection::vec(any::<i32>(), 1..50)) {
        let signal = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (s, log) = (signal.clone(), seen.clone());
        let effect = Effect::new(move || log.borrow_mut().push(s.get())).unwrap();

        let last = *writes.last().unwrap();
        batch_signals(|| {
            for value in &writes {
                signal.set(*value).unwrap();
            }
        })
        .unwrap();

        let expected_runs = if writes.iter().all(|value| *value == 0) { 1 } else { 2 };
        prop_assert_eq!(effect.run_count(), expected_runs);
        prop_assert_eq!(*seen.borrow().last().unwrap(), last);
    }

    /// The stored value is always the sanitized one.
    #[test]
    fn sanitize_applies_to_every_write(values in proptest::collection::vec(-1000i32..1000, 1..20)) {
        let signal = Signal::with_config(0, SignalConfig::new().sanitize(|n: i32| n.clamp(0, 100))).unwrap();
        for value in values {
            signal.set(value).unwrap();
            prop_assert_eq!(signal.get(), value.clamp(0, 100));
        }
    }
}
