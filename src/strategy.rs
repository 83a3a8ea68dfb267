//! Clock sequence strategy of RFC 4122 time-based UUIDs.

use std::fmt;

use crate::config::Settings;
use crate::controller::ClockSequenceController;
use crate::generator::RandSource;
use crate::sequence::{BoundedSequence, CLOCK_SEQUENCE_MAX};
use crate::state::{FileStateStore, SequenceState, StateStore};

/// Where a [`ClockSequenceStrategy`] restores its state from and stores it to.
pub enum Persistence {
    /// The state is neither restored nor stored; the clock sequence starts at a random value.
    Disabled,

    /// The state is restored from and stored to the given store.
    Store(Box<dyn StateStore + Send>),
}

impl Persistence {
    /// Resolves the persistence mode from the application settings.
    ///
    /// Returns [`Persistence::Disabled`] unless `settings.state_enabled` is set, in which case
    /// `store` is used if given and a [`FileStateStore`] at `settings.state_file` otherwise.
    pub fn from_settings(settings: &Settings, store: Option<Box<dyn StateStore + Send>>) -> Self {
        if !settings.state_enabled {
            return Self::Disabled;
        }
        match store {
            Some(store) => Self::Store(store),
            None => Self::Store(Box::new(FileStateStore::open(&settings.state_file))),
        }
    }
}

impl fmt::Debug for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Store(_) => f.write_str("Store(..)"),
        }
    }
}

/// Produces the 14-bit clock sequence of version 1 UUIDs.
///
/// The clock sequence guards against duplicates when the clock is set backwards or the node
/// identifier changes. This type reconciles three guards:
///
/// 1.  The timestamp history of the instance: the value is kept while timestamps increase and
///     advanced whenever a timestamp is not later than the previous one.
/// 2.  A [`ClockSequenceController`] shared with other instances in the process, which ensures
///     that no two instances hold the same value at once.
/// 3.  A [`StateStore`] that carries the last timestamp, node identifier, and value across
///     restarts. On construction, the stored value is reused, or advanced if the current
///     timestamp is not later than the stored one or the node identifier has changed. Without a
///     usable record, the value is initialized to a random number that is not derived from the
///     node identifier.
///
/// The state is stored when the owner calls [`shutdown()`](Self::shutdown) as part of its own
/// orderly shutdown. Nothing is stored when the process dies abnormally; the next run then
/// restores an older record and the checks above advance the value.
///
/// An instance is not synchronized; share it across threads behind a lock, or give each thread
/// its own instance with a clone of the same controller.
///
/// # Examples
///
/// ```rust
/// use uuid1::generator::with_rand08::Adapter;
/// use uuid1::{ClockSequenceController, ClockSequenceStrategy, Persistence};
///
/// let controller = ClockSequenceController::new();
/// let mut s = ClockSequenceStrategy::new(
///     0x01ee_0000_0000_0000,
///     0x0123_4567_89ab,
///     Adapter(rand::thread_rng()),
///     controller,
///     Persistence::Disabled,
/// );
///
/// let a = s.get_clock_sequence(0x01ee_0000_0000_0001, 0x0123_4567_89ab);
/// let b = s.get_clock_sequence(0x01ee_0000_0000_0002, 0x0123_4567_89ab);
/// assert_eq!(a, b);
///
/// // clock moved backwards
/// let c = s.get_clock_sequence(0x01ee_0000_0000_0001, 0x0123_4567_89ab);
/// assert_ne!(b, c);
/// ```
pub struct ClockSequenceStrategy<R> {
    sequence: BoundedSequence,
    previous_timestamp: u64,
    previous_node_identifier: u64,
    controller: ClockSequenceController,
    store: Option<Box<dyn StateStore + Send>>,
    stored: bool,

    /// The random number generator used to draw initial values.
    rng: R,
}

impl<R: RandSource> ClockSequenceStrategy<R> {
    /// Creates an instance for the current `timestamp` and `node_identifier`, restoring the
    /// previous state according to `persistence`.
    pub fn new(
        timestamp: u64,
        node_identifier: u64,
        rng: R,
        controller: ClockSequenceController,
        persistence: Persistence,
    ) -> Self {
        let mut strategy = Self {
            sequence: BoundedSequence::clock_sequence(),
            previous_timestamp: timestamp,
            previous_node_identifier: node_identifier,
            controller,
            store: None,
            stored: false,
            rng,
        };

        let Persistence::Store(store) = persistence else {
            strategy.reset();
            return strategy;
        };

        let last = store.state();
        strategy.store = Some(store);
        match last {
            Some(last) => strategy.restore(&last),
            None => {
                tracing::debug!("no prior clock sequence state; drawing a random value");
                strategy.reset();
            }
        }
        strategy
    }

    /// Returns the clock sequence for `timestamp`.
    ///
    /// The current value is returned unchanged if `timestamp` is later than the previous one;
    /// otherwise the value is advanced. Either way `timestamp` becomes the previous timestamp, so
    /// repeated calls with a non-increasing timestamp keep advancing the value. The node
    /// identifier is compared only when the state is restored.
    pub fn get_clock_sequence(&mut self, timestamp: u64, _node_identifier: u64) -> u16 {
        let later = timestamp > self.previous_timestamp;
        self.previous_timestamp = timestamp;
        if later {
            self.sequence.current()
        } else {
            self.next()
        }
    }

    /// Advances the value by one, letting the controller settle collisions with other instances,
    /// and returns the value acquired.
    pub fn next(&mut self) -> u16 {
        let give = self.sequence.get();
        let take = self.sequence.next();
        self.commit(give, take)
    }

    /// Replaces the value with a random one.
    pub fn reset(&mut self) {
        let give = self.sequence.get();
        let take = self.rng.next_u32() as u16 & CLOCK_SEQUENCE_MAX;
        self.commit(give, take);
    }

    /// Returns the current value.
    pub fn current(&self) -> u16 {
        self.sequence.current()
    }

    /// Returns the state that [`shutdown()`](Self::shutdown) would store.
    pub fn state(&self) -> SequenceState {
        SequenceState {
            timestamp: self.previous_timestamp,
            node_identifier: self.previous_node_identifier,
            clock_sequence: self.sequence.current(),
        }
    }

    /// Returns the controller this instance reports to.
    pub fn controller(&self) -> &ClockSequenceController {
        &self.controller
    }

    /// Stores the current state if persistence is enabled.
    ///
    /// The state is stored at most once per instance; subsequent calls do nothing. Storage
    /// failures are logged and otherwise ignored, so that shutdown can always proceed.
    pub fn shutdown(&mut self) {
        if self.stored {
            return;
        }
        let state = self.state();
        let Some(store) = self.store.as_mut() else {
            return;
        };
        self.stored = true;

        store.stage(&state);
        match store.store() {
            Ok(()) => tracing::debug!(?state, "stored clock sequence state"),
            Err(err) => tracing::warn!(error = %err, "could not store clock sequence state"),
        }
    }

    fn restore(&mut self, last: &SequenceState) {
        self.commit(None, last.clock_sequence);
        if self.previous_timestamp <= last.timestamp
            || self.previous_node_identifier != last.node_identifier
        {
            // clock set backwards or hardware moved since the record was written
            let value = self.next();
            tracing::debug!(
                last = last.clock_sequence,
                value,
                "advanced restored clock sequence"
            );
        } else {
            tracing::debug!(value = self.current(), "restored clock sequence");
        }
    }

    /// Hands `take` to the controller and adopts whatever value it grants.
    fn commit(&mut self, give: Option<u16>, take: u16) -> u16 {
        let value = self.controller.borrow(give, take);
        self.sequence.set(value.into());
        value
    }
}

impl<R> Drop for ClockSequenceStrategy<R> {
    fn drop(&mut self) {
        if let Some(value) = self.sequence.get() {
            self.controller.release(value);
        }
    }
}

impl<R> fmt::Debug for ClockSequenceStrategy<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockSequenceStrategy")
            .field("sequence", &self.sequence)
            .field("previous_timestamp", &self.previous_timestamp)
            .field("previous_node_identifier", &self.previous_node_identifier)
            .field("persistent", &self.store.is_some())
            .field("stored", &self.stored)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{ClockSequenceStrategy, Persistence};
    use crate::config::Settings;
    use crate::controller::ClockSequenceController;
    use crate::error::StateError;
    use crate::generator::{with_rand08::Adapter, RandSource};
    use crate::sequence::CLOCK_SEQUENCE_MAX;
    use crate::state::{MemoryStateStore, SequenceState, StateStore};

    use rand::rngs::ThreadRng;

    const TS: u64 = 0x01ee_1234_5678_9abc;
    const NODE: u64 = 0x0123_4567_89ab;

    type ThreadStrategy = ClockSequenceStrategy<Adapter<ThreadRng>>;

    fn strategy(controller: &ClockSequenceController, persistence: Persistence) -> ThreadStrategy {
        ClockSequenceStrategy::new(
            TS,
            NODE,
            Adapter(rand::thread_rng()),
            controller.clone(),
            persistence,
        )
    }

    fn restored(state: SequenceState, timestamp: u64, node_identifier: u64) -> ThreadStrategy {
        ClockSequenceStrategy::new(
            timestamp,
            node_identifier,
            Adapter(rand::thread_rng()),
            ClockSequenceController::new(),
            Persistence::Store(Box::new(MemoryStateStore::with_state(state))),
        )
    }

    /// Random source returning a fixed number
    struct FixedRand(u32);

    impl RandSource for FixedRand {
        fn next_u32(&mut self) -> u32 {
            self.0
        }

        fn next_u64(&mut self) -> u64 {
            self.0 as u64
        }
    }

    /// Keeps value constant while timestamp increases
    #[test]
    fn keeps_value_constant_while_timestamp_increases() {
        let c = ClockSequenceController::new();
        let mut s = strategy(&c, Persistence::Disabled);
        let first = s.current();
        for i in 1..10_000 {
            assert_eq!(s.get_clock_sequence(TS + i, NODE), first);
        }
    }

    /// Changes value whenever timestamp does not increase
    #[test]
    fn changes_value_whenever_timestamp_does_not_increase() {
        let c = ClockSequenceController::new();
        let mut s = strategy(&c, Persistence::Disabled);
        let mut prev = s.get_clock_sequence(TS + 100, NODE);
        for i in 0..(2 * CLOCK_SEQUENCE_MAX as u64) {
            let curr = s.get_clock_sequence(TS + 100 - i.min(50), NODE);
            assert_ne!(curr, prev);
            assert_eq!(curr, if prev == CLOCK_SEQUENCE_MAX { 0 } else { prev + 1 });
            prev = curr;
        }
    }

    /// Updates previous timestamp even when it goes backwards
    #[test]
    fn updates_previous_timestamp_even_when_it_goes_backwards() {
        let c = ClockSequenceController::new();
        let mut s = strategy(&c, Persistence::Disabled);
        let a = s.get_clock_sequence(TS - 10, NODE);
        assert_eq!(s.state().timestamp, TS - 10);
        assert_eq!(s.get_clock_sequence(TS - 9, NODE), a);
    }

    /// Draws initial value from the random source
    #[test]
    fn draws_initial_value_from_the_random_source() {
        let s = ClockSequenceStrategy::new(
            TS,
            NODE,
            FixedRand(0xffff_1234),
            ClockSequenceController::new(),
            Persistence::Disabled,
        );
        assert_eq!(s.current(), 0x1234);
    }

    /// Keeps values in range across repeated resets
    #[test]
    fn keeps_values_in_range_across_repeated_resets() {
        let c = ClockSequenceController::new();
        let mut s = strategy(&c, Persistence::Disabled);
        for _ in 0..1_000 {
            s.reset();
            assert!(s.current() <= CLOCK_SEQUENCE_MAX);
            assert_eq!(c.held_count(), 1);
            assert!(c.is_held(s.current()));
        }
    }

    /// Reuses restored value when timestamp increased and node matches
    #[test]
    fn reuses_restored_value_when_timestamp_increased_and_node_matches() {
        let last = SequenceState {
            timestamp: TS,
            node_identifier: NODE,
            clock_sequence: 0x0abc,
        };
        let mut s = restored(last, TS + 1, NODE);
        assert_eq!(s.current(), 0x0abc);
        assert_eq!(s.get_clock_sequence(TS + 2, NODE), 0x0abc);
    }

    /// Advances restored value when node identifier changed
    #[test]
    fn advances_restored_value_when_node_identifier_changed() {
        let last = SequenceState {
            timestamp: TS,
            node_identifier: NODE,
            clock_sequence: 0x0abc,
        };
        let s = restored(last, TS + 1, NODE + 1);
        assert_ne!(s.current(), 0x0abc);
        assert_eq!(s.current(), 0x0abd);
    }

    /// Advances restored value when timestamp did not increase
    #[test]
    fn advances_restored_value_when_timestamp_did_not_increase() {
        let last = SequenceState {
            timestamp: TS,
            node_identifier: NODE,
            clock_sequence: CLOCK_SEQUENCE_MAX,
        };
        assert_eq!(restored(last, TS, NODE).current(), 0);
        assert_eq!(restored(last, TS - 1, NODE).current(), 0);
    }

    /// Draws random value when no record is stored
    #[test]
    fn draws_random_value_when_no_record_is_stored() {
        let store = MemoryStateStore::new();
        let s = ClockSequenceStrategy::new(
            TS,
            NODE,
            FixedRand(0x0777),
            ClockSequenceController::new(),
            Persistence::Store(Box::new(store)),
        );
        assert_eq!(s.current(), 0x0777);
    }

    /// Stores state on shutdown and restores it in the next run
    #[test]
    fn stores_state_on_shutdown_and_restores_it_in_the_next_run() {
        let store = MemoryStateStore::new();
        let c = ClockSequenceController::new();

        let mut first = strategy(&c, Persistence::Store(Box::new(store.clone())));
        first.get_clock_sequence(TS + 5, NODE);
        let value = first.current();
        first.shutdown();
        drop(first);

        assert_eq!(
            store.state(),
            Some(SequenceState {
                timestamp: TS + 5,
                node_identifier: NODE,
                clock_sequence: value,
            })
        );

        let second = ClockSequenceStrategy::new(
            TS + 6,
            NODE,
            Adapter(rand::thread_rng()),
            c.clone(),
            Persistence::Store(Box::new(store.clone())),
        );
        assert_eq!(second.current(), value);
    }

    /// Stores state at most once
    #[test]
    fn stores_state_at_most_once() {
        let counter = CountingStore::default();
        let c = ClockSequenceController::new();
        let mut s = strategy(&c, Persistence::Store(Box::new(counter.clone())));
        s.shutdown();
        s.get_clock_sequence(TS - 1, NODE);
        s.shutdown();
        assert_eq!(*counter.stores.lock().unwrap(), 1);
    }

    /// Swallows storage failures on shutdown
    #[test]
    fn swallows_storage_failures_on_shutdown() {
        let c = ClockSequenceController::new();
        let mut s = strategy(&c, Persistence::Store(Box::new(FailingStore)));
        s.shutdown();
        assert!(s.current() <= CLOCK_SEQUENCE_MAX);
    }

    /// Ignores injected store when persistence is disabled
    #[test]
    fn ignores_injected_store_when_persistence_is_disabled() {
        let settings = Settings::default();
        let store = MemoryStateStore::new();
        let p = Persistence::from_settings(&settings, Some(Box::new(store.clone())));
        assert!(matches!(p, Persistence::Disabled));

        let c = ClockSequenceController::new();
        let mut s = strategy(&c, p);
        s.shutdown();
        assert_eq!(store.state(), None);
    }

    /// Falls back to file store when enabled without injected store
    #[test]
    fn falls_back_to_file_store_when_enabled_without_injected_store() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            state_enabled: true,
            state_file: dir.path().join("state.json"),
        };
        let c = ClockSequenceController::new();

        let mut s = strategy(&c, Persistence::from_settings(&settings, None));
        let value = s.current();
        s.shutdown();
        drop(s);

        let s = ClockSequenceStrategy::new(
            TS + 1,
            NODE,
            Adapter(rand::thread_rng()),
            c.clone(),
            Persistence::from_settings(&settings, None),
        );
        assert_eq!(s.current(), value);
    }

    /// Releases value to controller when dropped
    #[test]
    fn releases_value_to_controller_when_dropped() {
        let c = ClockSequenceController::new();
        let s = strategy(&c, Persistence::Disabled);
        let value = s.current();
        assert!(c.is_held(value));
        drop(s);
        assert!(!c.is_held(value));
        assert_eq!(c.held_count(), 0);
    }

    /// Avoids values held by other instances
    #[test]
    fn avoids_values_held_by_other_instances() {
        let c = ClockSequenceController::new();
        let new = || {
            ClockSequenceStrategy::new(TS, NODE, FixedRand(42), c.clone(), Persistence::Disabled)
        };
        let mut a = new();
        let mut b = new();
        assert_eq!((a.current(), b.current()), (42, 43));

        // a must skip over 43
        assert_eq!(a.next(), 44);
        assert_eq!(b.next(), 45);
        assert_eq!(a.next(), 46);
        assert!(!c.is_held(42));
        assert!(!c.is_held(43));
    }

    /// Keeps own value when every other value is held
    #[test]
    fn keeps_own_value_when_every_other_value_is_held() {
        let c = ClockSequenceController::new();
        let mut s =
            ClockSequenceStrategy::new(TS, NODE, FixedRand(42), c.clone(), Persistence::Disabled);
        for i in (0..=CLOCK_SEQUENCE_MAX).filter(|i| *i != 42) {
            assert_eq!(c.borrow(None, i), i);
        }

        assert_eq!(s.next(), 42);
        assert_eq!(s.get_clock_sequence(TS - 1, NODE), 42);
        assert_eq!(s.current(), 42);
        assert_eq!(s.controller().lease_count(42), 1);
        assert_eq!(c.held_count(), CLOCK_SEQUENCE_MAX as usize + 1);
    }

    /// Reports to the controller it was given
    #[test]
    fn reports_to_the_controller_it_was_given() {
        let c = ClockSequenceController::new();
        let s = strategy(&c, Persistence::Disabled);
        assert!(s.controller().is_held(s.current()));
        assert_eq!(s.controller().held_count(), 1);
        assert!(!ClockSequenceController::new().is_held(s.current()));
    }

    /// Never hands one value to two instances under multithreading
    #[test]
    fn never_hands_one_value_to_two_instances_under_multithreading() {
        use std::collections::HashSet;
        use std::{sync::Barrier, thread};

        const N_THREADS: usize = 8;
        const N_ITERATIONS: u64 = 10_000;

        let c = ClockSequenceController::new();
        let barrier = Barrier::new(N_THREADS);
        let strategies: Vec<ClockSequenceStrategy<FixedRand>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..N_THREADS)
                .map(|_| {
                    let c = c.clone();
                    let barrier = &barrier;
                    scope.spawn(move || {
                        let mut s = ClockSequenceStrategy::new(
                            TS,
                            NODE,
                            FixedRand(0),
                            c.clone(),
                            Persistence::Disabled,
                        );
                        barrier.wait();
                        for i in 0..N_ITERATIONS {
                            let value = s.get_clock_sequence(TS - i, NODE);
                            assert_eq!(c.lease_count(value), 1);
                        }
                        s
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let distinct: HashSet<u16> = strategies.iter().map(|s| s.current()).collect();
        assert_eq!(distinct.len(), N_THREADS);
        assert_eq!(c.held_count(), N_THREADS);
    }

    #[derive(Clone, Default)]
    struct CountingStore {
        stores: std::sync::Arc<std::sync::Mutex<usize>>,
    }

    impl StateStore for CountingStore {
        fn is_valid(&self) -> bool {
            false
        }
        fn timestamp(&self) -> u64 {
            0
        }
        fn node_identifier(&self) -> u64 {
            0
        }
        fn clock_sequence(&self) -> u16 {
            0
        }
        fn set_timestamp(&mut self, _: u64) {}
        fn set_node_identifier(&mut self, _: u64) {}
        fn set_clock_sequence(&mut self, _: u16) {}
        fn store(&mut self) -> Result<(), StateError> {
            *self.stores.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct FailingStore;

    impl StateStore for FailingStore {
        fn is_valid(&self) -> bool {
            false
        }
        fn timestamp(&self) -> u64 {
            0
        }
        fn node_identifier(&self) -> u64 {
            0
        }
        fn clock_sequence(&self) -> u16 {
            0
        }
        fn set_timestamp(&mut self, _: u64) {}
        fn set_node_identifier(&mut self, _: u64) {}
        fn set_clock_sequence(&mut self, _: u16) {}
        fn store(&mut self) -> Result<(), StateError> {
            Err(StateError::Io {
                path: "/nonexistent".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }
    }
}
