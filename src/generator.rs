//! Version 1 UUID generator and related types.

use crate::controller::ClockSequenceController;
use crate::strategy::{ClockSequenceStrategy, Persistence};
use crate::{timestamp, Uuid};

pub mod with_rand08;

/// A trait that defines the minimum random number generator interface for
/// [`ClockSequenceStrategy`] and [`V1Generator`].
pub trait RandSource {
    /// Returns the next random `u32`.
    fn next_u32(&mut self) -> u32;

    /// Returns the next random `u64`.
    fn next_u64(&mut self) -> u64;
}

/// Largest node identifier (48 bits).
pub const MAX_NODE_IDENTIFIER: u64 = (1 << 48) - 1;

/// Multicast bit of a 48-bit node identifier, set on identifiers that are not hardware addresses.
const MULTICAST_BIT: u64 = 1 << 40;

/// Returns a random 48-bit node identifier with the multicast bit set, so that it never collides
/// with an IEEE 802 hardware address.
pub fn random_node_identifier<R: RandSource>(rng: &mut R) -> u64 {
    (rng.next_u64() & MAX_NODE_IDENTIFIER) | MULTICAST_BIT
}

/// Represents a version 1 UUID generator that combines the system clock, a node identifier, and a
/// [`ClockSequenceStrategy`].
///
/// # Examples
///
/// ```rust
/// use std::thread;
/// use uuid1::{ClockSequenceController, Persistence, V1Generator};
///
/// let controller = ClockSequenceController::new();
/// thread::scope(|s| {
///     for i in 0..4 {
///         let controller = controller.clone();
///         s.spawn(move || {
///             let mut g = V1Generator::with_rand08(
///                 0x0123_4567_89ab,
///                 rand::thread_rng(),
///                 controller,
///                 Persistence::Disabled,
///             );
///             for _ in 0..8 {
///                 println!("{} by thread {}", g.generate(), i);
///                 thread::yield_now();
///             }
///         });
///     }
/// });
/// ```
///
/// # Generator functions
///
/// [`generate`] reads the system clock, while [`generate_core`] takes the timestamp as an
/// argument. Both ask the clock sequence strategy for a fresh value when the timestamp does not
/// move forward, so identifiers stay unique under clock rollback and within a single clock tick.
///
/// [`generate`]: V1Generator::generate
/// [`generate_core`]: V1Generator::generate_core
#[derive(Debug)]
pub struct V1Generator<R> {
    node_identifier: u64,
    strategy: ClockSequenceStrategy<R>,
}

impl<R: RandSource> V1Generator<R> {
    /// Creates a generator instance.
    ///
    /// # Panics
    ///
    /// Panics if `node_identifier` is not a 48-bit integer.
    pub fn new(
        node_identifier: u64,
        rng: R,
        controller: ClockSequenceController,
        persistence: Persistence,
    ) -> Self {
        assert!(
            node_identifier <= MAX_NODE_IDENTIFIER,
            "`node_identifier` must be a 48-bit integer"
        );
        Self {
            node_identifier,
            strategy: ClockSequenceStrategy::new(
                timestamp::current_timestamp(),
                node_identifier,
                rng,
                controller,
                persistence,
            ),
        }
    }

    /// Generates a new version 1 UUID object from the current timestamp.
    pub fn generate(&mut self) -> Uuid {
        self.generate_core(timestamp::current_timestamp())
    }

    /// Generates a new version 1 UUID object from `timestamp`, a count of 100-nanosecond intervals
    /// since the Gregorian epoch.
    ///
    /// # Panics
    ///
    /// Panics if `timestamp` is not a 60-bit integer.
    pub fn generate_core(&mut self, timestamp: u64) -> Uuid {
        assert!(
            timestamp <= timestamp::MAX_TIMESTAMP,
            "`timestamp` must be a 60-bit integer"
        );
        let clock_sequence = self
            .strategy
            .get_clock_sequence(timestamp, self.node_identifier);
        Uuid::from_fields_v1(timestamp, clock_sequence, self.node_identifier)
    }

    /// Returns the node identifier embedded in generated UUIDs.
    pub fn node_identifier(&self) -> u64 {
        self.node_identifier
    }

    /// Returns the clock sequence strategy of the generator.
    pub fn strategy(&self) -> &ClockSequenceStrategy<R> {
        &self.strategy
    }

    /// Stores the clock sequence state; see [`ClockSequenceStrategy::shutdown`].
    pub fn shutdown(&mut self) {
        self.strategy.shutdown();
    }
}

/// Supports operations as an infinite iterator that produces a new version 1 UUID object for each
/// call of `next()`.
///
/// # Examples
///
/// ```rust
/// use uuid1::{ClockSequenceController, Persistence, V1Generator};
///
/// V1Generator::with_rand08(
///     0x0123_4567_89ab,
///     rand::thread_rng(),
///     ClockSequenceController::new(),
///     Persistence::Disabled,
/// )
/// .enumerate()
/// .skip(4)
/// .take(4)
/// .for_each(|(i, e)| println!("[{}] {}", i, e));
/// ```
impl<R: RandSource> Iterator for V1Generator<R> {
    type Item = Uuid;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.generate())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl<R: RandSource> std::iter::FusedIterator for V1Generator<R> {}
