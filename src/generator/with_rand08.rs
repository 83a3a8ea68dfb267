//! Integration with `rand` (v0.8) crate.

use super::{RandSource, V1Generator};
use crate::controller::ClockSequenceController;
use crate::strategy::Persistence;
use rand::RngCore;

/// An adapter that implements [`RandSource`] for [`RngCore`] types.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Adapter<T>(/** The wrapped [`RngCore`] type. */ pub T);

impl<T: RngCore> RandSource for Adapter<T> {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }
}

impl<T: RngCore> V1Generator<Adapter<T>> {
    /// Creates a generator object with a specified random number generator that implements
    /// [`RngCore`] from `rand` (v0.8) crate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use uuid1::{ClockSequenceController, Persistence, V1Generator};
    ///
    /// let mut g = V1Generator::with_rand08(
    ///     0x0123_4567_89ab,
    ///     rand::rngs::OsRng,
    ///     ClockSequenceController::new(),
    ///     Persistence::Disabled,
    /// );
    /// println!("{}", g.generate());
    /// ```
    pub fn with_rand08(
        node_identifier: u64,
        rng: T,
        controller: ClockSequenceController,
        persistence: Persistence,
    ) -> Self {
        Self::new(node_identifier, Adapter(rng), controller, persistence)
    }
}
