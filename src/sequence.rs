//! Bounded sequence counter with wraparound.

/// Lowest clock sequence value.
pub const CLOCK_SEQUENCE_MIN: u16 = 0x0000;

/// Highest clock sequence value (14 bits).
pub const CLOCK_SEQUENCE_MAX: u16 = 0x3fff;

/// Represents a counter confined to `[min, max]` that wraps around to `min` when incremented past
/// `max`.
///
/// A fresh counter is unset. [`current()`](Self::current) reports an unset counter as zero masked
/// into range, while [`get()`](Self::get) tells the two cases apart. The counter itself is not
/// synchronized; wrap it in a lock when sharing it across threads.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BoundedSequence {
    value: i32,
    min: u16,
    max: u16,
}

impl BoundedSequence {
    const UNSET: i32 = -1;

    /// Creates an unset counter bounded by `[min, max]`.
    ///
    /// # Panics
    ///
    /// Panics if `min > max`.
    pub const fn new(min: u16, max: u16) -> Self {
        assert!(min <= max, "`min` must not exceed `max`");
        Self {
            value: Self::UNSET,
            min,
            max,
        }
    }

    /// Creates an unset counter covering the 14-bit clock sequence space.
    pub const fn clock_sequence() -> Self {
        Self::new(CLOCK_SEQUENCE_MIN, CLOCK_SEQUENCE_MAX)
    }

    /// Returns the lower bound.
    pub const fn min(&self) -> u16 {
        self.min
    }

    /// Returns the upper bound.
    pub const fn max(&self) -> u16 {
        self.max
    }

    /// Returns the number of distinct values the counter can hold.
    pub const fn span(&self) -> u32 {
        (self.max - self.min) as u32 + 1
    }

    /// Returns the current value, or `None` if the counter has never been set.
    pub fn get(&self) -> Option<u16> {
        if self.value == Self::UNSET {
            None
        } else {
            Some(self.value as u16)
        }
    }

    /// Returns the current value without advancing the counter, or the lower bound if unset.
    pub fn current(&self) -> u16 {
        self.get().unwrap_or(self.min)
    }

    /// Advances the counter by one and returns the new value.
    pub fn next(&mut self) -> u16 {
        let next = if self.value == Self::UNSET || self.value >= self.max as i32 {
            self.min
        } else {
            self.mask(self.value + 1)
        };
        self.value = next as i32;
        next
    }

    /// Forces the counter to `value`, masked into range.
    pub fn set(&mut self, value: i64) -> u16 {
        let masked = self.mask(value);
        self.value = masked as i32;
        masked
    }

    /// Folds an arbitrary integer into `[min, max]` by modular arithmetic.
    fn mask(&self, value: impl Into<i64>) -> u16 {
        let offset = (value.into() - self.min as i64).rem_euclid(self.span() as i64);
        (self.min as i64 + offset) as u16
    }
}

impl Default for BoundedSequence {
    fn default() -> Self {
        Self::clock_sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundedSequence, CLOCK_SEQUENCE_MAX};

    /// Starts unset and reports zero
    #[test]
    fn starts_unset_and_reports_zero() {
        let s = BoundedSequence::clock_sequence();
        assert_eq!(s.get(), None);
        assert_eq!(s.current(), 0);
    }

    /// Reports bounds and span of custom range
    #[test]
    fn reports_bounds_and_span_of_custom_range() {
        let s = BoundedSequence::new(10, 20);
        assert_eq!((s.min(), s.max(), s.span()), (10, 20, 11));
        assert_eq!(s.current(), s.min());

        let c = BoundedSequence::clock_sequence();
        assert_eq!((c.min(), c.max()), (0, CLOCK_SEQUENCE_MAX));
        assert_eq!(c.span(), 0x4000);
    }

    /// Advances from unset to min
    #[test]
    fn advances_from_unset_to_min() {
        let mut s = BoundedSequence::new(10, 20);
        assert_eq!(s.next(), 10);
        assert_eq!(s.next(), 11);
        assert_eq!(s.get(), Some(11));
    }

    /// Wraps around to min after max
    #[test]
    fn wraps_around_to_min_after_max() {
        let mut s = BoundedSequence::clock_sequence();
        s.set(CLOCK_SEQUENCE_MAX as i64);
        assert_eq!(s.next(), 0);
        assert_eq!(s.next(), 1);
    }

    /// Never yields values outside the 14-bit range
    #[test]
    fn never_yields_values_outside_the_14_bit_range() {
        let mut s = BoundedSequence::clock_sequence();
        for _ in 0..3 * (CLOCK_SEQUENCE_MAX as usize + 1) {
            assert!(s.next() <= CLOCK_SEQUENCE_MAX);
        }
    }

    /// Masks forced values into range
    #[test]
    fn masks_forced_values_into_range() {
        let mut s = BoundedSequence::clock_sequence();
        assert_eq!(s.set(0x4000), 0);
        assert_eq!(s.set(0x4001), 1);
        assert_eq!(s.set(-1), CLOCK_SEQUENCE_MAX);

        let mut t = BoundedSequence::new(10, 20);
        assert_eq!(t.set(21), 10);
        assert_eq!(t.set(9), 20);
        assert_eq!(t.set(15), 15);
    }
}
