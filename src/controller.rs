//! Process-wide arbitration of clock sequence values between generators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::sequence::{CLOCK_SEQUENCE_MAX, CLOCK_SEQUENCE_MIN};

/// Number of distinct clock sequence values.
const SPACE: u32 = (CLOCK_SEQUENCE_MAX - CLOCK_SEQUENCE_MIN) as u32 + 1;

/// Arbitrates clock sequence values among the [`ClockSequenceStrategy`] instances that share it so
/// that no two of them hold the same value at once.
///
/// The controller is a handle to a shared registry: clones refer to the same registry, while each
/// call to [`new()`](Self::new) creates an isolated one. An application that runs several
/// generators in one process should construct one controller and hand a clone to each of them.
///
/// # Examples
///
/// ```rust
/// use uuid1::ClockSequenceController;
///
/// let controller = ClockSequenceController::new();
/// let a = controller.borrow(None, 42);
/// let b = controller.clone().borrow(None, 42);
/// assert_eq!(a, 42);
/// assert_eq!(b, 43);
/// ```
///
/// # Collision resolution
///
/// When the requested value is held by another instance, candidates are proposed by linear
/// increment with wraparound, and the first one that is free is committed. The search visits each
/// of the 16,384 values at most once, and a candidate equal to the caller's own `give` counts as
/// free. So when every other value is held:
///
/// - a caller that gives a value keeps it, i.e. `borrow` returns `give` unchanged;
/// - a caller that gives nothing is granted the requested value anyway as a shared lease, which
///   is logged rather than reported as an error.
///
/// Both outcomes are residual collisions inherent to a 14-bit space.
///
/// [`ClockSequenceStrategy`]: crate::ClockSequenceStrategy
#[derive(Clone, Debug, Default)]
pub struct ClockSequenceController {
    registry: Arc<Mutex<Registry>>,
}

impl ClockSequenceController {
    /// Creates a controller with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases `give` and acquires a value as close as possible to `take`, returning the value
    /// acquired.
    ///
    /// `give` is `None` when the caller holds nothing yet. A `take` outside the 14-bit range is
    /// masked into it.
    pub fn borrow(&self, give: Option<u16>, take: u16) -> u16 {
        let take = take & CLOCK_SEQUENCE_MAX;
        let mut registry = self.lock();

        for candidate in Proposal::new(take) {
            if registry.commit(give, candidate) {
                return candidate;
            }
        }

        tracing::warn!(
            take,
            "clock sequence space exhausted; sharing a value already held"
        );
        registry.force(give, take);
        take
    }

    /// Gives `value` back to the registry.
    pub fn release(&self, value: u16) {
        self.lock().release(value);
    }

    /// Returns `true` if some instance holds `value`.
    pub fn is_held(&self, value: u16) -> bool {
        self.lease_count(value) > 0
    }

    /// Returns the number of instances holding `value`; more than one only after exhaustion.
    pub fn lease_count(&self, value: u16) -> usize {
        self.lock().leases.get(&value).copied().unwrap_or(0)
    }

    /// Returns the number of distinct values currently held.
    pub fn held_count(&self) -> usize {
        self.lock().leases.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // every mutation completes under the lock, so a poisoned registry is still consistent
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held value -> number of leases.
#[derive(Debug, Default)]
struct Registry {
    leases: HashMap<u16, usize>,
}

impl Registry {
    /// Commits `candidate` if it is free or already owned by the giver.
    fn commit(&mut self, give: Option<u16>, candidate: u16) -> bool {
        if give == Some(candidate) {
            return true;
        }
        if self.leases.contains_key(&candidate) {
            return false;
        }
        self.leases.insert(candidate, 1);
        if let Some(give) = give {
            self.release(give);
        }
        true
    }

    fn force(&mut self, give: Option<u16>, take: u16) {
        *self.leases.entry(take).or_insert(0) += 1;
        if let Some(give) = give {
            self.release(give);
        }
    }

    fn release(&mut self, value: u16) {
        if let Some(count) = self.leases.get_mut(&value) {
            *count -= 1;
            if *count == 0 {
                self.leases.remove(&value);
            }
        }
    }
}

/// Candidate values starting at the requested one, each value of the space visited once.
struct Proposal {
    candidate: u16,
    remaining: u32,
}

impl Proposal {
    fn new(take: u16) -> Self {
        Self {
            candidate: take,
            remaining: SPACE,
        }
    }
}

impl Iterator for Proposal {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.candidate;
        self.candidate = if current >= CLOCK_SEQUENCE_MAX {
            CLOCK_SEQUENCE_MIN
        } else {
            current + 1
        };
        Some(current)
    }
}
