//! Default generator and entry point functions.

#![cfg(feature = "global_gen")]
#![cfg_attr(docsrs, doc(cfg(feature = "global_gen")))]

use std::sync;

use crate::{ClockSequenceController, Uuid};
use inner::GlobalGenInner;

/// Returns the lock handle of process-wide global generator, creating one if none exists.
fn lock_global_gen() -> sync::MutexGuard<'static, GlobalGenInner> {
    static G: sync::OnceLock<sync::Mutex<GlobalGenInner>> = sync::OnceLock::new();
    G.get_or_init(Default::default)
        .lock()
        .unwrap_or_else(sync::PoisonError::into_inner)
}

/// Returns a handle to the controller that arbitrates the clock sequence of the global generator.
///
/// Pass it to application generators that run alongside [`uuid1()`] so that none of them holds
/// the clock sequence the global generator uses.
///
/// # Examples
///
/// ```rust
/// use uuid1::{global_controller, Persistence, V1Generator};
///
/// let mut g = V1Generator::with_rand08(
///     0x0123_4567_89ab,
///     rand::thread_rng(),
///     global_controller(),
///     Persistence::Disabled,
/// );
/// println!("{} {}", uuid1::uuid1(), g.generate());
/// ```
pub fn global_controller() -> ClockSequenceController {
    static C: sync::OnceLock<ClockSequenceController> = sync::OnceLock::new();
    C.get_or_init(ClockSequenceController::new).clone()
}

/// Generates a version 1 UUID object.
///
/// This function employs a global generator configured by [`Settings::from_env()`] and arbitrated
/// by [`global_controller()`]. Its node identifier is the one in the stored state if persistence is
/// enabled and a record exists, and a random one otherwise. The generator guarantees process-wide uniqueness even when the system clock
/// moves backwards. On Unix, this function resets the generator when the process ID changes
/// (i.e., upon process forks) to prevent collisions across processes.
///
/// # Examples
///
/// ```rust
/// let uuid = uuid1::uuid1();
/// println!("{}", uuid); // e.g., "c2a98f10-8d5b-11ed-9a2b-0123456789ab"
/// println!("{:?}", uuid.as_bytes()); // as 16-byte big-endian array
///
/// let uuid_string: String = uuid1::uuid1().to_string();
/// ```
///
/// [`Settings::from_env()`]: crate::Settings::from_env
pub fn uuid1() -> Uuid {
    lock_global_gen().get_mut().generate()
}

/// Stores the clock sequence state of the global generator.
///
/// Call this once during the orderly shutdown of the application. It does nothing unless state
/// persistence is enabled in the settings, and storage failures are only logged.
pub fn flush_state() {
    lock_global_gen().get_mut().shutdown();
}

mod inner {
    use rand::rngs::adapter::ReseedingRng;
    use rand::rngs::OsRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Core;

    use crate::config::Settings;
    use crate::generator::{random_node_identifier, RandSource, V1Generator, MAX_NODE_IDENTIFIER};
    use crate::strategy::Persistence;

    /// The type alias for the random number generator of the global generator.
    ///
    /// The global generator currently employs [`ChaCha12Core`] with [`ReseedingRng`] wrapper to
    /// emulate the strategy used by [`rand::rngs::ThreadRng`].
    #[derive(Debug)]
    pub struct GlobalGenRng(ReseedingRng<ChaCha12Core, OsRng>);

    impl Default for GlobalGenRng {
        fn default() -> Self {
            Self(ReseedingRng::new(
                ChaCha12Core::from_entropy(),
                1024 * 64,
                OsRng,
            ))
        }
    }

    impl RandSource for GlobalGenRng {
        fn next_u32(&mut self) -> u32 {
            rand::RngCore::next_u32(&mut self.0)
        }

        fn next_u64(&mut self) -> u64 {
            rand::RngCore::next_u64(&mut self.0)
        }
    }

    /// A thin wrapper to reset the state when the process ID changes (i.e., upon Unix forks).
    #[derive(Debug)]
    pub struct GlobalGenInner {
        #[cfg(unix)]
        pid: u32,
        generator: V1Generator<GlobalGenRng>,
    }

    impl Default for GlobalGenInner {
        fn default() -> Self {
            Self {
                #[cfg(unix)]
                pid: std::process::id(),
                generator: Self::new_generator(true),
            }
        }
    }

    impl GlobalGenInner {
        /// Creates a generator, keeping the stored node identifier if `reuse_node` is set.
        ///
        /// A forked child passes `false`: sharing the parent's node would let both processes
        /// restore the same clock sequence.
        fn new_generator(reuse_node: bool) -> V1Generator<GlobalGenRng> {
            let settings = Settings::from_env();
            let persistence = Persistence::from_settings(&settings, None);
            let mut rng = GlobalGenRng::default();
            let node_identifier = reuse_node
                .then(|| stored_node_identifier(&persistence))
                .flatten()
                .unwrap_or_else(|| random_node_identifier(&mut rng));
            tracing::debug!(
                node_identifier,
                state_enabled = settings.state_enabled,
                "initializing global generator"
            );
            V1Generator::new(node_identifier, rng, super::global_controller(), persistence)
        }

        /// Returns a mutable reference to the inner [`V1Generator`] instance, reseting the
        /// generator state on Unix if the process ID has changed.
        pub fn get_mut(&mut self) -> &mut V1Generator<GlobalGenRng> {
            #[cfg(unix)]
            if self.pid != std::process::id() {
                self.pid = std::process::id();
                self.generator = Self::new_generator(false);
            }
            &mut self.generator
        }
    }

    /// Returns the node identifier of the stored record, if any.
    pub(super) fn stored_node_identifier(persistence: &Persistence) -> Option<u64> {
        match persistence {
            Persistence::Disabled => None,
            Persistence::Store(store) => store
                .state()
                .map(|state| state.node_identifier)
                .filter(|node| *node <= MAX_NODE_IDENTIFIER),
        }
    }
}
