//! RFC 4122 time-based (version 1) UUIDs with a durable, collision-arbitrated clock sequence
//!
//! ```rust
//! use uuid1::uuid1;
//!
//! let uuid = uuid1();
//! println!("{}", uuid); // e.g. "c2a98f10-8d5b-11ed-9a2b-0123456789ab"
//! println!("{:?}", uuid.as_bytes()); // as 16-byte big-endian array
//!
//! // store the clock sequence state during orderly shutdown
//! uuid1::flush_state();
//! ```
//!
//! See [RFC 4122](https://www.rfc-editor.org/rfc/rfc4122).
//!
//! # Field and bit layout
//!
//! This implementation produces identifiers with the following bit layout:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          time_low                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |       time_mid                |  ver  |      time_high        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |var|      clock_seq            |             node              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                              node                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Where:
//!
//! - The 60-bit timestamp, split into `time_low`, `time_mid`, and `time_high`, counts
//!   100-nanosecond intervals since the Gregorian epoch (1582-10-15T00:00:00Z).
//! - The 4-bit `ver` field is set at `0001`.
//! - The 2-bit `var` field is set at `10`.
//! - The 14-bit `clock_seq` field holds the clock sequence.
//! - The 48-bit `node` field holds the node identifier.
//!
//! # Clock sequence
//!
//! The clock sequence is initialized to a random number and kept while timestamps increase. It is
//! advanced whenever a timestamp is not later than the previous one, and whenever a restored state
//! shows that the clock was set backwards or the node identifier changed. Generators in one
//! process that share a [`ClockSequenceController`] never hold the same value at once. See
//! [`ClockSequenceStrategy`] for details.
//!
//! # Persistence
//!
//! The state is persisted only when enabled through [`Settings`], by default in a JSON file in the
//! temporary directory:
//!
//! ```sh
//! UUID1_STATE_ENABLED=true UUID1_STATE_FILE=/var/lib/myapp/uuid1.json myapp
//! ```
//!
//! Applications that keep the state elsewhere implement [`state::StateStore`] and pass it through
//! [`Persistence::Store`].

mod uuid;
pub use uuid::{ParseError, Uuid};

pub mod config;
pub use config::Settings;

mod controller;
pub use controller::ClockSequenceController;

mod error;
pub use error::StateError;

pub mod generator;
pub use generator::V1Generator;

pub mod sequence;

pub mod state;

mod strategy;
pub use strategy::{ClockSequenceStrategy, Persistence};

pub mod timestamp;

mod global_gen;
#[cfg(feature = "global_gen")]
pub use global_gen::{flush_state, global_controller, uuid1};
