//! Durable record of the last generation context.
//!
//! A [`StateStore`] is read once when a [`ClockSequenceStrategy`] is constructed and written once
//! when it is shut down. Two adapters are provided: [`FileStateStore`], the default durable one,
//! and [`MemoryStateStore`] for embedding applications that persist elsewhere or for tests.
//!
//! [`ClockSequenceStrategy`]: crate::ClockSequenceStrategy

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::{fs, io, io::Write};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::StateError;
use crate::sequence::CLOCK_SEQUENCE_MAX;

/// The last-known-good generation context.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct SequenceState {
    /// Number of 100-nanosecond intervals since the Gregorian epoch.
    pub timestamp: u64,
    pub node_identifier: u64,
    pub clock_sequence: u16,
}

impl SequenceState {
    /// Returns `true` if the clock sequence fits in 14 bits.
    pub const fn is_valid(&self) -> bool {
        self.clock_sequence <= CLOCK_SEQUENCE_MAX
    }
}

/// Storage interface consumed by [`ClockSequenceStrategy`].
///
/// The getters describe the record loaded from storage and are meaningful only when
/// [`is_valid()`](Self::is_valid) returns `true`. The setters stage values for the next call to
/// [`store()`](Self::store).
///
/// [`ClockSequenceStrategy`]: crate::ClockSequenceStrategy
pub trait StateStore {
    /// Returns `true` if a usable prior record exists.
    fn is_valid(&self) -> bool;

    fn timestamp(&self) -> u64;

    fn node_identifier(&self) -> u64;

    fn clock_sequence(&self) -> u16;

    fn set_timestamp(&mut self, timestamp: u64);

    fn set_node_identifier(&mut self, node_identifier: u64);

    fn set_clock_sequence(&mut self, clock_sequence: u16);

    /// Durably persists the staged values.
    fn store(&mut self) -> Result<(), StateError>;

    /// Returns the loaded record if it is usable.
    fn state(&self) -> Option<SequenceState> {
        if !self.is_valid() {
            return None;
        }
        Some(SequenceState {
            timestamp: self.timestamp(),
            node_identifier: self.node_identifier(),
            clock_sequence: self.clock_sequence(),
        })
        .filter(SequenceState::is_valid)
    }

    /// Stages every field of `state`.
    fn stage(&mut self, state: &SequenceState) {
        self.set_timestamp(state.timestamp);
        self.set_node_identifier(state.node_identifier);
        self.set_clock_sequence(state.clock_sequence);
    }
}

/// In-memory [`StateStore`] whose clones share the same record.
///
/// # Examples
///
/// ```rust
/// use uuid1::state::{MemoryStateStore, SequenceState, StateStore};
///
/// let store = MemoryStateStore::new();
/// let mut handle = store.clone();
/// handle.stage(&SequenceState { timestamp: 1, node_identifier: 2, clock_sequence: 3 });
/// handle.store()?;
/// assert_eq!(store.state().map(|s| s.clock_sequence), Some(3));
/// # Ok::<(), uuid1::StateError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryStateStore {
    record: Arc<Mutex<Option<SequenceState>>>,
    staged: SequenceState,
}

impl MemoryStateStore {
    /// Creates a store with no prior record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with `state`.
    pub fn with_state(state: SequenceState) -> Self {
        Self {
            record: Arc::new(Mutex::new(Some(state))),
            staged: state,
        }
    }

    fn record(&self) -> Option<SequenceState> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn loaded(&self) -> SequenceState {
        self.record().unwrap_or_default()
    }
}

impl StateStore for MemoryStateStore {
    fn is_valid(&self) -> bool {
        self.record().is_some_and(|s| s.is_valid())
    }

    fn timestamp(&self) -> u64 {
        self.loaded().timestamp
    }

    fn node_identifier(&self) -> u64 {
        self.loaded().node_identifier
    }

    fn clock_sequence(&self) -> u16 {
        self.loaded().clock_sequence
    }

    fn set_timestamp(&mut self, timestamp: u64) {
        self.staged.timestamp = timestamp;
    }

    fn set_node_identifier(&mut self, node_identifier: u64) {
        self.staged.node_identifier = node_identifier;
    }

    fn set_clock_sequence(&mut self, clock_sequence: u16) {
        self.staged.clock_sequence = clock_sequence;
    }

    fn store(&mut self) -> Result<(), StateError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(self.staged);
        Ok(())
    }
}

/// [`StateStore`] that keeps the record as a JSON document in a local file.
///
/// The record is loaded when the store is opened; a missing, unreadable, or malformed file is
/// reported as no valid record. [`store()`](StateStore::store) writes and syncs a uniquely named
/// temporary file in the same directory and renames it over the target, so readers see either the
/// old or the new record in full, and concurrent writers do not interfere with each other.
#[derive(Clone, Debug)]
pub struct FileStateStore {
    path: PathBuf,
    loaded: Option<SequenceState>,
    staged: SequenceState,
}

impl FileStateStore {
    /// Opens the store at `path`, loading the record it holds, if any.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let loaded = match Self::load(&path) {
            Ok(state) if state.is_valid() => Some(state),
            Ok(state) => {
                tracing::debug!(path = %path.display(), ?state, "ignoring out-of-range state record");
                None
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "no usable state record");
                None
            }
        };
        Self {
            staged: loaded.unwrap_or_default(),
            path,
            loaded,
        }
    }

    /// Returns the path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> io::Result<SequenceState> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(io::Error::from)
    }

    /// Directory that holds the state file and its temporary siblings.
    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn io_error(&self, source: io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for FileStateStore {
    fn is_valid(&self) -> bool {
        self.loaded.is_some()
    }

    fn timestamp(&self) -> u64 {
        self.loaded.unwrap_or_default().timestamp
    }

    fn node_identifier(&self) -> u64 {
        self.loaded.unwrap_or_default().node_identifier
    }

    fn clock_sequence(&self) -> u16 {
        self.loaded.unwrap_or_default().clock_sequence
    }

    fn set_timestamp(&mut self, timestamp: u64) {
        self.staged.timestamp = timestamp;
    }

    fn set_node_identifier(&mut self, node_identifier: u64) {
        self.staged.node_identifier = node_identifier;
    }

    fn set_clock_sequence(&mut self, clock_sequence: u16) {
        self.staged.clock_sequence = clock_sequence;
    }

    fn store(&mut self) -> Result<(), StateError> {
        let bytes = serde_json::to_vec(&self.staged)?;

        // a uniquely named sibling per write, so concurrent writers never share a temporary file
        let mut temporary =
            NamedTempFile::new_in(self.directory()).map_err(|err| self.io_error(err))?;
        temporary
            .write_all(&bytes)
            .map_err(|err| self.io_error(err))?;
        temporary
            .as_file()
            .sync_all()
            .map_err(|err| self.io_error(err))?;
        temporary
            .persist(&self.path)
            .map_err(|err| self.io_error(err.error))?;

        tracing::debug!(path = %self.path.display(), state = ?self.staged, "stored state record");
        Ok(())
    }
}
