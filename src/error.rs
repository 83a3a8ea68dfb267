//! Error types.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Error persisting the clock sequence state.
#[derive(Debug, Error)]
pub enum StateError {
    /// The state file could not be written or moved into place.
    #[error("I/O error writing {}: {source}", path.display())]
    Io {
        /// Path of the file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The state record could not be encoded.
    #[error("could not serialize state record: {0}")]
    Serialize(#[from] serde_json::Error),
}
