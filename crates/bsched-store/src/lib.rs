//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Reference job store and log journal."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Reference collaborators for the bundle engine: an in-memory command
//! executor with optional snapshot persistence and a JSON-lines log journal.
#![warn(missing_docs)]

use bsched_engine::{CommandError, LogStoreError};

/// Result alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error type for snapshot and journal files.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Wrapper for IO errors encountered while reading/writing store files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Reported when a snapshot fails integrity verification.
    #[error("snapshot hash mismatch")]
    HashMismatch,
    /// The file was written by an incompatible version.
    #[error("unsupported file version {0}")]
    UnsupportedVersion(u16),
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(err) => CommandError::Io(err),
            other => CommandError::Storage(other.to_string()),
        }
    }
}

impl From<StoreError> for LogStoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(err) => LogStoreError::Io(err),
            StoreError::Json(err) => LogStoreError::Json(err),
            other => LogStoreError::Unavailable(other.to_string()),
        }
    }
}

pub mod journal;
pub mod memory;
pub mod snapshot;

pub use journal::{JournalLogStore, JournalReader, JournalWriter};
pub use memory::InMemoryExecutor;
pub use snapshot::{load_snapshot, save_snapshot, verify_snapshot, JobTable, SNAPSHOT_VERSION};
