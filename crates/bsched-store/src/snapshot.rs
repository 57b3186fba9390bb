//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Reference job store and log journal."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use bsched_engine::BundleJob;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::{Result, StoreError};

/// Current snapshot envelope version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Job table persisted in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobTable {
    /// Last sequence number handed out for a job id.
    pub sequence: u64,
    /// Jobs in submission order.
    #[serde(default)]
    pub jobs: Vec<BundleJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    version: u16,
    created_at: DateTime<Utc>,
    hash: String,
    table: JobTable,
}

/// Persist the job table to `path` as a hashed JSON envelope.
///
/// The envelope is staged in a temporary file next to `path` and renamed over
/// it, so a failed save leaves the previous snapshot in place.
pub fn save_snapshot(table: &JobTable, path: &Path) -> Result<()> {
    write_snapshot(table, path, |writer, envelope| {
        Ok(serde_json::to_writer_pretty(writer, envelope)?)
    })
}

fn write_snapshot(
    table: &JobTable,
    path: &Path,
    encode: impl FnOnce(&mut dyn Write, &SnapshotEnvelope) -> Result<()>,
) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let envelope = SnapshotEnvelope {
        version: SNAPSHOT_VERSION,
        created_at: Utc::now(),
        hash: compute_hash(table)?,
        table: table.clone(),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        encode(&mut writer, &envelope)?;
        writer.flush()?;
    }
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| StoreError::Io(err.error))?;
    Ok(())
}

/// Load a snapshot from disk and return the contained job table.
pub fn load_snapshot(path: &Path) -> Result<JobTable> {
    let envelope = load_envelope(path)?;
    if envelope.version != SNAPSHOT_VERSION {
        return Err(StoreError::UnsupportedVersion(envelope.version));
    }
    if envelope.hash != compute_hash(&envelope.table)? {
        return Err(StoreError::HashMismatch);
    }
    Ok(envelope.table)
}

/// Verify the integrity of a snapshot without keeping the payload.
pub fn verify_snapshot(path: &Path) -> bool {
    load_snapshot(path).is_ok()
}

fn load_envelope(path: &Path) -> Result<SnapshotEnvelope> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn compute_hash(table: &JobTable) -> Result<String> {
    let serialized = serde_json::to_vec(table)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized);
    Ok(hex::encode(hasher.finalize()))
}
