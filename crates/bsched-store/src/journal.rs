//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Reference job store and log journal."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! JSON-lines job log journal.
//!
//! The first line of a journal is a header; every following line is one
//! serialized [`LogLine`].
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use bsched_engine::{LogFilter, LogLine, LogStore, LogStoreError, LogStream};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::{Result, StoreError};

const JOURNAL_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalHeader {
    version: u16,
    created_at: DateTime<Utc>,
    hash: String,
}

impl JournalHeader {
    fn new() -> Self {
        let created_at = Utc::now();
        let hash = format!(
            "{:x}",
            sha2::Sha256::digest(created_at.to_rfc3339().as_bytes())
        );
        Self {
            version: JOURNAL_VERSION,
            created_at,
            hash,
        }
    }
}

/// Append-only writer for the journal.
pub struct JournalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JournalWriter {
    /// Open a journal for appending, writing a header if the file is new.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let fresh = !path.exists() || fs::metadata(path)?.len() == 0;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);

        if fresh {
            let line = serde_json::to_string(&JournalHeader::new())?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    /// Append one line and flush it, returning the number of bytes written.
    pub fn append(&mut self, line: &LogLine) -> Result<usize> {
        let encoded = serde_json::to_string(line)?;
        self.writer.write_all(encoded.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(encoded.len() + 1)
    }

    /// Location of the journal on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for JournalWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalWriter")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Sequential reader over journal lines. Lines are decoded on demand.
pub struct JournalReader {
    lines: Lines<BufReader<File>>,
}

impl JournalReader {
    /// Open the journal and validate its header.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut first_line = String::new();
        reader.read_line(&mut first_line)?;
        if !first_line.trim().is_empty() {
            let header: JournalHeader = serde_json::from_str(&first_line)?;
            if header.version != JOURNAL_VERSION {
                return Err(StoreError::UnsupportedVersion(header.version));
            }
        }
        Ok(Self {
            lines: reader.lines(),
        })
    }
}

impl Iterator for JournalReader {
    type Item = Result<LogLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(serde_json::from_str(&line).map_err(StoreError::from)),
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

/// [`LogStore`] backed by a journal file.
#[derive(Debug, Clone)]
pub struct JournalLogStore {
    path: PathBuf,
}

impl JournalLogStore {
    /// Serve lines from the journal at `path`. The file may not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LogStore for JournalLogStore {
    fn stream(
        &self,
        filter: &LogFilter,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> std::result::Result<LogStream<'_>, LogStoreError> {
        if !self.path.exists() {
            return Ok(Box::new(std::iter::empty()));
        }
        let reader = JournalReader::open(&self.path)?;
        let filter = filter.clone();
        Ok(Box::new(reader.filter_map(move |entry| match entry {
            Ok(line) if filter.matches(&line) && line.timestamp >= from && line.timestamp <= to => {
                Some(Ok(line))
            }
            Ok(_) => None,
            Err(err) => Some(Err(err.into())),
        })))
    }
}
