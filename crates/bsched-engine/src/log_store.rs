//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Bundle lifecycle facade and query contract."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Historical log retrieval contract.
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of a stored log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal progress.
    Info,
    /// Something unexpected that did not fail the job.
    Warn,
    /// A failure.
    Error,
}

impl LogLevel {
    /// Upper-case label used in rendered lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// One stored log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// When the line was written.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Job the line belongs to.
    pub job_id: String,
    /// Message body.
    pub message: String,
}

impl LogLine {
    /// Line stamped with the current time.
    pub fn now(level: LogLevel, job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            job_id: job_id.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<5} [{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level.as_str(),
            self.job_id,
            self.message
        )
    }
}

/// Selects which lines a stream yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Only lines of this job.
    pub job_id: String,
    /// Lowest severity to include.
    pub min_level: LogLevel,
}

impl LogFilter {
    /// Every line of `job_id`.
    pub fn for_job(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            min_level: LogLevel::Debug,
        }
    }

    /// Whether `line` passes the filter.
    pub fn matches(&self, line: &LogLine) -> bool {
        line.job_id == self.job_id && line.level >= self.min_level
    }
}

/// Failures raised by a log store.
#[derive(Debug, Error)]
pub enum LogStoreError {
    /// Reading the backing medium failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A stored entry could not be decoded.
    #[error("malformed log entry: {0}")]
    Json(#[from] serde_json::Error),
    /// The store cannot serve requests right now.
    #[error("log store unavailable: {0}")]
    Unavailable(String),
}

/// Lazily produced log lines. Items are read on demand.
pub type LogStream<'a> = Box<dyn Iterator<Item = Result<LogLine, LogStoreError>> + Send + 'a>;

/// Source of historical log lines.
pub trait LogStore: Send + Sync {
    /// Stream the lines matching `filter` whose timestamp lies in `[from, to]`,
    /// in the order they were written.
    fn stream(
        &self,
        filter: &LogFilter,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<LogStream<'_>, LogStoreError>;
}
