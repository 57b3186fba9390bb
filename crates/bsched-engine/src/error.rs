//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Bundle lifecycle facade and query contract."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::io;

use thiserror::Error;

use crate::executor::{CommandError, Operation};
use crate::log_store::LogStoreError;

/// Stable error codes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Operation not supported by this engine.
    E0301,
    /// Invalid parameter value.
    E0305,
    /// Malformed list filter.
    E0420,
    /// Job does not exist.
    E0604,
    /// Command execution failed.
    E1001,
    /// Operation not valid in the job's current status.
    E1018,
}

impl ErrorCode {
    /// Code literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E0301 => "E0301",
            ErrorCode::E0305 => "E0305",
            ErrorCode::E0420 => "E0420",
            ErrorCode::E0604 => "E0604",
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1018 => "E1018",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Filter string could not be parsed.
    InvalidFilter,
    /// A caller-supplied value was rejected.
    InvalidParameter,
    /// The referenced job does not exist.
    NotFound,
    /// The job's status forbids the operation.
    IllegalTransition,
    /// The operation does not apply to bundle jobs.
    Unsupported,
    /// Execution failed inside the executor or an I/O collaborator.
    ExecutionFailure,
}

impl ErrorKind {
    /// Code reported for this kind.
    pub fn code(&self) -> ErrorCode {
        match self {
            ErrorKind::InvalidFilter => ErrorCode::E0420,
            ErrorKind::InvalidParameter => ErrorCode::E0305,
            ErrorKind::NotFound => ErrorCode::E0604,
            ErrorKind::IllegalTransition => ErrorCode::E1018,
            ErrorKind::Unsupported => ErrorCode::E0301,
            ErrorKind::ExecutionFailure => ErrorCode::E1001,
        }
    }
}

/// Errors surfaced by [`crate::BundleEngine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The list filter is malformed.
    #[error("E0420: invalid jobs filter [{filter}], {reason}")]
    InvalidFilter {
        /// Filter as supplied.
        filter: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A caller-supplied argument was rejected before reaching the executor.
    #[error("E0305: invalid parameter [{parameter}]: {reason}")]
    InvalidParameter {
        /// Parameter name.
        parameter: &'static str,
        /// Why it was refused.
        reason: String,
    },
    /// The executor refused the request payload.
    #[error("E0305: {operation} rejected: {source}")]
    Rejected {
        /// Operation that was attempted.
        operation: Operation,
        /// Target job, if any.
        job_id: Option<String>,
        /// Executor failure.
        #[source]
        source: CommandError,
    },
    /// The job does not exist.
    #[error("E0604: {operation} failed: {source}")]
    NotFound {
        /// Operation that was attempted.
        operation: Operation,
        /// Requested job id.
        job_id: Option<String>,
        /// Executor failure.
        #[source]
        source: CommandError,
    },
    /// The job's status does not permit the operation.
    #[error("E1018: {operation} failed: {source}")]
    IllegalTransition {
        /// Operation that was attempted.
        operation: Operation,
        /// Target job.
        job_id: Option<String>,
        /// Executor failure.
        #[source]
        source: CommandError,
    },
    /// The operation does not apply to bundle jobs.
    #[error("E0301: operation [{operation}] is not supported for bundle jobs")]
    Unsupported {
        /// Operation that was attempted.
        operation: Operation,
    },
    /// The executor failed while carrying out the operation.
    #[error("E1001: {operation} failed: {source}")]
    Execution {
        /// Operation that was attempted.
        operation: Operation,
        /// Target job, if any.
        job_id: Option<String>,
        /// Executor failure.
        #[source]
        source: CommandError,
    },
    /// The log store failed while streaming.
    #[error("E1001: log retrieval for job [{job_id}] failed: {source}")]
    LogStore {
        /// Job whose log was requested.
        job_id: String,
        /// Store failure.
        #[source]
        source: LogStoreError,
    },
    /// Writing to the caller's sink failed.
    #[error("E1001: writing log of job [{job_id}] failed: {source}")]
    Sink {
        /// Job whose log was being written.
        job_id: String,
        /// Sink failure.
        #[source]
        source: io::Error,
    },
    /// The job was created, but starting it failed.
    #[error("job [{job_id}] was submitted but not started: {source}")]
    SubmittedNotStarted {
        /// Id of the created job.
        job_id: String,
        /// Start failure.
        #[source]
        source: Box<EngineError>,
    },
}

/// Result alias for engine calls.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Classification of the failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidFilter { .. } => ErrorKind::InvalidFilter,
            EngineError::InvalidParameter { .. } | EngineError::Rejected { .. } => {
                ErrorKind::InvalidParameter
            }
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            EngineError::Unsupported { .. } => ErrorKind::Unsupported,
            EngineError::Execution { .. }
            | EngineError::LogStore { .. }
            | EngineError::Sink { .. } => ErrorKind::ExecutionFailure,
            EngineError::SubmittedNotStarted { source, .. } => source.kind(),
        }
    }

    /// Stable code for the failure.
    pub fn code(&self) -> ErrorCode {
        self.kind().code()
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Never true for [`EngineError::SubmittedNotStarted`]: repeating the submit
    /// would create another job. Retry `start` with [`Self::submitted_job_id`].
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::SubmittedNotStarted { .. } => false,
            _ => self.kind() == ErrorKind::ExecutionFailure,
        }
    }

    /// Job the failure relates to, when known.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            EngineError::Rejected { job_id, .. }
            | EngineError::NotFound { job_id, .. }
            | EngineError::IllegalTransition { job_id, .. }
            | EngineError::Execution { job_id, .. } => job_id.as_deref(),
            EngineError::LogStore { job_id, .. }
            | EngineError::Sink { job_id, .. }
            | EngineError::SubmittedNotStarted { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    /// Id of a job that was created even though the call failed.
    pub fn submitted_job_id(&self) -> Option<&str> {
        match self {
            EngineError::SubmittedNotStarted { job_id, .. } => Some(job_id),
            _ => None,
        }
    }
}

/// Map an executor failure onto the engine's error taxonomy.
pub fn translate(operation: Operation, job_id: Option<&str>, err: CommandError) -> EngineError {
    let job_id = job_id.map(str::to_owned);
    match err {
        CommandError::NotFound { .. } => EngineError::NotFound {
            operation,
            job_id,
            source: err,
        },
        CommandError::IllegalTransition { .. } => EngineError::IllegalTransition {
            operation,
            job_id,
            source: err,
        },
        CommandError::InvalidDefinition(_)
        | CommandError::InvalidChange { .. }
        | CommandError::InvalidRerunScope(_) => EngineError::Rejected {
            operation,
            job_id,
            source: err,
        },
        CommandError::Unavailable(_) | CommandError::Storage(_) | CommandError::Io(_) => {
            EngineError::Execution {
                operation,
                job_id,
                source: err,
            }
        }
    }
}
