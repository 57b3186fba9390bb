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

use thiserror::Error;

use crate::filter::Filter;
use crate::job::{BundleJob, BundleJobPage, RerunRequest, SubmitRequest};
use crate::status::JobStatus;

/// Named units of work the engine exposes. Used for error context, logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create a bundle job.
    Submit,
    /// Validate a definition without creating a job.
    DryRun,
    /// Start a prepared job.
    Start,
    /// Suspend a job.
    Suspend,
    /// Resume a suspended job.
    Resume,
    /// Kill a job.
    Kill,
    /// Change end/pause time of a job.
    Change,
    /// Rerun coordinator actions of a job.
    Rerun,
    /// Fetch a job snapshot.
    Info,
    /// Fetch the submitted definition.
    Definition,
    /// List jobs.
    Jobs,
    /// Stream historical log lines.
    Log,
    /// Fetch a workflow job (other job kind).
    WorkflowJob,
    /// Fetch a coordinator job (other job kind).
    CoordinatorJob,
    /// Legacy rerun driven by a bare configuration.
    ConfigRerun,
}

impl Operation {
    /// Stable name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Submit => "submit",
            Operation::DryRun => "dryrun",
            Operation::Start => "start",
            Operation::Suspend => "suspend",
            Operation::Resume => "resume",
            Operation::Kill => "kill",
            Operation::Change => "change",
            Operation::Rerun => "rerun",
            Operation::Info => "info",
            Operation::Definition => "definition",
            Operation::Jobs => "jobs",
            Operation::Log => "log",
            Operation::WorkflowJob => "workflow-job",
            Operation::CoordinatorJob => "coordinator-job",
            Operation::ConfigRerun => "rerun-config",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures reported by a command executor.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No job with the given id exists.
    #[error("job [{job_id}] does not exist")]
    NotFound {
        /// Requested job id.
        job_id: String,
    },
    /// The operation is not valid from the job's current status.
    #[error("cannot {operation} job [{job_id}] in status {status}")]
    IllegalTransition {
        /// Target job.
        job_id: String,
        /// Attempted operation.
        operation: Operation,
        /// Status the job was in.
        status: JobStatus,
    },
    /// The submitted definition is not acceptable.
    #[error("invalid bundle definition: {0}")]
    InvalidDefinition(String),
    /// The change request could not be applied.
    #[error("invalid change value [{value}]: {reason}")]
    InvalidChange {
        /// Change request as supplied.
        value: String,
        /// Why it was refused.
        reason: String,
    },
    /// A rerun scope entry is malformed or unknown.
    #[error("invalid rerun scope: {0}")]
    InvalidRerunScope(String),
    /// The backing store cannot serve requests right now.
    #[error("job store unavailable: {0}")]
    Unavailable(String),
    /// The backing store failed while reading or writing job state.
    #[error("storage error: {0}")]
    Storage(String),
    /// I/O failure inside the executor.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for executor calls.
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Performs lifecycle operations against persisted bundle state.
///
/// Every method is one atomic unit of work: it either applies exactly one
/// externally visible change or none. Concurrent calls against the same job
/// must be serialized or rejected by the implementation.
pub trait CommandExecutor: Send + Sync {
    /// Create a job (or validate only, for dry runs) and return its id.
    fn submit(&self, request: SubmitRequest) -> CommandResult<String>;

    /// Start a prepared job.
    fn start(&self, job_id: &str) -> CommandResult<()>;

    /// Suspend a job.
    fn suspend(&self, job_id: &str) -> CommandResult<()>;

    /// Resume a suspended job.
    fn resume(&self, job_id: &str) -> CommandResult<()>;

    /// Kill a job.
    fn kill(&self, job_id: &str) -> CommandResult<()>;

    /// Apply an opaque `key=value[;key=value]` change request.
    fn change(&self, job_id: &str, change: &str) -> CommandResult<()>;

    /// Rerun coordinator actions within the requested scope.
    fn rerun(&self, request: &RerunRequest) -> CommandResult<()>;

    /// Fetch a job snapshot.
    fn job(&self, job_id: &str) -> CommandResult<BundleJob>;

    /// List jobs matching `filter`, returning the 1-based page `[start, start + len)`.
    fn jobs(&self, filter: &Filter, start: usize, len: usize) -> CommandResult<BundleJobPage>;
}
