//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Structured logging adapters for bundle lifecycle operations."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod macros;

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Bundle job identifier associated with the log event.
    pub job: Option<&'a str>,
    /// Lifecycle operation being performed (`submit`, `kill`, ...).
    pub operation: Option<&'a str>,
    /// User on whose behalf the operation runs.
    pub user: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a job identifier.
    pub fn with_job(mut self, job: &'a str) -> Self {
        self.job = Some(job);
        self
    }

    /// Attach an operation name.
    pub fn with_operation(mut self, operation: &'a str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Attach the acting user.
    pub fn with_user(mut self, user: &'a str) -> Self {
        self.user = Some(user);
        self
    }
}

/// Outcome attached to lifecycle operation events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The operation completed successfully.
    Success,
    /// The caller supplied something the engine refused (bad filter, unsupported call).
    Rejected,
    /// The delegated operation failed.
    Fault,
}

impl OperationOutcome {
    /// Stable label used in log fields and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationOutcome::Success => "success",
            OperationOutcome::Rejected => "rejected",
            OperationOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with its outcome.
pub fn log_operation_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: OperationOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    let job = ctx.job.unwrap_or("");
    let operation = ctx.operation.unwrap_or("");
    let user = ctx.user.unwrap_or("");
    let label = outcome.as_str();
    // `tracing` callsites need a constant level.
    match outcome {
        OperationOutcome::Success => tracing::info!(
            event = %event,
            outcome = label,
            job = job,
            operation = operation,
            user = user,
            message = %message
        ),
        OperationOutcome::Rejected => tracing::warn!(
            event = %event,
            outcome = label,
            job = job,
            operation = operation,
            user = user,
            message = %message
        ),
        OperationOutcome::Fault => tracing::error!(
            event = %event,
            outcome = label,
            job = job,
            operation = operation,
            user = user,
            message = %message
        ),
    }
}
