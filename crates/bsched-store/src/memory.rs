//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Reference job store and log journal."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! In-memory command executor.
//!
//! Every operation runs under the table's write lock and either commits one
//! change or none. When a state file is configured the table is snapshotted
//! after each change; a failed snapshot rolls the change back.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bsched_engine::{
    BundleJob, BundleJobPage, CommandError, CommandExecutor, CommandResult, Filter, JobDefinition,
    JobStatus, LogLevel, LogLine, Operation, RerunRequest, SubmitRequest,
};
use bsched_logging::{bsched_debug, bsched_error, bsched_info, bsched_warn, LogContext};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::journal::JournalWriter;
use crate::snapshot::{load_snapshot, save_snapshot, JobTable};
use crate::Result;

const SYSTEM_USER: &str = "system";
const USER_PROPERTY: &str = "user.name";

#[derive(Debug, Default)]
struct JobState {
    jobs: IndexMap<String, BundleJob>,
    sequence: u64,
}

impl JobState {
    fn from_table(table: JobTable) -> Self {
        Self {
            jobs: table
                .jobs
                .into_iter()
                .map(|job| (job.id.clone(), job))
                .collect(),
            sequence: table.sequence,
        }
    }

    fn to_table(&self) -> JobTable {
        JobTable {
            sequence: self.sequence,
            jobs: self.jobs.values().cloned().collect(),
        }
    }
}

/// Reference [`CommandExecutor`] keeping bundle jobs in memory.
#[derive(Debug, Default)]
pub struct InMemoryExecutor {
    state: RwLock<JobState>,
    state_file: Option<PathBuf>,
    journal: Option<Mutex<JournalWriter>>,
}

impl InMemoryExecutor {
    /// Empty executor without persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor persisted to `state_file`, reloading it when present.
    pub fn open(state_file: impl Into<PathBuf>) -> Result<Self> {
        let state_file = state_file.into();
        let state = if state_file.exists() {
            let table = load_snapshot(&state_file)?;
            bsched_debug!(
                "loaded {} jobs from snapshot {}",
                table.jobs.len(),
                state_file.display()
            );
            JobState::from_table(table)
        } else {
            JobState::default()
        };
        Ok(Self {
            state: RwLock::new(state),
            state_file: Some(state_file),
            journal: None,
        })
    }

    /// Journal job log lines to `writer`.
    pub fn with_journal(mut self, writer: JournalWriter) -> Self {
        self.journal = Some(Mutex::new(writer));
        self
    }

    /// Snapshot file, when persistence is enabled.
    pub fn state_file(&self) -> Option<&Path> {
        self.state_file.as_deref()
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.state.read().jobs.len()
    }

    /// Whether no job has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, state: &JobState) -> CommandResult<()> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };
        save_snapshot(&state.to_table(), path).map_err(|err| {
            bsched_error!(
                "job snapshot {} not written, change rolled back: {}",
                path.display(),
                err
            );
            CommandError::from(err)
        })
    }

    fn journal(&self, level: LogLevel, job_id: &str, message: String) {
        let Some(journal) = &self.journal else {
            return;
        };
        let line = LogLine::now(level, job_id, message);
        if let Err(err) = journal.lock().append(&line) {
            let context = LogContext::new().with_job(job_id).with_operation("journal");
            bsched_warn!(context = context, "failed to journal job log line: {}", err);
        }
    }

    /// Apply `update` to one job and commit it, restoring the previous job on failure.
    fn update(
        &self,
        job_id: &str,
        update: impl FnOnce(&mut BundleJob) -> CommandResult<String>,
    ) -> CommandResult<()> {
        let mut state = self.state.write();
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| CommandError::NotFound {
                job_id: job_id.to_owned(),
            })?;
        let previous = job.clone();
        let message = match update(job) {
            Ok(message) => message,
            Err(err) => {
                *job = previous;
                return Err(err);
            }
        };
        job.last_modified = Utc::now();

        if let Err(err) = self.persist(&state) {
            state.jobs.insert(job_id.to_owned(), previous);
            return Err(err);
        }
        drop(state);

        self.journal(LogLevel::Info, job_id, message);
        Ok(())
    }

    fn transition(
        &self,
        job_id: &str,
        operation: Operation,
        next: fn(JobStatus) -> Option<JobStatus>,
    ) -> CommandResult<()> {
        self.update(job_id, |job| {
            let from = job.status;
            let to = next(from).ok_or_else(|| CommandError::IllegalTransition {
                job_id: job.id.clone(),
                operation,
                status: from,
            })?;
            job.status = to;
            let context = LogContext::new()
                .with_job(&job.id)
                .with_operation(operation.as_str());
            bsched_info!(context = context, "bundle status changed {} -> {}", from, to);
            Ok(format!("{operation}: status {from} -> {to}"))
        })
    }
}

fn validate_definition(definition: &JobDefinition) -> CommandResult<()> {
    if definition.name.trim().is_empty() {
        return Err(CommandError::InvalidDefinition(
            "bundle name must not be blank".to_owned(),
        ));
    }
    if definition.definition.trim().is_empty() {
        return Err(CommandError::InvalidDefinition(
            "definition text must not be blank".to_owned(),
        ));
    }
    let mut seen = HashSet::new();
    for coordinator in &definition.coordinators {
        if coordinator.trim().is_empty() {
            return Err(CommandError::InvalidDefinition(
                "coordinator names must not be blank".to_owned(),
            ));
        }
        if !seen.insert(coordinator.as_str()) {
            return Err(CommandError::InvalidDefinition(format!(
                "coordinator [{coordinator}] is declared more than once"
            )));
        }
    }
    Ok(())
}

fn format_job_id(sequence: u64, at: DateTime<Utc>) -> String {
    format!("{:07}-{}-bsched-B", sequence, at.format("%Y%m%d%H%M%S%3f"))
}

fn start_status(status: JobStatus) -> Option<JobStatus> {
    match status {
        JobStatus::Prep => Some(JobStatus::Running),
        _ => None,
    }
}

fn suspend_status(status: JobStatus) -> Option<JobStatus> {
    match status {
        JobStatus::Prep | JobStatus::PrepPaused => Some(JobStatus::PrepSuspended),
        JobStatus::Running | JobStatus::Paused => Some(JobStatus::Suspended),
        _ => None,
    }
}

fn resume_status(status: JobStatus) -> Option<JobStatus> {
    match status {
        JobStatus::PrepSuspended => Some(JobStatus::Prep),
        JobStatus::Suspended => Some(JobStatus::Running),
        _ => None,
    }
}

fn kill_status(status: JobStatus) -> Option<JobStatus> {
    (!status.is_terminal()).then_some(JobStatus::Killed)
}

fn rerun_status(status: JobStatus) -> Option<JobStatus> {
    match status {
        JobStatus::Running
        | JobStatus::Suspended
        | JobStatus::Paused
        | JobStatus::Succeeded
        | JobStatus::DoneWithError => Some(JobStatus::Running),
        _ => None,
    }
}

#[derive(Debug, Default, PartialEq)]
struct TimeChange {
    end_time: Option<DateTime<Utc>>,
    pause_time: Option<Option<DateTime<Utc>>>,
}

fn parse_change(change: &str) -> CommandResult<TimeChange> {
    let invalid = |reason: String| CommandError::InvalidChange {
        value: change.to_owned(),
        reason,
    };
    let mut parsed = TimeChange::default();
    for pair in change.split(';').filter(|pair| !pair.trim().is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| invalid(format!("[{pair}] is not a key=value pair")))?;
        let (key, value) = (key.trim(), value.trim());
        match key {
            "endtime" => {
                let at = parse_time(value).map_err(invalid)?;
                parsed.end_time = Some(at);
            }
            "pausetime" if value.is_empty() => parsed.pause_time = Some(None),
            "pausetime" => {
                let at = parse_time(value).map_err(invalid)?;
                parsed.pause_time = Some(Some(at));
            }
            other => {
                return Err(invalid(format!(
                    "unknown key [{other}], expected endtime or pausetime"
                )))
            }
        }
    }
    if parsed == TimeChange::default() {
        return Err(invalid("no change requested".to_owned()));
    }
    Ok(parsed)
}

fn parse_time(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| format!("[{value}] is not an RFC 3339 timestamp: {err}"))
}

impl CommandExecutor for InMemoryExecutor {
    fn submit(&self, request: SubmitRequest) -> CommandResult<String> {
        validate_definition(&request.definition)?;
        if request.dry_run {
            let context = LogContext::new().with_operation(Operation::DryRun.as_str());
            bsched_debug!(
                context = context,
                "bundle definition [{}] validated",
                request.definition.name
            );
            return Ok("OK".to_owned());
        }

        let SubmitRequest {
            definition, user, ..
        } = request;
        let user = user
            .or_else(|| definition.properties.get(USER_PROPERTY).cloned())
            .unwrap_or_else(|| SYSTEM_USER.to_owned());

        let mut state = self.state.write();
        let now = Utc::now();
        state.sequence += 1;
        let id = format_job_id(state.sequence, now);
        let job = BundleJob {
            id: id.clone(),
            user,
            name: definition.name,
            group: definition.group,
            status: JobStatus::Prep,
            created_at: now,
            last_modified: now,
            end_time: None,
            pause_time: None,
            coordinators: definition.coordinators,
            definition: definition.definition,
        };
        let message = format!("bundle [{}] submitted by {}", job.name, job.user);
        state.jobs.insert(id.clone(), job);

        if let Err(err) = self.persist(&state) {
            state.jobs.shift_remove(&id);
            state.sequence -= 1;
            return Err(err);
        }
        drop(state);

        let context = LogContext::new()
            .with_job(&id)
            .with_operation(Operation::Submit.as_str());
        bsched_info!(context = context, "bundle submitted");
        self.journal(LogLevel::Info, &id, message);
        Ok(id)
    }

    fn start(&self, job_id: &str) -> CommandResult<()> {
        self.transition(job_id, Operation::Start, start_status)
    }

    fn suspend(&self, job_id: &str) -> CommandResult<()> {
        self.transition(job_id, Operation::Suspend, suspend_status)
    }

    fn resume(&self, job_id: &str) -> CommandResult<()> {
        self.transition(job_id, Operation::Resume, resume_status)
    }

    fn kill(&self, job_id: &str) -> CommandResult<()> {
        self.transition(job_id, Operation::Kill, kill_status)
    }

    fn change(&self, job_id: &str, change: &str) -> CommandResult<()> {
        let parsed = parse_change(change)?;
        self.update(job_id, |job| {
            if job.status.is_terminal() {
                return Err(CommandError::IllegalTransition {
                    job_id: job.id.clone(),
                    operation: Operation::Change,
                    status: job.status,
                });
            }
            let end_time = parsed.end_time.or(job.end_time);
            let pause_time = parsed.pause_time.unwrap_or(job.pause_time);
            if let (Some(end), Some(pause)) = (end_time, pause_time) {
                if pause > end {
                    return Err(CommandError::InvalidChange {
                        value: change.to_owned(),
                        reason: "pausetime must not be after endtime".to_owned(),
                    });
                }
            }
            job.end_time = end_time;
            job.pause_time = pause_time;
            Ok(format!("change applied: {change}"))
        })
    }

    fn rerun(&self, request: &RerunRequest) -> CommandResult<()> {
        self.update(&request.job_id, |job| {
            let from = job.status;
            let to = rerun_status(from).ok_or_else(|| CommandError::IllegalTransition {
                job_id: job.id.clone(),
                operation: Operation::Rerun,
                status: from,
            })?;
            for coordinator in request.coordinator_entries() {
                if !job.coordinators.iter().any(|declared| declared == coordinator) {
                    return Err(CommandError::InvalidRerunScope(format!(
                        "coordinator [{coordinator}] is not part of bundle [{}]",
                        job.id
                    )));
                }
            }
            if request.date_entries().iter().any(|entry| entry.is_empty()) {
                return Err(CommandError::InvalidRerunScope(
                    "date scope contains an empty entry".to_owned(),
                ));
            }
            job.status = to;
            Ok(format!(
                "rerun requested: coordinators [{}], dates [{}], refresh={}, nocleanup={}",
                request.coordinator_scope, request.date_scope, request.refresh, request.no_cleanup
            ))
        })
    }

    fn job(&self, job_id: &str) -> CommandResult<BundleJob> {
        self.state
            .read()
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| CommandError::NotFound {
                job_id: job_id.to_owned(),
            })
    }

    fn jobs(&self, filter: &Filter, start: usize, len: usize) -> CommandResult<BundleJobPage> {
        let state = self.state.read();
        let mut matching: Vec<&BundleJob> =
            state.jobs.values().filter(|job| filter.matches(job)).collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(BundleJobPage {
            total: matching.len(),
            jobs: matching
                .into_iter()
                .skip(start.saturating_sub(1))
                .take(len)
                .cloned()
                .collect(),
            start,
            len,
        })
    }
}
