//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Bundle lifecycle facade and query contract."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Lifecycle control facade.
//!
//! The facade holds no job state. Each lifecycle call is forwarded as one unit
//! of work to the [`CommandExecutor`]; executor failures are mapped through
//! [`translate`]. Operations that belong to other job kinds fail with
//! [`ErrorKind::Unsupported`](crate::ErrorKind::Unsupported) without reaching
//! the executor.
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bsched_logging::{log_operation_event, LogContext, OperationOutcome};
use chrono::Utc;
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{translate, EngineError, ErrorKind, Result};
use crate::executor::{CommandExecutor, CommandResult, Operation};
use crate::filter::parse_filter;
use crate::job::{BundleJob, BundleJobPage, ForeignJob, JobDefinition, JobKind, RerunRequest, SubmitRequest};
use crate::log_store::{LogFilter, LogLine, LogStore};
use crate::metrics::EngineMetrics;

/// Call surface shared by the engines of every job kind.
///
/// Operations that do not apply to an engine's kind fail with
/// [`ErrorKind::Unsupported`].
pub trait JobEngine: Send + Sync {
    /// Kind of job this engine manages.
    fn kind(&self) -> JobKind;

    /// Submit a job; when `start` is set the job is started as a second operation.
    fn submit(&self, definition: JobDefinition, start: bool) -> Result<String>;

    /// Validate a submission without creating a job.
    fn dry_run_submit(&self, definition: JobDefinition, start: bool) -> Result<String>;

    /// Start a job.
    fn start(&self, job_id: &str) -> Result<()>;

    /// Suspend a job.
    fn suspend(&self, job_id: &str) -> Result<()>;

    /// Resume a job.
    fn resume(&self, job_id: &str) -> Result<()>;

    /// Kill a job.
    fn kill(&self, job_id: &str) -> Result<()>;

    /// Apply a `key=value[;key=value]` change request.
    fn change(&self, job_id: &str, change: &str) -> Result<()>;

    /// Original definition text of a job.
    fn get_definition(&self, job_id: &str) -> Result<String>;

    /// Write the job's historical log to `sink`, returning the number of lines written.
    fn stream_log(&self, job_id: &str, sink: &mut dyn Write) -> Result<u64>;

    /// Fetch a workflow job.
    fn get_workflow_job(&self, job_id: &str) -> Result<ForeignJob>;

    /// Fetch a workflow job restricted to an action range.
    fn get_workflow_job_range(&self, job_id: &str, start: usize, len: usize) -> Result<ForeignJob>;

    /// Fetch a coordinator job.
    fn get_coord_job(&self, job_id: &str) -> Result<ForeignJob>;

    /// Fetch a coordinator job restricted to an action range.
    fn get_coord_job_range(&self, job_id: &str, start: usize, len: usize) -> Result<ForeignJob>;

    /// Rerun a job from a bare property set.
    #[deprecated(note = "rerun with a scoped request instead")]
    fn rerun_with_config(&self, job_id: &str, properties: &IndexMap<String, String>) -> Result<()>;

    /// Resolve an external id to a job id.
    fn job_id_for_external_id(&self, external_id: &str) -> Result<Option<String>>;
}

/// Lifecycle facade for bundle jobs.
#[derive(Clone)]
pub struct BundleEngine {
    user: Option<String>,
    auth_token: Option<String>,
    executor: Arc<dyn CommandExecutor>,
    log_store: Arc<dyn LogStore>,
    metrics: Option<EngineMetrics>,
}

impl fmt::Debug for BundleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleEngine")
            .field("user", &self.user)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl BundleEngine {
    /// Engine acting on behalf of the system, with no user or token.
    pub fn system(executor: Arc<dyn CommandExecutor>, log_store: Arc<dyn LogStore>) -> Self {
        Self {
            user: None,
            auth_token: None,
            executor,
            log_store,
            metrics: None,
        }
    }

    /// Engine acting on behalf of `user`. Both `user` and `auth_token` must be non-blank.
    pub fn for_user(
        user: impl Into<String>,
        auth_token: impl Into<String>,
        executor: Arc<dyn CommandExecutor>,
        log_store: Arc<dyn LogStore>,
    ) -> Result<Self> {
        let user = user.into();
        let auth_token = auth_token.into();
        if user.trim().is_empty() {
            return Err(blank("user"));
        }
        if auth_token.trim().is_empty() {
            return Err(blank("auth_token"));
        }
        Ok(Self {
            user: Some(user),
            auth_token: Some(auth_token),
            ..Self::system(executor, log_store)
        })
    }

    /// Publish operation metrics to `metrics`.
    pub fn with_metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// User the engine acts for, if any.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Rerun coordinator actions of a bundle within the requested scope.
    pub fn rerun(&self, request: RerunRequest) -> Result<()> {
        let job_id = request.job_id.as_str();
        self.observe(Operation::Rerun, Some(job_id), || {
            require_job_id(job_id)?;
            self.delegate(Operation::Rerun, Some(job_id), |executor| executor.rerun(&request))
        })
    }

    /// Snapshot of a bundle job.
    pub fn get_job(&self, job_id: &str) -> Result<BundleJob> {
        self.observe(Operation::Info, Some(job_id), || {
            require_job_id(job_id)?;
            self.delegate(Operation::Info, Some(job_id), |executor| executor.job(job_id))
        })
    }

    /// List bundle jobs matching `filter`, returning the 1-based page `[start, start + len)`.
    pub fn list_jobs(&self, filter: Option<&str>, start: usize, len: usize) -> Result<BundleJobPage> {
        self.observe(Operation::Jobs, None, || {
            let filter = parse_filter(filter)?;
            if start < 1 {
                return Err(EngineError::InvalidParameter {
                    parameter: "start",
                    reason: format!("must be at least 1, got {}", start),
                });
            }
            if len < 1 {
                return Err(EngineError::InvalidParameter {
                    parameter: "len",
                    reason: format!("must be at least 1, got {}", len),
                });
            }
            self.delegate(Operation::Jobs, None, |executor| {
                executor.jobs(&filter, start, len)
            })
        })
    }

    /// Lazily stream the job's log lines from its creation until now.
    ///
    /// The iterator is finite and cannot be restarted.
    pub fn log_lines(&self, job_id: &str) -> Result<impl Iterator<Item = Result<LogLine>> + '_> {
        self.observe(Operation::Log, Some(job_id), || self.open_log(job_id))
    }

    fn open_log(&self, job_id: &str) -> Result<impl Iterator<Item = Result<LogLine>> + '_> {
        require_job_id(job_id)?;
        let job = self.delegate(Operation::Log, Some(job_id), |executor| executor.job(job_id))?;
        let owner = job.id.clone();
        let stream = self
            .log_store
            .stream(&LogFilter::for_job(job.id.as_str()), job.created_at, Utc::now())
            .map_err(|source| EngineError::LogStore {
                job_id: job.id,
                source,
            })?;
        Ok(stream.map(move |line| {
            line.map_err(|source| EngineError::LogStore {
                job_id: owner.clone(),
                source,
            })
        }))
    }

    fn request(&self, definition: JobDefinition, dry_run: bool) -> SubmitRequest {
        SubmitRequest {
            definition,
            user: self.user.clone(),
            auth_token: self.auth_token.clone(),
            dry_run,
        }
    }

    fn delegate<T>(
        &self,
        operation: Operation,
        job_id: Option<&str>,
        call: impl FnOnce(&dyn CommandExecutor) -> CommandResult<T>,
    ) -> Result<T> {
        debug!(
            operation = %operation,
            job_id = job_id.unwrap_or(""),
            "dispatching to command executor"
        );
        call(self.executor.as_ref()).map_err(|err| translate(operation, job_id, err))
    }

    fn observe<T>(
        &self,
        operation: Operation,
        job_id: Option<&str>,
        body: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let started = Instant::now();
        let result = body();
        self.record(operation, job_id, started.elapsed(), result.as_ref().err());
        result
    }

    fn record(
        &self,
        operation: Operation,
        job_id: Option<&str>,
        elapsed: Duration,
        error: Option<&EngineError>,
    ) {
        let outcome = match error {
            None => OperationOutcome::Success,
            Some(err) if err.kind() == ErrorKind::ExecutionFailure => OperationOutcome::Fault,
            Some(_) => OperationOutcome::Rejected,
        };
        if let Some(metrics) = &self.metrics {
            metrics.record(operation, outcome, elapsed.as_secs_f64());
        }

        let mut context = LogContext::new().with_operation(operation.as_str());
        if let Some(job_id) = job_id.filter(|id| !id.is_empty()) {
            context = context.with_job(job_id);
        }
        if let Some(user) = self.user.as_deref() {
            context = context.with_user(user);
        }
        let event = format!("bundle.{}", operation);
        match error {
            None => log_operation_event(Some(&context), &event, "completed", outcome),
            Some(err) => log_operation_event(Some(&context), &event, &err.to_string(), outcome),
        }
    }

    fn unsupported<T>(&self, operation: Operation, job_id: &str) -> Result<T> {
        self.observe(operation, Some(job_id), || {
            Err(EngineError::Unsupported { operation })
        })
    }
}

impl JobEngine for BundleEngine {
    fn kind(&self) -> JobKind {
        JobKind::Bundle
    }

    fn submit(&self, definition: JobDefinition, start: bool) -> Result<String> {
        let job_id = self.observe(Operation::Submit, None, || {
            self.delegate(Operation::Submit, None, |executor| {
                executor.submit(self.request(definition, false))
            })
        })?;
        if start {
            self.start(&job_id)
                .map_err(|err| EngineError::SubmittedNotStarted {
                    job_id: job_id.clone(),
                    source: Box::new(err),
                })?;
        }
        Ok(job_id)
    }

    fn dry_run_submit(&self, definition: JobDefinition, _start: bool) -> Result<String> {
        self.observe(Operation::DryRun, None, || {
            self.delegate(Operation::DryRun, None, |executor| {
                executor.submit(self.request(definition, true))
            })
        })
    }

    fn start(&self, job_id: &str) -> Result<()> {
        self.observe(Operation::Start, Some(job_id), || {
            require_job_id(job_id)?;
            self.delegate(Operation::Start, Some(job_id), |executor| executor.start(job_id))
        })
    }

    fn suspend(&self, job_id: &str) -> Result<()> {
        self.observe(Operation::Suspend, Some(job_id), || {
            require_job_id(job_id)?;
            self.delegate(Operation::Suspend, Some(job_id), |executor| executor.suspend(job_id))
        })
    }

    fn resume(&self, job_id: &str) -> Result<()> {
        self.observe(Operation::Resume, Some(job_id), || {
            require_job_id(job_id)?;
            self.delegate(Operation::Resume, Some(job_id), |executor| executor.resume(job_id))
        })
    }

    fn kill(&self, job_id: &str) -> Result<()> {
        self.observe(Operation::Kill, Some(job_id), || {
            require_job_id(job_id)?;
            self.delegate(Operation::Kill, Some(job_id), |executor| executor.kill(job_id))
        })
    }

    fn change(&self, job_id: &str, change: &str) -> Result<()> {
        self.observe(Operation::Change, Some(job_id), || {
            require_job_id(job_id)?;
            if change.trim().is_empty() {
                return Err(blank("change"));
            }
            self.delegate(Operation::Change, Some(job_id), |executor| {
                executor.change(job_id, change)
            })
        })
    }

    fn get_definition(&self, job_id: &str) -> Result<String> {
        self.observe(Operation::Definition, Some(job_id), || {
            require_job_id(job_id)?;
            self.delegate(Operation::Definition, Some(job_id), |executor| {
                executor.job(job_id).map(|job| job.definition)
            })
        })
    }

    fn stream_log(&self, job_id: &str, sink: &mut dyn Write) -> Result<u64> {
        self.observe(Operation::Log, Some(job_id), || {
            let sink_error = |source| EngineError::Sink {
                job_id: job_id.to_owned(),
                source,
            };
            let mut written = 0u64;
            for line in self.open_log(job_id)? {
                writeln!(sink, "{}", line?).map_err(sink_error)?;
                written += 1;
            }
            sink.flush().map_err(sink_error)?;
            if let Some(metrics) = &self.metrics {
                metrics.record_log_lines(written);
            }
            Ok(written)
        })
    }

    fn get_workflow_job(&self, job_id: &str) -> Result<ForeignJob> {
        self.unsupported(Operation::WorkflowJob, job_id)
    }

    fn get_workflow_job_range(&self, job_id: &str, _start: usize, _len: usize) -> Result<ForeignJob> {
        self.unsupported(Operation::WorkflowJob, job_id)
    }

    fn get_coord_job(&self, job_id: &str) -> Result<ForeignJob> {
        self.unsupported(Operation::CoordinatorJob, job_id)
    }

    fn get_coord_job_range(&self, job_id: &str, _start: usize, _len: usize) -> Result<ForeignJob> {
        self.unsupported(Operation::CoordinatorJob, job_id)
    }

    fn rerun_with_config(&self, job_id: &str, _properties: &IndexMap<String, String>) -> Result<()> {
        self.unsupported(Operation::ConfigRerun, job_id)
    }

    fn job_id_for_external_id(&self, external_id: &str) -> Result<Option<String>> {
        debug!(external_id, "bundle jobs carry no external ids");
        Ok(None)
    }
}

fn require_job_id(job_id: &str) -> Result<()> {
    if job_id.trim().is_empty() {
        return Err(blank("job_id"));
    }
    Ok(())
}

fn blank(parameter: &'static str) -> EngineError {
    EngineError::InvalidParameter {
        parameter,
        reason: "must not be blank".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::executor::CommandError;
    use crate::filter::Filter;
    use crate::log_store::{LogLevel, LogStoreError, LogStream};
    use crate::status::JobStatus;
    use chrono::{DateTime, Duration as ChronoDuration};
    use parking_lot::Mutex;
    use prometheus::Registry;
    use std::io;

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<String>>,
        jobs: Mutex<Vec<BundleJob>>,
        submits: Mutex<Vec<SubmitRequest>>,
        refuse_start: bool,
    }

    impl RecordingExecutor {
        fn with_jobs(count: usize) -> Self {
            let executor = Self::default();
            {
                let mut jobs = executor.jobs.lock();
                for n in 0..count {
                    jobs.push(job(&format!("job-{n}"), "alice", JobStatus::Running));
                }
            }
            executor
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn note(&self, call: &str) {
            self.calls.lock().push(call.to_owned());
        }

        fn find(&self, job_id: &str) -> CommandResult<BundleJob> {
            self.jobs
                .lock()
                .iter()
                .find(|job| job.id == job_id)
                .cloned()
                .ok_or_else(|| CommandError::NotFound {
                    job_id: job_id.to_owned(),
                })
        }
    }

    impl CommandExecutor for RecordingExecutor {
        fn submit(&self, request: SubmitRequest) -> CommandResult<String> {
            self.note("submit");
            let dry_run = request.dry_run;
            self.submits.lock().push(request);
            if dry_run {
                return Ok("OK".to_owned());
            }
            let id = format!("job-{}", self.jobs.lock().len());
            self.jobs.lock().push(job(&id, "alice", JobStatus::Prep));
            Ok(id)
        }

        fn start(&self, job_id: &str) -> CommandResult<()> {
            self.note("start");
            if self.refuse_start {
                return Err(CommandError::Unavailable("executor draining".into()));
            }
            self.find(job_id).map(|_| ())
        }

        fn suspend(&self, job_id: &str) -> CommandResult<()> {
            self.note("suspend");
            let job = self.find(job_id)?;
            if job.status.is_terminal() {
                return Err(CommandError::IllegalTransition {
                    job_id: job_id.to_owned(),
                    operation: Operation::Suspend,
                    status: job.status,
                });
            }
            Ok(())
        }

        fn resume(&self, job_id: &str) -> CommandResult<()> {
            self.note("resume");
            self.find(job_id).map(|_| ())
        }

        fn kill(&self, job_id: &str) -> CommandResult<()> {
            self.note("kill");
            self.find(job_id).map(|_| ())
        }

        fn change(&self, job_id: &str, change: &str) -> CommandResult<()> {
            self.note("change");
            self.find(job_id)?;
            if !change.starts_with("endtime=") {
                return Err(CommandError::InvalidChange {
                    value: change.to_owned(),
                    reason: "unknown key".into(),
                });
            }
            Ok(())
        }

        fn rerun(&self, request: &RerunRequest) -> CommandResult<()> {
            self.note("rerun");
            self.find(&request.job_id).map(|_| ())
        }

        fn job(&self, job_id: &str) -> CommandResult<BundleJob> {
            self.note("job");
            self.find(job_id)
        }

        fn jobs(&self, filter: &Filter, start: usize, len: usize) -> CommandResult<BundleJobPage> {
            self.note("jobs");
            let matching: Vec<_> = self
                .jobs
                .lock()
                .iter()
                .filter(|job| filter.matches(job))
                .cloned()
                .collect();
            Ok(BundleJobPage {
                total: matching.len(),
                jobs: matching.into_iter().skip(start - 1).take(len).collect(),
                start,
                len,
            })
        }
    }

    #[derive(Default)]
    struct VecLogStore {
        lines: Vec<LogLine>,
        windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    }

    impl LogStore for VecLogStore {
        fn stream(
            &self,
            filter: &LogFilter,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> std::result::Result<LogStream<'_>, LogStoreError> {
            self.windows.lock().push((from, to));
            let filter = filter.clone();
            Ok(Box::new(
                self.lines
                    .iter()
                    .filter(move |line| filter.matches(line))
                    .filter(move |line| line.timestamp >= from && line.timestamp <= to)
                    .cloned()
                    .map(Ok),
            ))
        }
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn job(id: &str, user: &str, status: JobStatus) -> BundleJob {
        let created = Utc::now() - ChronoDuration::hours(1);
        BundleJob {
            id: id.to_owned(),
            user: user.to_owned(),
            name: format!("bundle-{id}"),
            group: None,
            status,
            created_at: created,
            last_modified: created,
            end_time: None,
            pause_time: None,
            coordinators: vec!["ingest".into()],
            definition: format!("<bundle-app name='{id}'/>"),
        }
    }

    fn engine(executor: Arc<RecordingExecutor>) -> BundleEngine {
        BundleEngine::system(executor, Arc::new(VecLogStore::default()))
    }

    #[test]
    fn list_with_empty_filter_returns_everything() {
        let executor = Arc::new(RecordingExecutor::with_jobs(5));
        let page = engine(executor).list_jobs(Some(""), 1, 20).unwrap();
        assert_eq!(page.jobs.len(), 5);
        assert_eq!(page.total, 5);
        assert!(!page.has_more());
    }

    #[test]
    fn list_rejects_bad_filter_before_delegating() {
        let executor = Arc::new(RecordingExecutor::with_jobs(2));
        let err = engine(executor.clone())
            .list_jobs(Some("foo=bar"), 1, 20)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilter);
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn list_rejects_zero_paging() {
        let executor = Arc::new(RecordingExecutor::with_jobs(2));
        let engine = engine(executor.clone());
        assert_eq!(
            engine.list_jobs(None, 0, 20).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            engine.list_jobs(None, 1, 0).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn cross_kind_calls_never_reach_the_executor() {
        let executor = Arc::new(RecordingExecutor::with_jobs(1));
        let engine = engine(executor.clone());
        for _ in 0..3 {
            let err = engine.get_coord_job("anyId").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unsupported);
            assert_eq!(err.code(), ErrorCode::E0301);
        }
        assert!(engine.get_coord_job_range("anyId", 1, 10).is_err());
        assert!(engine.get_workflow_job("anyId").is_err());
        assert!(engine.get_workflow_job_range("anyId", 1, 10).is_err());
        #[allow(deprecated)]
        let err = engine
            .rerun_with_config("job-0", &IndexMap::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn submit_with_start_runs_two_operations() {
        let executor = Arc::new(RecordingExecutor::default());
        let id = engine(executor.clone())
            .submit(JobDefinition::new("daily", "<bundle-app/>"), true)
            .unwrap();
        assert_eq!(id, "job-0");
        assert_eq!(executor.calls(), vec!["submit", "start"]);
    }

    #[test]
    fn failed_start_after_submit_reports_the_new_job() {
        let executor = Arc::new(RecordingExecutor {
            refuse_start: true,
            ..RecordingExecutor::default()
        });
        let err = engine(executor)
            .submit(JobDefinition::new("daily", "<bundle-app/>"), true)
            .unwrap_err();
        assert_eq!(err.submitted_job_id(), Some("job-0"));
        assert_eq!(err.kind(), ErrorKind::ExecutionFailure);
    }

    #[test]
    fn retrying_while_retryable_creates_one_job() {
        let executor = Arc::new(RecordingExecutor {
            refuse_start: true,
            ..RecordingExecutor::default()
        });
        let engine = engine(executor.clone());
        let mut attempts = 0;
        let err = loop {
            attempts += 1;
            match engine.submit(JobDefinition::new("daily", "<bundle-app/>"), true) {
                Err(err) if err.is_retryable() && attempts < 3 => continue,
                Err(err) => break err,
                Ok(id) => panic!("unexpected success {id}"),
            }
        };
        assert_eq!(attempts, 1);
        assert!(!err.is_retryable());
        assert_eq!(executor.jobs.lock().len(), 1);

        let job_id = err.submitted_job_id().unwrap();
        let start_err = engine.start(job_id).unwrap_err();
        assert!(start_err.is_retryable());
        assert_eq!(executor.jobs.lock().len(), 1);
    }

    #[test]
    fn dry_run_marks_request_and_forwards_user() {
        let executor = Arc::new(RecordingExecutor::default());
        let engine = BundleEngine::for_user(
            "alice",
            "token-1",
            executor.clone(),
            Arc::new(VecLogStore::default()),
        )
        .unwrap();
        let result = engine
            .dry_run_submit(JobDefinition::new("daily", "<bundle-app/>"), true)
            .unwrap();
        assert_eq!(result, "OK");
        let submits = executor.submits.lock();
        assert!(submits[0].dry_run);
        assert_eq!(submits[0].user.as_deref(), Some("alice"));
        assert_eq!(submits[0].auth_token.as_deref(), Some("token-1"));
        assert_eq!(executor.calls(), vec!["submit"]);
    }

    #[test]
    fn user_engine_requires_credentials() {
        let executor = Arc::new(RecordingExecutor::default());
        let store = Arc::new(VecLogStore::default());
        let err = BundleEngine::for_user("", "token", executor.clone(), store.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        let err = BundleEngine::for_user("alice", " ", executor, store).unwrap_err();
        assert!(err.to_string().contains("auth_token"));
    }

    #[test]
    fn blank_job_ids_are_rejected_locally() {
        let executor = Arc::new(RecordingExecutor::with_jobs(1));
        let engine = engine(executor.clone());
        assert_eq!(engine.start(" ").unwrap_err().kind(), ErrorKind::InvalidParameter);
        assert_eq!(engine.get_job("").unwrap_err().kind(), ErrorKind::InvalidParameter);
        assert_eq!(
            engine.rerun(RerunRequest::new("")).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn executor_failures_are_translated() {
        let executor = Arc::new(RecordingExecutor::default());
        executor
            .jobs
            .lock()
            .push(job("done", "alice", JobStatus::Killed));
        let engine = engine(executor);

        let err = engine.kill("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.job_id(), Some("missing"));

        let err = engine.suspend("done").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);

        let err = engine.change("done", "foo=bar").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(engine.change("done", "endtime=2030-01-01T00:00:00Z").is_ok());
    }

    #[test]
    fn definition_is_returned_verbatim() {
        let executor = Arc::new(RecordingExecutor::with_jobs(1));
        let definition = engine(executor).get_definition("job-0").unwrap();
        assert_eq!(definition, "<bundle-app name='job-0'/>");
    }

    #[test]
    fn stream_log_writes_lines_from_creation_until_now() {
        let executor = Arc::new(RecordingExecutor::with_jobs(2));
        let mut store = VecLogStore::default();
        let recent = Utc::now() - ChronoDuration::minutes(5);
        for (job_id, message) in [("job-0", "started"), ("job-1", "other"), ("job-0", "running")] {
            store.lines.push(LogLine {
                timestamp: recent,
                level: LogLevel::Info,
                job_id: job_id.into(),
                message: message.into(),
            });
        }
        let store = Arc::new(store);
        let engine = BundleEngine::system(executor, store.clone());

        let mut sink = Vec::new();
        let written = engine.stream_log("job-0", &mut sink).unwrap();
        assert_eq!(written, 2);
        let text = String::from_utf8(sink).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("started") && text.contains("running"));
        assert!(!text.contains("other"));

        let windows = store.windows.lock();
        let (from, to) = windows[0];
        assert!(from < recent && recent <= to);
    }

    #[test]
    fn log_lines_of_unknown_job_fail() {
        let executor = Arc::new(RecordingExecutor::default());
        let engine = engine(executor);
        assert_eq!(
            engine.log_lines("missing").err().map(|err| err.kind()),
            Some(ErrorKind::NotFound)
        );
    }

    #[test]
    fn sink_failures_propagate() {
        let executor = Arc::new(RecordingExecutor::with_jobs(1));
        let store = VecLogStore {
            lines: vec![LogLine::now(LogLevel::Info, "job-0", "started")],
            ..VecLogStore::default()
        };
        let engine = BundleEngine::system(executor, Arc::new(store));
        let err = engine.stream_log("job-0", &mut BrokenSink).unwrap_err();
        assert!(matches!(err, EngineError::Sink { .. }));
        assert_eq!(err.code(), ErrorCode::E1001);
    }

    #[test]
    fn external_ids_never_resolve() {
        let executor = Arc::new(RecordingExecutor::with_jobs(1));
        let engine = engine(executor.clone());
        assert_eq!(engine.job_id_for_external_id("ext-1").unwrap(), None);
        assert_eq!(engine.kind(), JobKind::Bundle);
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn metrics_count_outcomes() {
        let registry = Arc::new(Registry::new());
        let metrics = EngineMetrics::new(registry.clone()).unwrap();
        let executor = Arc::new(RecordingExecutor::with_jobs(1));
        let engine = engine(executor).with_metrics(metrics);
        engine.kill("job-0").unwrap();
        engine.get_coord_job("job-0").unwrap_err();

        let total: f64 = registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == "bsched_engine_operations_total")
            .flat_map(|family| family.get_metric().iter())
            .map(|metric| metric.get_counter().get_value())
            .sum();
        assert_eq!(total as u64, 2);
    }
}
