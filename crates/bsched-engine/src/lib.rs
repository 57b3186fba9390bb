//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Bundle lifecycle facade and query contract."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Lifecycle control facade for bundle jobs.
//!
//! [`BundleEngine`] is the single entry point callers use to submit, query and
//! transition bundles. Every lifecycle operation is delegated as one unit of
//! work to a [`CommandExecutor`]; historical logs come from a [`LogStore`].
//! Failures from either collaborator surface as an [`EngineError`] with a
//! stable [`ErrorCode`].
#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod executor;
pub mod filter;
pub mod job;
pub mod log_store;
pub mod metrics;
pub mod status;

pub use engine::{BundleEngine, JobEngine};
pub use error::{translate, EngineError, ErrorCode, ErrorKind, Result};
pub use executor::{CommandError, CommandExecutor, CommandResult, Operation};
pub use filter::{parse_filter, Filter, FilterName, FILTER_NAMES};
pub use job::{BundleJob, BundleJobPage, ForeignJob, JobDefinition, JobKind, RerunRequest, SubmitRequest};
pub use log_store::{LogFilter, LogLevel, LogLine, LogStore, LogStoreError, LogStream};
pub use metrics::EngineMetrics;
pub use status::JobStatus;
