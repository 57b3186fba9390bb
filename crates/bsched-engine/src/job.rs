//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Bundle lifecycle facade and query contract."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::status::JobStatus;

/// Snapshot of a bundle job as recorded by the command executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleJob {
    /// Opaque job identifier assigned at submit time.
    pub id: String,
    /// Owning user.
    pub user: String,
    /// Display name taken from the definition.
    pub name: String,
    /// Optional access group.
    #[serde(default)]
    pub group: Option<String>,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When the job last changed.
    pub last_modified: DateTime<Utc>,
    /// Time after which coordinators stop materializing.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Time at which the bundle pauses itself.
    #[serde(default)]
    pub pause_time: Option<DateTime<Utc>>,
    /// Coordinator names declared by the definition.
    #[serde(default)]
    pub coordinators: Vec<String>,
    /// Definition text exactly as submitted.
    pub definition: String,
}

/// Definition submitted to create a bundle job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Bundle name.
    pub name: String,
    /// Optional access group.
    #[serde(default)]
    pub group: Option<String>,
    /// Bundle definition text.
    pub definition: String,
    /// Coordinators grouped by the bundle.
    #[serde(default)]
    pub coordinators: Vec<String>,
    /// Free-form job properties.
    #[serde(default)]
    pub properties: IndexMap<String, String>,
}

impl JobDefinition {
    /// Construct a definition from a name and definition text.
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
            ..Self::default()
        }
    }

    /// Set the access group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Declare a coordinator.
    pub fn with_coordinator(mut self, coordinator: impl Into<String>) -> Self {
        self.coordinators.push(coordinator.into());
        self
    }

    /// Attach a job property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Everything the executor needs to create (or validate) a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    /// The bundle definition.
    pub definition: JobDefinition,
    /// Submitting user; `None` for the system engine.
    pub user: Option<String>,
    /// Authentication token of the submitting user.
    pub auth_token: Option<String>,
    /// Validate only; persist nothing.
    pub dry_run: bool,
}

/// Rerun of selected coordinator actions of a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerunRequest {
    /// Target bundle job.
    pub job_id: String,
    /// Comma-separated coordinator names; empty means all.
    #[serde(default)]
    pub coordinator_scope: String,
    /// Comma-separated nominal times or ranges; empty means all.
    #[serde(default)]
    pub date_scope: String,
    /// Recompute input/output dataset URIs.
    #[serde(default)]
    pub refresh: bool,
    /// Keep output of the previous run instead of cleaning it up.
    #[serde(default)]
    pub no_cleanup: bool,
}

impl RerunRequest {
    /// Rerun everything in the given bundle.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            ..Self::default()
        }
    }

    /// Restrict the rerun to the listed coordinators.
    pub fn with_coordinator_scope(mut self, scope: impl Into<String>) -> Self {
        self.coordinator_scope = scope.into();
        self
    }

    /// Restrict the rerun to the listed nominal times.
    pub fn with_date_scope(mut self, scope: impl Into<String>) -> Self {
        self.date_scope = scope.into();
        self
    }

    /// Toggle dataset URI refresh.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Toggle cleanup of previous output.
    pub fn no_cleanup(mut self, no_cleanup: bool) -> Self {
        self.no_cleanup = no_cleanup;
        self
    }

    /// Split the coordinator scope into its entries. Empty means all.
    pub fn coordinator_entries(&self) -> Vec<&str> {
        split_scope(&self.coordinator_scope)
    }

    /// Split the date scope into its entries. Empty means all.
    pub fn date_entries(&self) -> Vec<&str> {
        split_scope(&self.date_scope)
    }
}

fn split_scope(scope: &str) -> Vec<&str> {
    if scope.trim().is_empty() {
        return Vec::new();
    }
    scope.split(',').map(str::trim).collect()
}

/// One page of a bundle list query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleJobPage {
    /// Jobs on this page.
    pub jobs: Vec<BundleJob>,
    /// 1-based offset of the first job on this page.
    pub start: usize,
    /// Requested page length.
    pub len: usize,
    /// Number of jobs matching the filter, regardless of paging.
    pub total: usize,
}

impl BundleJobPage {
    /// Whether more matching jobs exist past this page.
    pub fn has_more(&self) -> bool {
        self.start.saturating_sub(1) + self.jobs.len() < self.total
    }
}

/// Kinds of jobs known to the scheduling system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// A single DAG execution.
    Workflow,
    /// A time-parameterized recurring job.
    Coordinator,
    /// A container of coordinators.
    Bundle,
}

impl JobKind {
    /// Lower-case name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Workflow => "workflow",
            JobKind::Coordinator => "coordinator",
            JobKind::Bundle => "bundle",
        }
    }
}

/// Summary shape of workflow and coordinator jobs on the shared engine surface.
///
/// A bundle engine never produces one; the type exists so every engine exposes
/// the same call surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignJob {
    /// Job identifier.
    pub id: String,
    /// Kind of job.
    pub kind: JobKind,
    /// Application name.
    pub name: String,
    /// Status literal of the foreign kind.
    pub status: String,
    /// Action identifiers in the requested range.
    #[serde(default)]
    pub actions: Vec<String>,
}
