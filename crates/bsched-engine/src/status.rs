//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Bundle lifecycle facade and query contract."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Status of a bundle job.
///
/// Parsing is exact and case-sensitive: only the upper-case literals below are
/// accepted, which is what the list filter grammar requires.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum JobStatus {
    /// Submitted, not yet started.
    #[serde(rename = "PREP")]
    #[strum(serialize = "PREP")]
    Prep,
    /// Coordinators are materializing actions.
    #[serde(rename = "RUNNING")]
    #[strum(serialize = "RUNNING")]
    Running,
    /// Suspended by an operator after start.
    #[serde(rename = "SUSPENDED")]
    #[strum(serialize = "SUSPENDED")]
    Suspended,
    /// Paused because the pause time was reached.
    #[serde(rename = "PAUSED")]
    #[strum(serialize = "PAUSED")]
    Paused,
    /// Suspended before it was ever started.
    #[serde(rename = "PREPSUSPENDED")]
    #[strum(serialize = "PREPSUSPENDED")]
    PrepSuspended,
    /// Paused before it was ever started.
    #[serde(rename = "PREPPAUSED")]
    #[strum(serialize = "PREPPAUSED")]
    PrepPaused,
    /// Every coordinator finished successfully.
    #[serde(rename = "SUCCEEDED")]
    #[strum(serialize = "SUCCEEDED")]
    Succeeded,
    /// The bundle failed.
    #[serde(rename = "FAILED")]
    #[strum(serialize = "FAILED")]
    Failed,
    /// Killed by an operator.
    #[serde(rename = "KILLED")]
    #[strum(serialize = "KILLED")]
    Killed,
    /// Finished, but at least one coordinator did not succeed.
    #[serde(rename = "DONEWITHERROR")]
    #[strum(serialize = "DONEWITHERROR")]
    DoneWithError,
}

impl JobStatus {
    /// Whether no further lifecycle transition can leave this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Killed | JobStatus::DoneWithError
        )
    }

    /// Wire literal of the status.
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}
