//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Bundle lifecycle facade and query contract."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! List-query filters.
//!
//! ```text
//! filter := (clause (";" clause)*)?
//! clause := name "=" value
//! name   := "user" | "name" | "group" | "status"
//! ```
//!
//! Clauses naming the same key are OR-ed; different keys are AND-ed.
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::error::EngineError;
use crate::job::BundleJob;
use crate::status::JobStatus;

const PAIR_REASON: &str = "elements must be name=value pairs";

/// Filter keys accepted by list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterName {
    /// Owning user.
    User,
    /// Bundle name.
    Name,
    /// Access group.
    Group,
    /// Status literal.
    Status,
}

impl FilterName {
    /// Literal used in filter strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterName::User => "user",
            FilterName::Name => "name",
            FilterName::Group => "group",
            FilterName::Status => "status",
        }
    }
}

impl fmt::Display for FilterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognized filter names, built once and never mutated.
pub static FILTER_NAMES: Lazy<IndexMap<&'static str, FilterName>> = Lazy::new(|| {
    [
        FilterName::User,
        FilterName::Name,
        FilterName::Group,
        FilterName::Status,
    ]
    .into_iter()
    .map(|name| (name.as_str(), name))
    .collect()
});

/// Validated filter: each recognized name maps to its values in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    entries: IndexMap<FilterName, Vec<String>>,
}

impl Filter {
    /// Filter matching every job.
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether the filter places no restriction.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Values recorded for `name`.
    pub fn values(&self, name: FilterName) -> Option<&[String]> {
        self.entries.get(&name).map(Vec::as_slice)
    }

    /// Iterate over names and their values in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (FilterName, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (*name, values.as_slice()))
    }

    /// Whether `job` satisfies every clause of the filter.
    pub fn matches(&self, job: &BundleJob) -> bool {
        self.entries.iter().all(|(name, values)| {
            let actual = match name {
                FilterName::User => Some(job.user.as_str()),
                FilterName::Name => Some(job.name.as_str()),
                FilterName::Group => job.group.as_deref(),
                FilterName::Status => Some(job.status.as_str()),
            };
            actual.is_some_and(|actual| values.iter().any(|value| value == actual))
        })
    }

    fn push(&mut self, name: FilterName, value: &str) {
        self.entries.entry(name).or_default().push(value.to_owned());
    }
}

/// Parse a filter string. `None` and `""` yield a filter matching every job.
pub fn parse_filter(filter: Option<&str>) -> Result<Filter, EngineError> {
    let mut parsed = Filter::default();
    let Some(raw) = filter else {
        return Ok(parsed);
    };

    for token in raw.split(';').filter(|token| !token.is_empty()) {
        let Some((name, value)) = token.split_once('=') else {
            return Err(invalid(raw, PAIR_REASON));
        };
        if name.is_empty() || value.is_empty() || value.contains('=') {
            return Err(invalid(raw, PAIR_REASON));
        }
        let Some(name) = FILTER_NAMES.get(name).copied() else {
            return Err(invalid(raw, format!("invalid name [{}]", name)));
        };
        if name == FilterName::Status && JobStatus::from_str(value).is_err() {
            return Err(invalid(raw, format!("invalid status [{}]", value)));
        }
        parsed.push(name, value);
    }
    Ok(parsed)
}

fn invalid(filter: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidFilter {
        filter: filter.to_owned(),
        reason: reason.into(),
    }
}
