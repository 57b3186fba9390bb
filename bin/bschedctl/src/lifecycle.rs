//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Control CLI for operators managing bundle jobs."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bsched_engine::{JobDefinition, JobEngine, RerunRequest};
use clap::Args;
use indexmap::IndexMap;
use serde_json::json;

use crate::query::print_json;
use crate::Session;

#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// Bundle name.
    #[arg(long)]
    pub name: String,
    /// File holding the bundle definition text.
    #[arg(long, value_name = "FILE")]
    pub definition: PathBuf,
    /// Access group of the bundle.
    #[arg(long)]
    pub group: Option<String>,
    /// Coordinator grouped by the bundle (repeatable).
    #[arg(long = "coordinator", value_name = "NAME")]
    pub coordinators: Vec<String>,
    /// Job property (repeatable).
    #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,
    /// Start the job right after submitting it.
    #[arg(long)]
    pub start: bool,
}

impl SubmitArgs {
    fn into_definition(self) -> Result<(JobDefinition, bool)> {
        let text = fs::read_to_string(&self.definition).with_context(|| {
            format!(
                "unable to read bundle definition {}",
                self.definition.display()
            )
        })?;
        let definition = JobDefinition {
            name: self.name,
            group: self.group,
            definition: text,
            coordinators: self.coordinators,
            properties: self.properties.into_iter().collect::<IndexMap<_, _>>(),
        };
        Ok((definition, self.start))
    }
}

#[derive(Debug, Args)]
pub struct JobArgs {
    /// Bundle job id.
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,
}

#[derive(Debug, Args)]
pub struct ChangeArgs {
    /// Bundle job id.
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,
    /// Changes to apply, e.g. `endtime=2030-01-01T00:00:00Z;pausetime=`.
    #[arg(long, value_name = "CHANGES")]
    pub value: String,
}

#[derive(Debug, Args)]
pub struct RerunArgs {
    /// Bundle job id.
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,
    /// Comma-separated coordinator names; all when omitted.
    #[arg(long, value_name = "NAMES")]
    pub coordinator: Option<String>,
    /// Comma-separated nominal times or ranges; all when omitted.
    #[arg(long, value_name = "DATES")]
    pub date: Option<String>,
    /// Recompute dataset URIs.
    #[arg(long)]
    pub refresh: bool,
    /// Keep output of the previous run.
    #[arg(long = "nocleanup")]
    pub no_cleanup: bool,
}

fn parse_property(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if key.trim().is_empty() {
        return Err(format!("property key must not be blank in `{raw}`"));
    }
    Ok((key.trim().to_owned(), value.to_owned()))
}

pub fn submit(session: &Session, args: SubmitArgs, dry_run: bool) -> Result<()> {
    let (definition, start) = args.into_definition()?;
    if dry_run {
        let result = session.engine.dry_run_submit(definition, start)?;
        if session.json {
            return print_json(&json!({ "result": result }));
        }
        println!("{result}");
        return Ok(());
    }

    let job_id = session.engine.submit(definition, start)?;
    if session.json {
        return print_json(&json!({ "id": job_id }));
    }
    println!("job: {job_id}");
    Ok(())
}

pub fn start(session: &Session, args: JobArgs) -> Result<()> {
    session.engine.start(&args.job_id)?;
    acknowledge(session, "start", &args.job_id)
}

pub fn suspend(session: &Session, args: JobArgs) -> Result<()> {
    session.engine.suspend(&args.job_id)?;
    acknowledge(session, "suspend", &args.job_id)
}

pub fn resume(session: &Session, args: JobArgs) -> Result<()> {
    session.engine.resume(&args.job_id)?;
    acknowledge(session, "resume", &args.job_id)
}

pub fn kill(session: &Session, args: JobArgs) -> Result<()> {
    session.engine.kill(&args.job_id)?;
    acknowledge(session, "kill", &args.job_id)
}

pub fn change(session: &Session, args: ChangeArgs) -> Result<()> {
    session.engine.change(&args.job_id, &args.value)?;
    acknowledge(session, "change", &args.job_id)
}

pub fn rerun(session: &Session, args: RerunArgs) -> Result<()> {
    let request = RerunRequest::new(args.job_id.as_str())
        .with_coordinator_scope(args.coordinator.unwrap_or_default())
        .with_date_scope(args.date.unwrap_or_default())
        .refresh(args.refresh)
        .no_cleanup(args.no_cleanup);
    session.engine.rerun(request)?;
    acknowledge(session, "rerun", &args.job_id)
}

fn acknowledge(session: &Session, operation: &str, job_id: &str) -> Result<()> {
    if session.json {
        return print_json(&json!({ "id": job_id, "operation": operation }));
    }
    Ok(())
}
