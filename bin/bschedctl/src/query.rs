//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Control CLI for operators managing bundle jobs."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::io::{self, Write};

use anyhow::Result;
use bsched_engine::{BundleJob, BundleJobPage, JobEngine};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use crate::lifecycle::JobArgs;
use crate::Session;

#[derive(Debug, Args)]
pub struct JobsArgs {
    /// Filter, e.g. `user=alice;status=RUNNING;status=SUSPENDED`.
    #[arg(long, value_name = "FILTER")]
    pub filter: Option<String>,
    /// 1-based offset of the first job to show.
    #[arg(long, default_value_t = 1)]
    pub offset: usize,
    /// Maximum number of jobs to show.
    #[arg(long)]
    pub len: Option<usize>,
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn info(session: &Session, args: JobArgs) -> Result<()> {
    let job = session.engine.get_job(&args.job_id)?;
    if session.json {
        return print_json(&job);
    }
    print!("{}", render_job(&job));
    Ok(())
}

pub fn definition(session: &Session, args: JobArgs) -> Result<()> {
    let definition = session.engine.get_definition(&args.job_id)?;
    println!("{definition}");
    Ok(())
}

pub fn jobs(session: &Session, args: JobsArgs) -> Result<()> {
    let len = session.config.engine.page_len(args.len);
    let page = session
        .engine
        .list_jobs(args.filter.as_deref(), args.offset, len)?;
    if session.json {
        return print_json(&page);
    }
    print!("{}", render_page(&page));
    Ok(())
}

pub fn log(session: &Session, args: JobArgs) -> Result<()> {
    if session.json {
        let lines = session
            .engine
            .log_lines(&args.job_id)?
            .collect::<bsched_engine::Result<Vec<_>>>()?;
        return print_json(&lines);
    }
    let stdout = io::stdout();
    let mut sink = stdout.lock();
    session.engine.stream_log(&args.job_id, &mut sink)?;
    sink.flush()?;
    Ok(())
}

fn optional_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "-".to_owned())
}

fn render_job(job: &BundleJob) -> String {
    let mut out = String::new();
    let rows = [
        ("Job ID", job.id.clone()),
        ("Name", job.name.clone()),
        ("User", job.user.clone()),
        ("Group", job.group.clone().unwrap_or_else(|| "-".to_owned())),
        ("Status", job.status.to_string()),
        ("Created", job.created_at.to_rfc3339()),
        ("Last Modified", job.last_modified.to_rfc3339()),
        ("End Time", optional_time(job.end_time)),
        ("Pause Time", optional_time(job.pause_time)),
        ("Coordinators", job.coordinators.join(", ")),
    ];
    for (label, value) in rows {
        out.push_str(&format!("{label:<14}: {value}\n"));
    }
    out
}

fn render_page(page: &BundleJobPage) -> String {
    let mut out = format!(
        "{:<36} {:<20} {:<14} {:<12} {:<12} {}\n",
        "Job ID", "Name", "Status", "User", "Group", "Created"
    );
    for job in &page.jobs {
        out.push_str(&format!(
            "{:<36} {:<20} {:<14} {:<12} {:<12} {}\n",
            job.id,
            job.name,
            job.status,
            job.user,
            job.group.as_deref().unwrap_or("-"),
            job.created_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    out.push_str(&format!(
        "{} of {} jobs (offset {})\n",
        page.jobs.len(),
        page.total,
        page.start
    ));
    out
}
