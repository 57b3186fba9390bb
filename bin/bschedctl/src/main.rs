//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Control CLI for operators managing bundle jobs."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bsched_common::{init_tracing, AppConfig};
use bsched_engine::BundleEngine;
use bsched_logging::{log_operation_event, LogContext, OperationOutcome};
use bsched_store::{InMemoryExecutor, JournalLogStore, JournalWriter};
use clap::{Parser, Subcommand};
use tracing::debug;

mod lifecycle;
mod query;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "bsched bundle lifecycle control utility",
    long_about = None
)]
struct Cli {
    /// Configuration file (overridden by BSCHED_CONFIG).
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Act on behalf of this user.
    #[arg(long, env = "BSCHED_USER", global = true)]
    user: Option<String>,
    /// Authentication token of the user.
    #[arg(long, env = "BSCHED_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Submit a bundle job.
    Submit(lifecycle::SubmitArgs),
    /// Validate a bundle definition without creating a job.
    Dryrun(lifecycle::SubmitArgs),
    /// Start a prepared bundle job.
    Start(lifecycle::JobArgs),
    /// Suspend a bundle job.
    Suspend(lifecycle::JobArgs),
    /// Resume a suspended bundle job.
    Resume(lifecycle::JobArgs),
    /// Kill a bundle job.
    Kill(lifecycle::JobArgs),
    /// Change end or pause time of a bundle job.
    Change(lifecycle::ChangeArgs),
    /// Rerun coordinator actions of a bundle job.
    Rerun(lifecycle::RerunArgs),
    /// Show a bundle job.
    Info(lifecycle::JobArgs),
    /// Print the definition a bundle job was submitted with.
    Definition(lifecycle::JobArgs),
    /// List bundle jobs.
    Jobs(query::JobsArgs),
    /// Print the log of a bundle job.
    Log(lifecycle::JobArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Submit(_) => "submit",
            Commands::Dryrun(_) => "dryrun",
            Commands::Start(_) => "start",
            Commands::Suspend(_) => "suspend",
            Commands::Resume(_) => "resume",
            Commands::Kill(_) => "kill",
            Commands::Change(_) => "change",
            Commands::Rerun(_) => "rerun",
            Commands::Info(_) => "info",
            Commands::Definition(_) => "definition",
            Commands::Jobs(_) => "jobs",
            Commands::Log(_) => "log",
        }
    }
}

/// Everything a subcommand needs to run.
pub(crate) struct Session {
    pub engine: BundleEngine,
    pub config: AppConfig,
    pub json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing("bschedctl", &config.logging)?;

    let command = cli.command.name();
    let engine = open_engine(&config, cli.user.as_deref(), cli.token.as_deref())?;
    let session = Session {
        engine,
        config,
        json: cli.json,
    };

    let result = dispatch(&session, cli.command);
    let mut context = LogContext::new().with_operation(command);
    if let Some(user) = session.engine.user() {
        context = context.with_user(user);
    }
    match &result {
        Ok(()) => log_operation_event(
            Some(&context),
            "bschedctl.command",
            "command completed",
            OperationOutcome::Success,
        ),
        Err(err) => log_operation_event(
            Some(&context),
            "bschedctl.command",
            &format!("{err:#}"),
            OperationOutcome::Fault,
        ),
    }
    result
}

fn dispatch(session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Submit(args) => lifecycle::submit(session, args, false),
        Commands::Dryrun(args) => lifecycle::submit(session, args, true),
        Commands::Start(args) => lifecycle::start(session, args),
        Commands::Suspend(args) => lifecycle::suspend(session, args),
        Commands::Resume(args) => lifecycle::resume(session, args),
        Commands::Kill(args) => lifecycle::kill(session, args),
        Commands::Change(args) => lifecycle::change(session, args),
        Commands::Rerun(args) => lifecycle::rerun(session, args),
        Commands::Info(args) => query::info(session, args),
        Commands::Definition(args) => query::definition(session, args),
        Commands::Jobs(args) => query::jobs(session, args),
        Commands::Log(args) => query::log(session, args),
    }
}

fn load_config(explicit: Option<&PathBuf>) -> Result<AppConfig> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/bsched.toml"));
    let loaded = AppConfig::load_or_default(&candidates)?;
    Ok(loaded)
}

fn open_engine(config: &AppConfig, user: Option<&str>, token: Option<&str>) -> Result<BundleEngine> {
    let journal = JournalWriter::open(&config.store.journal).with_context(|| {
        format!(
            "unable to open job journal {}",
            config.store.journal.display()
        )
    })?;
    let executor = InMemoryExecutor::open(&config.store.state_file)
        .with_context(|| {
            format!(
                "unable to open job state {}",
                config.store.state_file.display()
            )
        })?
        .with_journal(journal);
    let log_store = JournalLogStore::new(&config.store.journal);
    debug!(
        state_file = %config.store.state_file.display(),
        journal = %config.store.journal.display(),
        "opened reference job store"
    );

    let executor = Arc::new(executor);
    let log_store = Arc::new(log_store);
    let engine = match (user, token) {
        (Some(user), Some(token)) => BundleEngine::for_user(user, token, executor, log_store)?,
        (None, None) => BundleEngine::system(executor, log_store),
        _ => bail!("--user and --token must be given together"),
    };
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bschedctl",
            "jobs",
            "--filter",
            "status=RUNNING",
            "--json",
            "--user",
            "alice",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.user.as_deref(), Some("alice"));
        assert_eq!(cli.command.name(), "jobs");
    }

    #[test]
    fn rerun_flags_map_to_arguments() {
        let cli = Cli::try_parse_from([
            "bschedctl",
            "rerun",
            "0000001-20240101000000000-bsched-B",
            "--coordinator",
            "ingest,publish",
            "--refresh",
        ])
        .unwrap();
        match cli.command {
            Commands::Rerun(args) => {
                assert_eq!(args.coordinator.as_deref(), Some("ingest,publish"));
                assert!(args.refresh);
                assert!(!args.no_cleanup);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
