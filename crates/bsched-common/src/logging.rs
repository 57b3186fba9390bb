//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the bundle engine."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "BSCHED_LOG";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static CONSOLE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Console log formats. The rolling file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Install the process-wide subscriber for `service_name`.
///
/// The filter comes from `BSCHED_LOG`, then `RUST_LOG`, then `config.level`.
/// Console output goes to stderr so stdout stays free for command output; a
/// daily rolling JSON file is kept under `config.directory`. Calling this
/// twice keeps the first subscriber.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    let (filter, rejected) = env_filter(env_directive(), &config.level)?;
    fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "unable to create log directory {}",
            config.directory.display()
        )
    })?;
    let file_name = format!(
        "{}.log",
        config.file_prefix.as_deref().unwrap_or(service_name)
    );
    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, file_name));
    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = FILE_GUARD.set(file_guard);
    let _ = CONSOLE_GUARD.set(console_guard);

    let file_layer = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer)
        .boxed();

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer(config.format, console_writer))
        .with(file_layer)
        .try_init()
        .is_ok();

    debug!(
        service = %service_name,
        log_dir = %config.directory.display(),
        format = ?config.format,
        installed,
        "tracing ready"
    );
    if let Some(directive) = rejected {
        warn!(
            directive = %directive,
            fallback = %config.level,
            "ignoring invalid log directive from the environment"
        );
    }
    Ok(())
}

fn env_directive() -> Option<String> {
    std::env::var(LOG_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .ok()
}

/// Filter for `directive`, else `fallback`. An unusable `directive` is handed
/// back so it can be reported once a subscriber exists; an unusable
/// `fallback` is a configuration error.
fn env_filter(directive: Option<String>, fallback: &str) -> Result<(EnvFilter, Option<String>)> {
    let rejected = match directive {
        Some(directive) => match EnvFilter::try_new(&directive) {
            Ok(filter) => return Ok((filter, None)),
            Err(_) => Some(directive),
        },
        None => None,
    };
    let filter = EnvFilter::try_new(fallback)
        .with_context(|| format!("invalid logging.level `{fallback}`"))?;
    Ok((filter, rejected))
}

fn console_layer<S>(format: LogFormat, writer: NonBlocking) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
{
    let layer = fmt::layer().with_timer(UtcTime::rfc_3339()).with_writer(writer);
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().boxed(),
        LogFormat::Pretty => layer.boxed(),
    }
}
