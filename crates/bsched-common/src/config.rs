//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the bundle engine."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_page_len() -> usize {
    50
}

fn default_max_page_len() -> usize {
    1000
}

fn default_state_file() -> PathBuf {
    PathBuf::from("target/bsched/jobs.json")
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("target/bsched/journal.log")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_log_level() -> String {
    "info".to_owned()
}

/// Primary configuration object for bsched processes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration together with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "BSCHED_CONFIG";

    /// Load the first configuration found, `BSCHED_CONFIG` taking precedence.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Self::load_with_source(candidates).map(|loaded| loaded.config)
    }

    /// Like [`AppConfig::load`], also reporting which file was read.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        let source = Self::locate(candidates).ok_or_else(|| {
            let inspected: Vec<_> = candidates
                .iter()
                .map(|candidate| candidate.as_ref().display().to_string())
                .collect();
            anyhow!(
                "no bsched configuration found (inspected: {})",
                inspected.join(", ")
            )
        })?;
        let config = Self::read(&source)?;
        Ok(LoadedAppConfig { config, source })
    }

    /// Like [`AppConfig::load`], but built-in defaults apply when no file exists.
    pub fn load_or_default<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        match Self::locate(candidates) {
            Some(source) => Self::read(&source),
            None => {
                debug!("no bsched configuration present; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// An explicit `BSCHED_CONFIG` wins even when the file is missing, so that
    /// reading it reports the error.
    fn locate<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
        env::var_os(Self::ENV_CONFIG_PATH)
            .filter(|value| !value.to_string_lossy().trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                candidates
                    .iter()
                    .map(|candidate| candidate.as_ref())
                    .find(|candidate| candidate.is_file())
                    .map(Path::to_path_buf)
            })
    }

    fn read(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "reading configuration");
        let raw = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        raw.parse()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Check cross-field constraints of every section.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.store.validate()?;
        Ok(())
    }
}

impl FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(raw).context("malformed TOML")?;
        config.validate()?;
        Ok(config)
    }
}

/// Paging defaults applied by front ends before calling the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_page_len")]
    pub default_page_len: usize,
    #[serde(default = "default_max_page_len")]
    pub max_page_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_len: default_page_len(),
            max_page_len: default_max_page_len(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_page_len == 0 {
            return Err(anyhow!("engine.default_page_len must be at least 1"));
        }
        if self.max_page_len < self.default_page_len {
            return Err(anyhow!(
                "engine.max_page_len ({}) must not be smaller than engine.default_page_len ({})",
                self.max_page_len,
                self.default_page_len
            ));
        }
        Ok(())
    }

    /// Clamp a requested page length into the configured bounds.
    pub fn page_len(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_len)
            .clamp(1, self.max_page_len)
    }
}

/// Locations used by the reference job store and log journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_journal_path")]
    pub journal: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            journal: default_journal_path(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.state_file == self.journal {
            return Err(anyhow!(
                "store.state_file and store.journal must point at different files ({})",
                self.journal.display()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Filter directive used when neither `BSCHED_LOG` nor `RUST_LOG` is set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = "".parse().unwrap();
        assert_eq!(config.engine.default_page_len, 50);
        assert_eq!(config.engine.max_page_len, 1000);
        assert_eq!(config.store.state_file, default_state_file());
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn page_len_is_clamped() {
        let engine = EngineConfig {
            default_page_len: 20,
            max_page_len: 100,
        };
        assert_eq!(engine.page_len(None), 20);
        assert_eq!(engine.page_len(Some(0)), 1);
        assert_eq!(engine.page_len(Some(5000)), 100);
    }

    #[test]
    fn rejects_inverted_page_bounds() {
        let err = "[engine]\ndefault_page_len = 10\nmax_page_len = 5\n"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("max_page_len"));
    }

    #[test]
    fn rejects_shared_store_paths() {
        let err = "[store]\nstate_file = \"a.log\"\njournal = \"a.log\"\n"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("different files"));
    }
}
