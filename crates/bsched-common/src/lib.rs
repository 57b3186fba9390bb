//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the bundle engine."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Shared primitives for the bsched workspace.
//! This crate exposes configuration loading and tracing bootstrap
//! utilities consumed by the engine, the reference store and the CLI.

pub mod config;
pub mod logging;

pub use config::{AppConfig, EngineConfig, LoadedAppConfig, LoggingConfig, StoreConfig};
pub use logging::{init_tracing, LogFormat};
