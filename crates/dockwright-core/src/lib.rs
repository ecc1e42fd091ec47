//! Core types and configuration for dockwright.
//!
//! This crate defines the `dockwright.toml` schema ([`DockwrightConfig`]),
//! configuration variables and their resolution ([`variables`]), the
//! on-disk layout of the wrapped application ([`ProjectLayout`]), and
//! shared error types.

pub mod config;
pub mod error;
pub mod layout;
pub mod severity;
pub mod variables;

pub use config::{
    AppConfig, BuildConfig, DockwrightConfig, ProjectConfig, RegistryAuthConfig, RegistryConfig,
    ScanConfig,
};
pub use error::{Error, Result};
pub use layout::ProjectLayout;
pub use severity::Severity;
pub use variables::{
    ConfigurationSet, Origin, Problem, ResolvedValue, Scope, Source, SourceKind,
    ValidationError, ValueKind, VariableSpec, resolve,
};
