use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("duplicate {kind} '{name}' in {path}")]
    DuplicateEntry {
        path: PathBuf,
        kind: &'static str,
        name: String,
    },

    #[error("invalid variable name '{name}': {reason}")]
    InvalidVariableName { name: String, reason: &'static str },

    #[error("failed to read dotenv file {path}")]
    DotenvRead {
        path: PathBuf,
        source: dotenvy::Error,
    },

    // ── Project layout ──
    #[error("application directory not found: {0}")]
    AppDirMissing(PathBuf),

    #[error("dependency manifest not found: {0} (the app directory must contain it)")]
    ManifestMissing(PathBuf),

    #[error("invalid app path {path:?}: {reason}")]
    InvalidAppPath { path: String, reason: &'static str },

    #[error("invalid severity '{0}' (expected unknown, low, medium, high, or critical)")]
    InvalidSeverity(String),
}

impl Error {
    /// Whether the operator's configuration, rather than the environment or
    /// project tree, is at fault.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::ConfigParse { .. }
                | Error::DuplicateEntry { .. }
                | Error::InvalidVariableName { .. }
                | Error::InvalidAppPath { .. }
                | Error::InvalidSeverity(_)
        )
    }
}
