use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::severity::Severity;
use crate::variables::{self, VariableSpec};

/// Name of the project file at the repository root.
pub const CONFIG_FILE: &str = "dockwright.toml";

/// dockwright.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockwrightConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub build: BuildConfig,
    /// Declared configuration values. Empty means [`variables::builtin_variables`].
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    #[serde(default)]
    pub registries: Vec<RegistryConfig>,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Image name used for local tags
    #[serde(default = "default_project_name")]
    pub name: String,
    /// Branch that receives the `latest` tag
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

/// Location of the wrapped application inside the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source root, relative to the project directory
    #[serde(default = "default_app_dir")]
    pub dir: String,
    /// Dependency manifest, relative to `dir`
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// Lockfile, relative to `dir` (optional on disk)
    #[serde(default = "default_lockfile")]
    pub lockfile: String,
    /// Port the application listens on
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Image for the dependency and build stages
    #[serde(default = "default_base_image")]
    pub base_image: String,
    /// Image for the final runner stage
    #[serde(default = "default_base_image")]
    pub runtime_image: String,
    /// Dependency install command when the lockfile is present
    #[serde(default = "default_install_command")]
    pub install_command: String,
    /// Dependency install command when there is no lockfile
    #[serde(default = "default_fallback_install_command")]
    pub fallback_install_command: String,
    #[serde(default = "default_build_command")]
    pub build_command: String,
    /// Container entrypoint, exec form
    #[serde(default = "default_start_command")]
    pub start_command: Vec<String>,
    /// Non-root user the runner stage switches to
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_uid")]
    pub uid: u32,
    /// Upper bound for a single stage, in seconds
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,
}

/// One destination registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub name: String,
    /// Full repository path, e.g. `ghcr.io/acme/webapp`
    pub repository: String,
    /// Credentials required before pushing. Absent means always available.
    #[serde(default)]
    pub auth: Option<RegistryAuthConfig>,
}

/// Names of the secrets holding registry credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuthConfig {
    pub username: String,
    pub password: String,
    /// Login server, when it differs from the repository host
    #[serde(default)]
    pub server: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_scanner")]
    pub scanner: String,
    /// Reserved tag the scan image is built under
    #[serde(default = "default_scan_tag")]
    pub tag: String,
    /// Lowest severity that is reported
    #[serde(default = "default_threshold")]
    pub threshold: Severity,
    /// SARIF output path, relative to the project directory
    #[serde(default = "default_scan_output")]
    pub output: String,
    /// Findings store endpoint
    #[serde(default)]
    pub upload_url: Option<String>,
    /// Environment variable holding the findings store token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            default_branch: default_branch(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dir: default_app_dir(),
            manifest: default_manifest(),
            lockfile: default_lockfile(),
            port: default_port(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_image: default_base_image(),
            runtime_image: default_base_image(),
            install_command: default_install_command(),
            fallback_install_command: default_fallback_install_command(),
            build_command: default_build_command(),
            start_command: default_start_command(),
            user: default_user(),
            uid: default_uid(),
            stage_timeout_secs: None,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scanner: default_scanner(),
            tag: default_scan_tag(),
            threshold: default_threshold(),
            output: default_scan_output(),
            upload_url: None,
            token_env: default_token_env(),
        }
    }
}

impl DockwrightConfig {
    /// Load from dockwright.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                path: config_path.clone(),
                source: e,
            })?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
            path: config_path.clone(),
            source: e,
        })?;
        config.check(&config_path)?;
        Ok(config)
    }

    /// Declared variables, falling back to the built-in set.
    pub fn variable_specs(&self) -> Vec<VariableSpec> {
        if self.variables.is_empty() {
            variables::builtin_variables()
        } else {
            self.variables.clone()
        }
    }

    fn check(&self, path: &Path) -> crate::Result<()> {
        let mut seen = HashSet::new();
        for spec in &self.variables {
            variables::validate_name(&spec.name).map_err(|reason| {
                crate::Error::InvalidVariableName {
                    name: spec.name.clone(),
                    reason,
                }
            })?;
            if !seen.insert(spec.name.as_str()) {
                return Err(crate::Error::DuplicateEntry {
                    path: path.to_path_buf(),
                    kind: "variable",
                    name: spec.name.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for registry in &self.registries {
            if !seen.insert(registry.name.as_str()) {
                return Err(crate::Error::DuplicateEntry {
                    path: path.to_path_buf(),
                    kind: "registry",
                    name: registry.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn default_project_name() -> String {
    "webapp".to_owned()
}

fn default_branch() -> String {
    "main".to_owned()
}

fn default_app_dir() -> String {
    "app".to_owned()
}

fn default_manifest() -> String {
    "package.json".to_owned()
}

fn default_lockfile() -> String {
    "package-lock.json".to_owned()
}

fn default_port() -> u16 {
    3000
}

fn default_base_image() -> String {
    "node:20-alpine".to_owned()
}

fn default_install_command() -> String {
    "npm ci".to_owned()
}

fn default_fallback_install_command() -> String {
    "npm install".to_owned()
}

fn default_build_command() -> String {
    "npm run build".to_owned()
}

fn default_start_command() -> Vec<String> {
    vec!["npm".to_owned(), "start".to_owned()]
}

fn default_user() -> String {
    "app".to_owned()
}

fn default_uid() -> u32 {
    1001
}

fn default_scanner() -> String {
    "trivy".to_owned()
}

fn default_scan_tag() -> String {
    "scan".to_owned()
}

fn default_threshold() -> Severity {
    Severity::Medium
}

fn default_scan_output() -> String {
    "trivy-results.sarif".to_owned()
}

fn default_token_env() -> String {
    "FINDINGS_TOKEN".to_owned()
}
