use std::path::{Component, Path, PathBuf};

use crate::config::AppConfig;

/// The wrapped application's files as found on disk.
///
/// Everything here is read-only input to the build; nothing under
/// `app_dir` is ever written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub project_dir: PathBuf,
    /// Source root (`[app].dir`)
    pub app_dir: PathBuf,
    /// Dependency manifest, relative to `app_dir`
    pub manifest: PathBuf,
    /// Lockfile relative to `app_dir`, if it exists
    pub lockfile: Option<PathBuf>,
}

impl ProjectLayout {
    /// Locate the application under `project_dir` and check the mandatory files exist.
    pub fn inspect(project_dir: &Path, app: &AppConfig) -> crate::Result<Self> {
        let dir = relative_path(&app.dir)?;
        let manifest = relative_path(&app.manifest)?;
        let lockfile = relative_path(&app.lockfile)?;

        let app_dir = project_dir.join(&dir);
        if !app_dir.is_dir() {
            return Err(crate::Error::AppDirMissing(app_dir));
        }
        if !app_dir.join(&manifest).is_file() {
            return Err(crate::Error::ManifestMissing(app_dir.join(&manifest)));
        }

        let lockfile = app_dir.join(&lockfile).is_file().then_some(lockfile);
        if lockfile.is_none() {
            tracing::info!(
                app_dir = %app_dir.display(),
                "no lockfile, dependencies will be resolved fresh"
            );
        }

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            app_dir,
            manifest,
            lockfile,
        })
    }

    pub fn has_lockfile(&self) -> bool {
        self.lockfile.is_some()
    }
}

/// Accepts only plain relative paths that stay inside the project.
fn relative_path(raw: &str) -> crate::Result<PathBuf> {
    let invalid = |reason| crate::Error::InvalidAppPath {
        path: raw.to_owned(),
        reason,
    };

    if raw.trim().is_empty() {
        return Err(invalid("path is empty"));
    }
    let path = Path::new(raw);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not contain '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative to the project directory"));
            }
        }
    }
    Ok(path.to_path_buf())
}
