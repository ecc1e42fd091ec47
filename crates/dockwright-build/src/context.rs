use std::path::{Path, PathBuf};
use std::process::Command;

use dockwright_core::ProjectLayout;

use crate::eject::WORK_DIR;
use crate::pipeline::SourceTree;

/// Paths never copied into the build context, regardless of .gitignore content.
const CONTEXT_EXCLUDES: &[&str] = &[WORK_DIR, ".git"];

/// Stages the application sources as a Docker build context.
///
/// Uses `git ls-files` inside the app directory to respect `.gitignore`,
/// then copies every tracked and untracked-but-not-ignored file into
/// `.dockwright/context/`. The Dockerfile is written next to them. The
/// app directory itself is only read.
pub fn create_context(
    layout: &ProjectLayout,
    dockerfile_content: &str,
) -> Result<SourceTree, ContextError> {
    let context_dir = layout.project_dir.join(WORK_DIR).join("context");

    if context_dir.exists() {
        std::fs::remove_dir_all(&context_dir).map_err(|e| ContextError::Cleanup {
            path: context_dir.clone(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(&context_dir).map_err(|e| ContextError::Create {
        path: context_dir.clone(),
        source: e,
    })?;

    let files = git_ls_files(&layout.app_dir)?;
    for relative_path in &files {
        if CONTEXT_EXCLUDES
            .iter()
            .any(|ex| relative_path.starts_with(ex))
        {
            continue;
        }

        let src = layout.app_dir.join(relative_path);
        let dst = context_dir.join(relative_path);

        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ContextError::Create {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::copy(&src, &dst).map_err(|e| ContextError::CopyFile {
            path: src,
            source: e,
        })?;
    }
    tracing::debug!(files = files.len(), dir = %context_dir.display(), "staged build context");

    let dockerfile = context_dir.join("Dockerfile");
    std::fs::write(&dockerfile, dockerfile_content).map_err(|e| {
        ContextError::WriteDockerfile {
            path: dockerfile.clone(),
            source: e,
        }
    })?;

    let revision = source_revision(&layout.project_dir, &layout.app_dir)?;

    Ok(SourceTree {
        context_dir,
        dockerfile,
        revision,
    })
}

/// Returns the list of files git considers part of the app:
/// tracked files + untracked files that are not .gitignored, minus tracked
/// files deleted from the working tree.
///
/// `-z` keeps names unquoted, so non-ASCII paths come back verbatim.
fn git_ls_files(app_dir: &Path) -> Result<Vec<PathBuf>, ContextError> {
    let listed = git_output(
        app_dir,
        &["ls-files", "-z", "--cached", "--others", "--exclude-standard"],
    )?;
    let deleted = git_output(app_dir, &["ls-files", "-z", "--deleted"])?;
    let deleted = split_nul(&deleted)?;

    Ok(split_nul(&listed)?
        .into_iter()
        .filter(|path| !deleted.contains(path))
        .collect())
}

fn split_nul(stdout: &[u8]) -> Result<Vec<PathBuf>, ContextError> {
    stdout
        .split(|b| *b == 0)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            std::str::from_utf8(entry)
                .map(PathBuf::from)
                .map_err(|_| ContextError::NonUtf8Path {
                    path: String::from_utf8_lossy(entry).into_owned(),
                })
        })
        .collect()
}

/// `HEAD` commit, suffixed with `-dirty` when the app directory has
/// uncommitted changes. `None` outside a git repository with commits.
pub fn source_revision(project_dir: &Path, app_dir: &Path) -> Result<Option<String>, ContextError> {
    let head = match git(project_dir, &["rev-parse", "HEAD"]) {
        Ok(out) => out.trim().to_owned(),
        Err(ContextError::GitFailed { detail }) => {
            tracing::debug!(%detail, "no HEAD revision");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    if is_dirty(app_dir)? {
        Ok(Some(format!("{head}-dirty")))
    } else {
        Ok(Some(head))
    }
}

/// Checks whether the working tree under `dir` has uncommitted changes.
pub fn is_dirty(dir: &Path) -> Result<bool, ContextError> {
    let stdout = git(dir, &["status", "--porcelain", "--", "."])?;
    Ok(!stdout.trim().is_empty())
}

fn git(dir: &Path, args: &[&str]) -> Result<String, ContextError> {
    let stdout = git_output(dir, args)?;
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

fn git_output(dir: &Path, args: &[&str]) -> Result<Vec<u8>, ContextError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| ContextError::GitCommand {
            detail: format!("failed to execute git {}", args.join(" ")),
            source: e,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ContextError::GitFailed {
            detail: format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            ),
        });
    }

    Ok(output.stdout)
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to clean up context directory {path}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy file {path}")]
    CopyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write Dockerfile at {path}")]
    WriteDockerfile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("git command failed: {detail}")]
    GitCommand {
        detail: String,
        source: std::io::Error,
    },
    #[error("git failed: {detail}")]
    GitFailed { detail: String },
    #[error("file name is not valid UTF-8: {path}")]
    NonUtf8Path { path: String },
}
