use std::path::{Path, PathBuf};

use crate::executor::{RealExecutor, ToolExecutor};
use crate::pipeline::{Artifact, StageRequest, StageRunner};
use crate::tool::ToolError;

const DOCKER: &str = "docker";

/// Docker CLI operations, parameterized over the executor for testability.
pub struct DockerClient<E: ToolExecutor = RealExecutor> {
    executor: E,
}

impl DockerClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
        }
    }
}

impl Default for DockerClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ToolExecutor> DockerClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    // ── Build ──

    /// Build one Dockerfile target and tag the result.
    pub async fn build_target(
        &self,
        dockerfile: &Path,
        context: &Path,
        target: &str,
        tag: &str,
        build_args: &[(String, String)],
    ) -> Result<(), DockerError> {
        let mut cmd = vec![
            "build".to_owned(),
            "--file".to_owned(),
            path_str(dockerfile)?.to_owned(),
            "--target".to_owned(),
            target.to_owned(),
            "--tag".to_owned(),
            tag.to_owned(),
        ];
        for (name, value) in build_args {
            cmd.push("--build-arg".to_owned());
            cmd.push(format!("{name}={value}"));
        }
        cmd.push(path_str(context)?.to_owned());

        self.executor
            .exec_streaming(DOCKER, &cmd)
            .await
            .map_err(|e| DockerError::Command {
                action: "build",
                source: e,
            })
    }

    pub async fn remove_image(&self, reference: &str) -> Result<(), DockerError> {
        self.executor
            .exec(DOCKER, &args(["image", "rm", reference]))
            .await
            .map_err(|e| DockerError::Command {
                action: "image rm",
                source: e,
            })?;
        Ok(())
    }

    pub async fn tag(&self, source: &str, target: &str) -> Result<(), DockerError> {
        self.executor
            .exec(DOCKER, &args(["tag", source, target]))
            .await
            .map_err(|e| DockerError::Command {
                action: "tag",
                source: e,
            })?;
        Ok(())
    }

    // ── Registry ──

    /// Log in to a registry. The password is passed on stdin, never in args.
    pub async fn login(
        &self,
        server: &str,
        username: &str,
        password: &str,
    ) -> Result<(), DockerError> {
        self.executor
            .exec_with_stdin(
                DOCKER,
                &args(["login", server, "--username", username, "--password-stdin"]),
                password.as_bytes(),
            )
            .await
            .map_err(|e| DockerError::Command {
                action: "login",
                source: e,
            })?;
        Ok(())
    }

    pub async fn push(&self, reference: &str) -> Result<(), DockerError> {
        self.executor
            .exec(DOCKER, &args(["push", reference]))
            .await
            .map_err(|e| DockerError::Command {
                action: "push",
                source: e,
            })?;
        Ok(())
    }
}

impl<E: ToolExecutor> StageRunner for DockerClient<E> {
    async fn run_stage(&self, request: &StageRequest<'_>) -> Result<(), DockerError> {
        self.build_target(
            &request.source.dockerfile,
            &request.source.context_dir,
            &request.stage.target,
            &request.reference,
            &request.build_args,
        )
        .await
    }

    async fn discard(&self, artifact: &Artifact) -> Result<(), DockerError> {
        self.remove_image(&artifact.reference).await
    }
}

// ── Helper ──

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

fn path_str(path: &Path) -> Result<&str, DockerError> {
    path.to_str()
        .ok_or_else(|| DockerError::InvalidPath(path.to_path_buf()))
}

#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("docker {action} failed")]
    Command {
        action: &'static str,
        source: ToolError,
    },
}
