use std::sync::Arc;

use dockwright_build::executor::{RealExecutor, ToolExecutor};
use dockwright_build::{Artifact, DockerClient, DockerError};
use secrecy::ExposeSecret;

use crate::dispatch::{ReleasePlan, SkippedTarget};

/// Failure of one `(target, reference)` push.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Shared by every reference of the target whose login failed
    #[error("login to {server} failed")]
    Login {
        server: String,
        source: Arc<DockerError>,
    },
    #[error("failed to tag {reference}")]
    Tag {
        reference: String,
        source: DockerError,
    },
    #[error("failed to push {reference}")]
    Push {
        reference: String,
        source: DockerError,
    },
}

#[derive(Debug)]
pub struct PushRecord {
    pub target: String,
    pub reference: String,
    pub result: Result<(), PushError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    /// Nothing was meant to be published (pull request)
    BuildOnly,
    /// Every planned push succeeded
    Published,
    /// At least one push failed; the others were still attempted
    Degraded,
}

#[derive(Debug)]
pub struct PublishReport {
    pub publish: bool,
    pub records: Vec<PushRecord>,
    pub skipped: Vec<SkippedTarget>,
}

impl PublishReport {
    pub fn status(&self) -> ReleaseStatus {
        if !self.publish {
            ReleaseStatus::BuildOnly
        } else if self.records.iter().any(|r| r.result.is_err()) {
            ReleaseStatus::Degraded
        } else {
            ReleaseStatus::Published
        }
    }

    pub fn pushed(&self) -> impl Iterator<Item = &PushRecord> {
        self.records.iter().filter(|r| r.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PushRecord> {
        self.records.iter().filter(|r| r.result.is_err())
    }

    /// `Err` when the run is degraded.
    pub fn into_result(self) -> Result<Self, PublishError> {
        if self.status() != ReleaseStatus::Degraded {
            return Ok(self);
        }
        let failed = self
            .failures()
            .map(|r| format!("{} ({})", r.reference, r.target))
            .collect();
        Err(PublishError {
            failed,
            attempted: self.records.len(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{} of {attempted} pushes failed: {}", failed.len(), failed.join(", "))]
pub struct PublishError {
    pub failed: Vec<String>,
    pub attempted: usize,
}

/// Pushes a built artifact to every destination of a plan.
pub struct Publisher<E: ToolExecutor = RealExecutor> {
    docker: DockerClient<E>,
}

impl Publisher<RealExecutor> {
    pub fn new() -> Self {
        Self {
            docker: DockerClient::new(),
        }
    }
}

impl Default for Publisher<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ToolExecutor> Publisher<E> {
    pub fn with_client(docker: DockerClient<E>) -> Self {
        Self { docker }
    }

    /// Attempt every planned push. A failure is recorded against its
    /// `(target, reference)` pair and does not stop the rest.
    pub async fn publish(&self, plan: &ReleasePlan, artifact: &Artifact) -> PublishReport {
        let mut records = Vec::with_capacity(plan.push_count());

        if plan.publish {
            for destination in &plan.destinations {
                if let Some(creds) = &destination.credentials {
                    let login = self
                        .docker
                        .login(
                            &creds.server,
                            &creds.username,
                            creds.password.expose_secret(),
                        )
                        .await;
                    if let Err(e) = login {
                        tracing::error!(
                            registry = %destination.target,
                            server = %creds.server,
                            error = %e,
                            "registry login failed"
                        );
                        let source = Arc::new(e);
                        records.extend(destination.references.iter().map(|reference| {
                            PushRecord {
                                target: destination.target.clone(),
                                reference: reference.clone(),
                                result: Err(PushError::Login {
                                    server: creds.server.clone(),
                                    source: Arc::clone(&source),
                                }),
                            }
                        }));
                        continue;
                    }
                }

                for reference in &destination.references {
                    let result = self.push_one(&artifact.reference, reference).await;
                    match &result {
                        Ok(()) => {
                            tracing::info!(registry = %destination.target, %reference, "pushed")
                        }
                        Err(e) => tracing::error!(
                            registry = %destination.target,
                            %reference,
                            error = %e,
                            "push failed"
                        ),
                    }
                    records.push(PushRecord {
                        target: destination.target.clone(),
                        reference: reference.clone(),
                        result,
                    });
                }
            }
        }

        PublishReport {
            publish: plan.publish,
            records,
            skipped: plan.skipped.clone(),
        }
    }

    async fn push_one(&self, local: &str, reference: &str) -> Result<(), PushError> {
        self.docker
            .tag(local, reference)
            .await
            .map_err(|e| PushError::Tag {
                reference: reference.to_owned(),
                source: e,
            })?;
        self.docker
            .push(reference)
            .await
            .map_err(|e| PushError::Push {
                reference: reference.to_owned(),
                source: e,
            })
    }
}
