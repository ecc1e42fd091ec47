//! Ordered execution of Dockerfile stages.
//!
//! Each [`BuildStage`] produces exactly one [`Artifact`]. Stages run in the
//! order they are declared and may only consume artifacts of stages declared
//! before them, so the declaration order is always a valid topological order.
//!
//! A stage binds the build-time values it names plus everything bound by its
//! transitive dependencies. The artifact fingerprint covers those values, so
//! rebuilding with different build-time configuration yields a different
//! artifact instead of overwriting an existing one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use dockwright_core::ConfigurationSet;
use sha2::{Digest, Sha256};

use crate::docker::DockerError;

/// Dependency-only stage in the generated Dockerfile.
pub const DEPS_STAGE: &str = "deps";
/// Compile stage; the only one that binds build-time values.
pub const BUILDER_STAGE: &str = "builder";
/// Final deployable stage.
pub const RUNNER_STAGE: &str = "runner";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStage {
    pub name: String,
    /// Dockerfile target to build
    pub target: String,
    /// Stages whose artifacts this stage consumes
    pub depends_on: Vec<String>,
    /// Build-time configuration names bound at this stage
    pub binds: Vec<String>,
}

impl BuildStage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            target: name.to_owned(),
            depends_on: Vec::new(),
            binds: Vec::new(),
        }
    }

    pub fn after(mut self, stage: &str) -> Self {
        self.depends_on.push(stage.to_owned());
        self
    }

    pub fn binds<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binds.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn target(mut self, target: &str) -> Self {
        self.target = target.to_owned();
        self
    }
}

/// Output of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub stage: String,
    /// SHA-256 over the stage's inputs, hex encoded
    pub fingerprint: String,
    /// Local image reference holding the stage output
    pub reference: String,
}

impl Artifact {
    pub fn short_id(&self) -> &str {
        &self.fingerprint[..12.min(self.fingerprint.len())]
    }
}

/// Staged build context for a run.
#[derive(Debug, Clone)]
pub struct SourceTree {
    pub context_dir: PathBuf,
    pub dockerfile: PathBuf,
    /// Source revision, when known
    pub revision: Option<String>,
}

/// Everything a runner needs to produce one stage's artifact.
#[derive(Debug)]
pub struct StageRequest<'a> {
    pub stage: &'a BuildStage,
    pub inputs: Vec<&'a Artifact>,
    /// Bound values, sorted by name
    pub build_args: Vec<(String, String)>,
    /// Reference the produced image must be tagged with
    pub reference: String,
    pub source: &'a SourceTree,
}

/// Executes single stages. [`crate::DockerClient`] is the production runner.
#[allow(async_fn_in_trait)]
pub trait StageRunner {
    async fn run_stage(&self, request: &StageRequest<'_>) -> Result<(), DockerError>;

    /// Release an intermediate artifact once nothing consumes it.
    async fn discard(&self, artifact: &Artifact) -> Result<(), DockerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("pipeline has no stages")]
    EmptyPipeline,

    #[error("stage '{0}' is declared more than once")]
    DuplicateStage(String),

    #[error("stage '{stage}' depends on '{dependency}', which is not declared before it")]
    UnknownDependency { stage: String, dependency: String },

    #[error("stage '{stage}' binds '{name}', which has no resolved value")]
    UnboundValue { stage: String, name: String },

    #[error("stage '{stage}' failed")]
    StageFailed { stage: String, source: DockerError },

    #[error("stage '{stage}' did not finish within {secs}s")]
    Timeout { stage: String, secs: u64 },
}

/// A validated stage graph.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<BuildStage>,
}

impl Pipeline {
    pub fn new(stages: Vec<BuildStage>) -> Result<Self, BuildError> {
        if stages.is_empty() {
            return Err(BuildError::EmptyPipeline);
        }

        let mut declared = BTreeSet::new();
        for stage in &stages {
            for dep in &stage.depends_on {
                if !declared.contains(dep.as_str()) {
                    return Err(BuildError::UnknownDependency {
                        stage: stage.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            if !declared.insert(stage.name.as_str()) {
                return Err(BuildError::DuplicateStage(stage.name.clone()));
            }
        }

        Ok(Self { stages })
    }

    /// The three-stage chain matching the generated Dockerfile.
    pub fn standard<I, S>(build_values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stages: vec![
                BuildStage::new(DEPS_STAGE),
                BuildStage::new(BUILDER_STAGE)
                    .after(DEPS_STAGE)
                    .binds(build_values),
                BuildStage::new(RUNNER_STAGE).after(BUILDER_STAGE),
            ],
        }
    }

    pub fn stages(&self) -> &[BuildStage] {
        &self.stages
    }

    pub fn final_stage(&self) -> &BuildStage {
        // non-empty by construction
        &self.stages[self.stages.len() - 1]
    }

    /// Run every stage in order and return the final stage's artifact.
    ///
    /// Nothing runs unless every bound name resolves. The first failing
    /// stage aborts the run; there is no retry.
    pub async fn run<R: StageRunner>(
        &self,
        runner: &R,
        config: &ConfigurationSet,
        source: &SourceTree,
        image_name: &str,
        stage_timeout: Option<Duration>,
    ) -> Result<Artifact, BuildError> {
        for stage in &self.stages {
            if let Some(name) = stage.binds.iter().find(|n| !config.contains(n)) {
                return Err(BuildError::UnboundValue {
                    stage: stage.name.clone(),
                    name: name.clone(),
                });
            }
        }

        let bound = self.bound_names();
        let last_use = self.last_use();
        let final_index = self.stages.len() - 1;
        let mut artifacts: HashMap<&str, Artifact> = HashMap::new();

        for (index, stage) in self.stages.iter().enumerate() {
            let inputs: Vec<&Artifact> = stage
                .depends_on
                .iter()
                .filter_map(|dep| artifacts.get(dep.as_str()))
                .collect();
            let build_args: Vec<(String, String)> = bound[index]
                .iter()
                .filter_map(|name| config.get(name).map(|v| (name.clone(), v.to_owned())))
                .collect();

            let fingerprint = fingerprint(stage, source.revision.as_deref(), &inputs, &build_args);
            let reference = format!("{image_name}:{}-{}", stage.name, &fingerprint[..12]);

            let request = StageRequest {
                stage,
                inputs,
                build_args,
                reference: reference.clone(),
                source,
            };

            tracing::info!(stage = %stage.name, %reference, "running stage");
            let outcome = match stage_timeout {
                Some(limit) => tokio::time::timeout(limit, runner.run_stage(&request))
                    .await
                    .map_err(|_| BuildError::Timeout {
                        stage: stage.name.clone(),
                        secs: limit.as_secs(),
                    })
                    .and_then(|result| stage_result(stage, result)),
                None => stage_result(stage, runner.run_stage(&request).await),
            };
            if let Err(e) = outcome {
                // No partial run survives: drop every artifact built so far.
                for earlier in &self.stages[..index] {
                    if let Some(artifact) = artifacts.remove(earlier.name.as_str()) {
                        release(runner, &artifact).await;
                    }
                }
                return Err(e);
            }

            artifacts.insert(
                stage.name.as_str(),
                Artifact {
                    stage: stage.name.clone(),
                    fingerprint,
                    reference,
                },
            );

            for (done, last) in last_use.iter().enumerate() {
                if done != final_index && *last == index {
                    let name = self.stages[done].name.as_str();
                    if let Some(artifact) = artifacts.remove(name) {
                        release(runner, &artifact).await;
                    }
                }
            }
        }

        artifacts
            .remove(self.final_stage().name.as_str())
            .ok_or(BuildError::EmptyPipeline)
    }

    /// Names bound at each stage, including those inherited from dependencies.
    fn bound_names(&self) -> Vec<BTreeSet<String>> {
        let index: BTreeMap<&str, usize> = self
            .stages
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();

        let mut bound: Vec<BTreeSet<String>> = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let mut names: BTreeSet<String> = stage.binds.iter().cloned().collect();
            for dep in &stage.depends_on {
                if let Some(&i) = index.get(dep.as_str()) {
                    names.extend(bound[i].iter().cloned());
                }
            }
            bound.push(names);
        }
        bound
    }

    /// Index of the last stage consuming each stage's artifact. Unconsumed
    /// artifacts are released as soon as they exist.
    fn last_use(&self) -> Vec<usize> {
        let mut last: Vec<usize> = (0..self.stages.len()).collect();
        for (i, stage) in self.stages.iter().enumerate() {
            for dep in &stage.depends_on {
                if let Some(j) = self.stages.iter().position(|s| &s.name == dep) {
                    last[j] = last[j].max(i);
                }
            }
        }
        last
    }
}

fn stage_result(stage: &BuildStage, result: Result<(), DockerError>) -> Result<(), BuildError> {
    result.map_err(|e| BuildError::StageFailed {
        stage: stage.name.clone(),
        source: e,
    })
}

async fn release<R: StageRunner>(runner: &R, artifact: &Artifact) {
    match runner.discard(artifact).await {
        Ok(()) => tracing::debug!(
            stage = %artifact.stage,
            reference = %artifact.reference,
            "discarded"
        ),
        Err(e) => tracing::warn!(
            stage = %artifact.stage,
            reference = %artifact.reference,
            error = %e,
            "failed to discard intermediate artifact"
        ),
    }
}

fn fingerprint(
    stage: &BuildStage,
    revision: Option<&str>,
    inputs: &[&Artifact],
    build_args: &[(String, String)],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"stage\0");
    hasher.update(stage.name.as_bytes());
    hasher.update(b"\0target\0");
    hasher.update(stage.target.as_bytes());
    hasher.update(b"\0revision\0");
    hasher.update(revision.unwrap_or_default().as_bytes());
    for input in inputs {
        hasher.update(b"\0input\0");
        hasher.update(input.fingerprint.as_bytes());
    }
    for (name, value) in build_args {
        hasher.update(b"\0arg\0");
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}
