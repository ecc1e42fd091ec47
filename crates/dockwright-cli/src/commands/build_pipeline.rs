use std::path::Path;

use dockwright_build::dockerfile::DockerfileGenerator;
use dockwright_build::{Artifact, DockerClient, Pipeline, context, eject as eject_mod};
use dockwright_core::variables::parse_assignment;
use dockwright_core::{ConfigurationSet, DockwrightConfig, ProjectLayout, Scope, Source, resolve};

/// The process environment, read once per invocation.
pub(crate) struct EnvSnapshot(Vec<(String, String)>);

impl EnvSnapshot {
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            // arch-lint: allow(no-silent-result-drop) reason="non-UTF-8 entries cannot be configuration values"
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self(vars)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Overrides, then `.env`, then the environment snapshot.
pub(crate) fn sources(
    project_dir: &Path,
    overrides: &[String],
    env: &EnvSnapshot,
) -> anyhow::Result<Vec<Source>> {
    let overrides = overrides
        .iter()
        .map(|s| parse_assignment(s))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(vec![
        Source::overrides(overrides),
        Source::dotenv(&project_dir.join(".env"))?,
        Source::environment(env.pairs()),
    ])
}

/// Loaded project with validated configuration values.
pub(crate) struct Prepared {
    pub config: DockwrightConfig,
    pub values: ConfigurationSet,
}

/// Load `dockwright.toml` and resolve every declared value. Fails with a
/// `ValidationError` listing all problems before anything is built.
pub(crate) fn prepare(
    project_dir: &Path,
    overrides: &[String],
    env: &EnvSnapshot,
) -> anyhow::Result<Prepared> {
    let config = DockwrightConfig::load(project_dir)?;
    let specs = config.variable_specs();
    let values = resolve(&specs, &sources(project_dir, overrides, env)?)?;
    Ok(Prepared { config, values })
}

/// Render (or load the ejected) Dockerfile, stage the context, and run
/// the standard stage pipeline. Returns the runner artifact.
pub(crate) async fn run(
    project_dir: &Path,
    prepared: &Prepared,
    docker: &DockerClient,
) -> anyhow::Result<Artifact> {
    let config = &prepared.config;
    let layout = ProjectLayout::inspect(project_dir, &config.app)?;

    let dockerfile = if eject_mod::is_ejected(project_dir) {
        println!("Using ejected Dockerfile from .dockwright/Dockerfile");
        eject_mod::load_ejected_dockerfile(project_dir)?
    } else {
        let specs = config.variable_specs();
        DockerfileGenerator::new(&config.build, &config.app, &layout, &specs).render()
    };

    println!("Staging build context from {}...", layout.app_dir.display());
    let source = context::create_context(&layout, &dockerfile)?;

    let bound: Vec<String> = prepared
        .values
        .scoped(Scope::Build)
        .map(|v| v.name.clone())
        .collect();
    let timeout = config
        .build
        .stage_timeout_secs
        .map(std::time::Duration::from_secs);

    println!("Building {}...", config.project.name);
    let artifact = Pipeline::standard(bound)
        .run(docker, &prepared.values, &source, &config.project.name, timeout)
        .await?;
    println!("Built {} ({})", artifact.reference, artifact.short_id());
    Ok(artifact)
}
