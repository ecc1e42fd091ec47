use std::path::Path;

use dockwright_build::DockerClient;

use super::build_pipeline::{self, EnvSnapshot};

pub async fn build(
    project_dir: &Path,
    overrides: &[String],
    tag: Option<&str>,
) -> anyhow::Result<()> {
    let env = EnvSnapshot::capture();
    let prepared = build_pipeline::prepare(project_dir, overrides, &env)?;

    let docker = DockerClient::new();
    let artifact = build_pipeline::run(project_dir, &prepared, &docker).await?;

    if let Some(tag) = tag {
        docker.tag(&artifact.reference, tag).await?;
        println!("Tagged {tag}");
    }
    Ok(())
}
