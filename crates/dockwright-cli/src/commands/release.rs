use std::path::Path;

use dockwright_build::DockerClient;
use dockwright_release::{Publisher, RegistryTarget, ReleaseContext, ReleaseStatus, Secrets, plan};

use super::EventInput;
use super::build_pipeline::{self, EnvSnapshot};
use super::tags::tag_rules;

/// Plan → build → publish.
///
/// Tags and destinations are decided before the build starts, so an event
/// that cannot be mapped fails without building anything.
pub async fn release(
    project_dir: &Path,
    overrides: &[String],
    input: &EventInput,
) -> anyhow::Result<()> {
    let env = EnvSnapshot::capture();
    let prepared = build_pipeline::prepare(project_dir, overrides, &env)?;
    let config = &prepared.config;

    let context = ReleaseContext::parse(&input.event, &input.git_ref, &input.sha)?;
    let targets: Vec<RegistryTarget> =
        config.registries.iter().map(RegistryTarget::from).collect();
    let secrets = Secrets::from_pairs(env.pairs());
    let plan = plan(&context, &tag_rules(config), &targets, &secrets)?;

    let tag_list: Vec<&str> = plan.tags.iter().map(|t| t.as_str()).collect();
    println!("{}: tags {}", context.reference, tag_list.join(", "));
    for skipped in &plan.skipped {
        println!(
            "Skipping registry {} (missing {})",
            skipped.target,
            skipped.missing.join(", ")
        );
    }
    if plan.publish && plan.destinations.is_empty() {
        println!("No registry is enabled; the image will be built but not pushed.");
    }

    let docker = DockerClient::new();
    let artifact = build_pipeline::run(project_dir, &prepared, &docker).await?;

    let report = Publisher::with_client(docker).publish(&plan, &artifact).await;

    match report.status() {
        ReleaseStatus::BuildOnly => {
            println!("Build only: pull requests are never published.")
        }
        ReleaseStatus::Published => {
            println!("Published {} reference(s).", report.pushed().count())
        }
        ReleaseStatus::Degraded => {
            for record in report.failures() {
                if let Err(e) = &record.result {
                    eprintln!("  failed: {} ({}): {e}", record.reference, record.target);
                }
            }
        }
    }
    report.into_result()?;
    Ok(())
}
