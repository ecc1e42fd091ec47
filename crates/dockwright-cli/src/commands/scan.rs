use std::path::Path;

use dockwright_build::DockerClient;
use dockwright_release::{FindingsUploader, Scanner, Severity, to_sarif, write_sarif};
use secrecy::SecretString;

use super::build_pipeline::{self, EnvSnapshot};

/// Build under the reserved scan tag, scan, write SARIF, and upload when
/// a findings store is configured.
///
/// The SARIF file is written before the upload is attempted, so a failed
/// upload never loses the report.
pub async fn scan(
    project_dir: &Path,
    overrides: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let env = EnvSnapshot::capture();
    let prepared = build_pipeline::prepare(project_dir, overrides, &env)?;
    let scan_config = &prepared.config.scan;
    let threshold = scan_config.threshold;

    let docker = DockerClient::new();
    let artifact = build_pipeline::run(project_dir, &prepared, &docker).await?;
    let image = format!("{}:{}", prepared.config.project.name, scan_config.tag);
    docker.tag(&artifact.reference, &image).await?;

    let report = Scanner::new(scan_config.scanner.as_str())
        .scan(&image, threshold)
        .await?;
    println!(
        "{} finding(s) at or above {threshold} ({} critical, {} high), {} below threshold",
        report.findings.len(),
        report.count(Severity::Critical),
        report.count(Severity::High),
        report.below_threshold
    );

    let sarif = to_sarif(&report, &scan_config.scanner);
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => project_dir.join(&scan_config.output),
    };
    write_sarif(&sarif, &path)?;
    println!("Wrote {}", path.display());

    if let Some(url) = &scan_config.upload_url {
        let token = env.get(&scan_config.token_env).map(SecretString::from);
        if token.is_none() {
            tracing::warn!(token_env = %scan_config.token_env, "uploading findings without a token");
        }
        FindingsUploader::new(url, token)?.upload(&sarif).await?;
        println!("Uploaded findings to {url}");
    }
    Ok(())
}
