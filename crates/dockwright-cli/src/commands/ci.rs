use std::path::Path;

use dockwright_core::{DockwrightConfig, Scope};
use dockwright_release::{AuthRequirement, RegistryTarget};

const PUBLISH_WORKFLOW_PATH: &str = ".github/workflows/docker-publish.yml";
const SCAN_WORKFLOW_PATH: &str = ".github/workflows/security-scan.yml";

/// Generate the publish and scan GitHub Actions workflows.
pub fn ci_init() -> anyhow::Result<()> {
    let project_dir = Path::new(".");

    // ── Guard: never overwrite ──
    for path in [PUBLISH_WORKFLOW_PATH, SCAN_WORKFLOW_PATH] {
        if Path::new(path).exists() {
            anyhow::bail!(
                "Workflow already exists at {path}, edit it directly or delete it to re-run ci init"
            );
        }
    }

    let config = DockwrightConfig::load(project_dir)?;
    let env = WorkflowEnv::from_config(&config);

    for (path, content) in [
        (PUBLISH_WORKFLOW_PATH, generate_publish_workflow(&config, &env)),
        (SCAN_WORKFLOW_PATH, generate_scan_workflow(&config, &env)),
    ] {
        let path = Path::new(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        println!("Generated: {}", path.display());
    }

    if !env.secrets.is_empty() {
        println!();
        println!("Add these repository secrets before the first run:");
        for name in &env.secrets {
            println!("  {name}");
        }
    }

    println!();
    println!("Push to main or a v*.*.* tag -> publish. Pull requests build only.");
    Ok(())
}

/// Secrets the workflows forward to dockwright as environment variables.
struct WorkflowEnv {
    /// Build-time values and registry credentials
    secrets: Vec<String>,
    /// The generated publish workflow logs in to ghcr.io with GITHUB_TOKEN
    ghcr_login: bool,
}

impl WorkflowEnv {
    fn from_config(config: &DockwrightConfig) -> Self {
        let mut secrets: Vec<String> = Vec::new();
        let mut add = |name: &str| {
            if !secrets.iter().any(|s| s == name) {
                secrets.push(name.to_owned());
            }
        };

        for spec in config.variable_specs() {
            if spec.scope == Scope::Build {
                add(&spec.name);
            }
        }

        let mut ghcr_login = false;
        for target in config.registries.iter().map(RegistryTarget::from) {
            match &target.auth {
                AuthRequirement::Credentials {
                    username, password, ..
                } => {
                    add(username);
                    add(password);
                }
                AuthRequirement::None => ghcr_login |= target.registry_host() == "ghcr.io",
            }
        }

        Self {
            secrets,
            ghcr_login,
        }
    }

    fn render(&self, extra: &[&str]) -> String {
        let mut out = String::new();
        for name in self.secrets.iter().map(String::as_str).chain(extra.iter().copied()) {
            out.push_str(&format!("          {name}: ${{{{ secrets.{name} }}}}\n"));
        }
        out
    }
}

fn generate_publish_workflow(config: &DockwrightConfig, env: &WorkflowEnv) -> String {
    let branch = &config.project.default_branch;
    let mut yaml = format!(
        r#"# Generated by: dockwright ci init
name: Docker Publish

on:
  push:
    branches: [{branch}]
    tags: ["v*.*.*"]
  pull_request:
    branches: [{branch}]
  workflow_dispatch:

jobs:
  release:
    runs-on: ubuntu-latest
    permissions:
      contents: read
      packages: write

    steps:
      - uses: actions/checkout@v4
"#
    );

    if env.ghcr_login {
        yaml.push_str(
            r#"
      - name: Log in to ghcr.io
        if: github.event_name != 'pull_request'
        uses: docker/login-action@v3
        with:
          registry: ghcr.io
          username: ${{ github.actor }}
          password: ${{ secrets.GITHUB_TOKEN }}
"#,
        );
    }

    yaml.push_str(INSTALL_STEPS);
    yaml.push_str(
        r#"
      - name: Build and publish
        run: dockwright release
        env:
"#,
    );
    yaml.push_str(&env.render(&[]));
    yaml
}

fn generate_scan_workflow(config: &DockwrightConfig, env: &WorkflowEnv) -> String {
    let branch = &config.project.default_branch;
    let output = &config.scan.output;
    let mut yaml = format!(
        r#"# Generated by: dockwright ci init
name: Security Scan

on:
  push:
    branches: [{branch}]
  pull_request:
    branches: [{branch}]
  schedule:
    - cron: "0 6 * * 1"
  workflow_dispatch:

jobs:
  scan:
    runs-on: ubuntu-latest
    permissions:
      contents: read
      security-events: write

    steps:
      - uses: actions/checkout@v4

      - name: Install trivy
        uses: aquasecurity/setup-trivy@v0.2.2
"#
    );

    yaml.push_str(INSTALL_STEPS);
    yaml.push_str(
        r#"
      - name: Scan image
        run: dockwright scan
        env:
"#,
    );
    let token_env = config.scan.token_env.as_str();
    let extra: &[&str] = if config.scan.upload_url.is_some() {
        &[token_env]
    } else {
        &[]
    };
    yaml.push_str(&env.render(extra));
    yaml.push_str(&format!(
        r#"
      - name: Upload SARIF
        if: always()
        uses: github/codeql-action/upload-sarif@v3
        with:
          sarif_file: {output}
"#
    ));
    yaml
}

const INSTALL_STEPS: &str = r#"
      - name: Install Rust
        uses: dtolnay/rust-toolchain@stable

      - name: Cache dockwright binary
        uses: actions/cache@v4
        with:
          path: ~/.cargo/bin/dockwright
          key: dockwright-cli-${{ runner.os }}

      - name: Install dockwright
        run: |
          if ! command -v dockwright &> /dev/null; then
            cargo install dockwright-cli
          fi
"#;
