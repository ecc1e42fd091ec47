use std::path::Path;

const CONFIG_TEMPLATE: &str = r#"[project]
name = "webapp"
# default_branch = "main"

[app]
# dir = "app"
# manifest = "package.json"
# lockfile = "package-lock.json"
# port = 3000

[build]
# base_image = "node:20-alpine"
# runtime_image = "node:20-alpine"
# install_command = "npm ci"
# fallback_install_command = "npm install"
# build_command = "npm run build"
# start_command = ["npm", "start"]
# stage_timeout_secs = 900

# Declared values. Without any [[variables]] the built-in set is used:
# APP_CLIENT_ID (build, required), APP_API_URL (build, url),
# PORT, HOSTNAME, NODE_ENV, LOG_LEVEL (run).
#
# [[variables]]
# name = "APP_CLIENT_ID"
# scope = "build"
# required = true

[[registries]]
name = "ghcr"
repository = "ghcr.io/your-org/webapp"

# [[registries]]
# name = "dockerhub"
# repository = "your-org/webapp"
# auth = { username = "DOCKERHUB_USERNAME", password = "DOCKERHUB_TOKEN" }

[scan]
# scanner = "trivy"
# threshold = "medium"
# output = "trivy-results.sarif"
# upload_url = "https://findings.example.com/api/sarif"
# token_env = "FINDINGS_TOKEN"
"#;

const ENV_EXAMPLE: &str = r#"# Build-time values, baked into the image
APP_CLIENT_ID=your-client-id
APP_API_URL=https://api.example.com
"#;

/// Write `dockwright.toml` and `.env.example`, skipping files that exist.
pub fn init_project() -> anyhow::Result<()> {
    let mut created = Vec::new();

    for (name, content) in [
        (dockwright_core::config::CONFIG_FILE, CONFIG_TEMPLATE),
        (".env.example", ENV_EXAMPLE),
    ] {
        let path = Path::new(name);
        if path.exists() {
            eprintln!("{name} already exists, skipping");
        } else {
            std::fs::write(path, content)?;
            created.push(name);
        }
    }

    if created.is_empty() {
        println!("Nothing to create, already initialized.");
    } else {
        for f in &created {
            println!("Created {f}");
        }
    }

    println!();
    println!("Next steps:");
    println!();
    println!("  1. Configure build-time values:");
    println!("     cp .env.example .env");
    println!();
    println!("  2. Build the image:");
    println!("     dockwright build");
    println!();
    println!("  3. Generate CI workflows:");
    println!("     dockwright ci init");

    Ok(())
}
