mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dockwright",
    about = "Build, tag, publish, and scan container images for a web application"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and build the runner image
    Build {
        #[command(flatten)]
        values: ValueArgs,
        /// Also tag the final image as this reference
        #[arg(long)]
        tag: Option<String>,
    },
    /// Show resolved configuration values and where they came from
    Config {
        #[command(flatten)]
        values: ValueArgs,
    },
    /// Print the registry tags a git event would produce
    Tags {
        #[command(flatten)]
        event: EventArgs,
        /// Project directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Print as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Plan tags, build, and publish to every enabled registry
    Release {
        #[command(flatten)]
        event: EventArgs,
        #[command(flatten)]
        values: ValueArgs,
    },
    /// Build the image under the scan tag and report vulnerabilities as SARIF
    Scan {
        #[command(flatten)]
        values: ValueArgs,
        /// SARIF output path (overrides [scan].output)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Eject the generated Dockerfile for manual customization
    Eject {
        /// Project directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Write dockwright.toml and .env.example
    Init,
    /// Manage CI workflows
    Ci {
        #[command(subcommand)]
        action: CiAction,
    },
}

#[derive(Subcommand)]
enum CiAction {
    /// Generate GitHub Actions workflows for publishing and scanning
    Init,
}

/// Project directory and explicit value overrides.
#[derive(Args)]
struct ValueArgs {
    /// Project directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    /// Override a configuration value (NAME=VALUE, repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,
}

/// The git event being released. Defaults come from GitHub Actions.
#[derive(Args)]
struct EventArgs {
    /// push, pull_request, workflow_dispatch, or schedule
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    event: String,
    /// Fully qualified git ref (refs/heads/main, refs/tags/v1.2.3, refs/pull/42/merge)
    #[arg(long = "ref", env = "GITHUB_REF")]
    git_ref: String,
    /// Commit hash
    #[arg(long, env = "GITHUB_SHA")]
    sha: String,
}

impl From<EventArgs> for commands::EventInput {
    fn from(args: EventArgs) -> Self {
        Self {
            event: args.event,
            git_ref: args.git_ref,
            sha: args.sha,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(commands::exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Build { values, tag } => {
            commands::build(&values.dir, &values.set, tag.as_deref()).await?
        }
        Commands::Config { values } => commands::show_config(&values.dir, &values.set)?,
        Commands::Tags { event, dir, json } => commands::tags(&dir, &event.into(), json)?,
        Commands::Release { event, values } => {
            commands::release(&values.dir, &values.set, &event.into()).await?
        }
        Commands::Scan { values, output } => {
            commands::scan(&values.dir, &values.set, output.as_deref()).await?
        }
        Commands::Eject { dir } => commands::eject(&dir)?,
        Commands::Init => commands::init_project()?,
        Commands::Ci { action } => match action {
            CiAction::Init => commands::ci_init()?,
        },
    }
    Ok(())
}
