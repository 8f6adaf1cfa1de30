//! cbuild CLI tool.

use std::path::PathBuf;

use anyhow::Context;
use cbuild_config::LauncherConfig;
use cbuild_core::resource::ProjectKind;
use cbuild_infra::{PermissionModel, SynthOptions};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::synth::Output;

#[derive(Parser)]
#[command(name = "cbuild", version)]
#[command(about = "Provision CodeBuild projects and run builds on them", long_about = None)]
struct Cli {
    /// Verbose mode
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ContextArgs {
    /// Context file; cbuild.kdl is used when present
    #[arg(long, env = "CBUILD_CONTEXT_FILE")]
    context_file: Option<PathBuf>,

    /// Context value as key=value, e.g. -c stage=dev
    #[arg(short = 'c', long = "context", value_name = "KEY=VALUE")]
    context: Vec<String>,
}

#[derive(Args)]
struct PermissionArgs {
    /// Permission model for the build roles
    #[arg(long, default_value = "scoped")]
    permissions: PermissionModel,

    /// Allow the broad model to attach AdministratorAccess to the Deploy role
    #[arg(long)]
    approve_admin_policy: bool,
}

impl PermissionArgs {
    fn options(&self) -> SynthOptions {
        SynthOptions {
            permissions: self.permissions,
            approve_admin_policy: self.approve_admin_policy,
            description: None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize the stack template
    Synth {
        #[command(flatten)]
        context: ContextArgs,

        #[command(flatten)]
        permissions: PermissionArgs,

        /// Output directory
        #[arg(long, default_value = "cbuild.out")]
        out: PathBuf,

        /// Print the template instead of writing it
        #[arg(long, conflicts_with = "out")]
        stdout: bool,
    },
    /// Resolve the context and check that the stack synthesizes
    Validate {
        #[command(flatten)]
        context: ContextArgs,

        #[command(flatten)]
        permissions: PermissionArgs,
    },
    /// Package the working directory and run it on a build project
    Run {
        /// Project to run
        #[arg(long, default_value = "build")]
        project: ProjectKind,

        /// Extra ignore file applied while packaging
        #[arg(long)]
        ignore_file: Option<PathBuf>,

        /// Build spec override; buildspec.yml is used when present
        #[arg(long)]
        buildspec: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let launcher_config = match cli.command {
        Commands::Run { .. } => Some(
            LauncherConfig::from_env().context("Failed to read launcher configuration")?,
        ),
        _ => None,
    };
    init_tracing(cli.verbose || launcher_config.as_ref().is_some_and(|c| c.debug));

    match cli.command {
        Commands::Synth {
            context,
            permissions,
            out,
            stdout,
        } => {
            let ctx = commands::resolve_context(context.context_file, context.context)?;
            let output = if stdout {
                Output::Stdout
            } else {
                Output::Dir(out)
            };
            commands::synth::synth(&ctx, &permissions.options(), output)?;
        }
        Commands::Validate {
            context,
            permissions,
        } => {
            let ctx = commands::resolve_context(context.context_file, context.context)?;
            commands::synth::validate(&ctx, &permissions.options())?;
        }
        Commands::Run {
            project,
            ignore_file,
            buildspec,
        } => {
            let config = launcher_config.unwrap_or_default();
            commands::run::run(&config, project, ignore_file, buildspec).await?;
        }
    }

    Ok(())
}
