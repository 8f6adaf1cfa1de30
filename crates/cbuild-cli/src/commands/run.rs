//! Build launch command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use cbuild_config::LauncherConfig;
use cbuild_config::buildspec::load_buildspec_file;
use cbuild_core::resource::ProjectKind;
use cbuild_launcher::aws::{CloudWatchLogReader, CodeBuildService, S3SourceStore, load_sdk_config};
use cbuild_launcher::{Launcher, RunParams};
use tracing::info;

/// Package the working directory, run it on `project` and stream the logs.
pub async fn run(
    config: &LauncherConfig,
    project: ProjectKind,
    ignore_file: Option<PathBuf>,
    buildspec: Option<PathBuf>,
) -> Result<()> {
    let root = std::env::current_dir().context("Failed to resolve working directory")?;

    let mut params = RunParams::from_config(config, project, &root)
        .context("Failed to load launcher configuration")?;
    if let Some(path) = ignore_file {
        params = params.with_ignore_file(path);
    }
    if let Some(path) = buildspec {
        let spec = load_buildspec_file(&path)
            .with_context(|| format!("Failed to load buildspec: {}", path.display()))?;
        params = params.with_buildspec(spec);
    }

    info!(project = %project, target = %params.project, "Launching build");

    let sdk = load_sdk_config().await;
    let launcher = Launcher::new(
        Arc::new(CodeBuildService::new(&sdk)),
        Arc::new(CloudWatchLogReader::new(&sdk)),
        Arc::new(S3SourceStore::new(&sdk)),
    );

    let outcome = launcher
        .run(&params, &mut std::io::stdout())
        .await
        .context("Failed to run build")?;

    if !outcome.succeeded() {
        bail!(
            "build {} finished with status {}",
            outcome.build_id,
            outcome.status
        );
    }

    info!(build_id = %outcome.build_id, lines = outcome.lines, "Build succeeded");
    Ok(())
}
