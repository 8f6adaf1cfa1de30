//! Launch a build from the working directory and follow it to completion.

use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cbuild_config::LauncherConfig;
use cbuild_config::buildspec::load_buildspec;
use cbuild_core::build::{
    BuildHandle, BuildService, BuildStatus, LogEvent, LogReader, SourceStore, StartBuildRequest,
};
use cbuild_core::resource::ProjectKind;
use chrono::SecondsFormat;
use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::archive::build_archive;
use crate::{LauncherError, LauncherResult};

const DEDUPE_CAPACITY: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

/// Timing of the follow loop.
///
/// Completion is checked every `check_interval` whether or not logs are
/// flowing, so a build is given up on after `check_interval * max_checks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowSettings {
    /// Wait after a page that advanced the log token.
    pub poll_interval: Duration,
    /// Wait after a page with no new logs.
    pub idle_interval: Duration,
    /// Time between completion checks.
    pub check_interval: Duration,
    /// Completion checks before giving up.
    pub max_checks: u32,
    /// Lines remembered for duplicate suppression.
    pub dedupe_capacity: NonZeroUsize,
}

impl FollowSettings {
    /// Wall-clock time spent waiting before a build is given up on.
    pub fn budget(&self) -> Duration {
        self.check_interval * self.max_checks
    }
}

impl Default for FollowSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            idle_interval: Duration::from_secs(2),
            check_interval: Duration::from_secs(6),
            max_checks: 100,
            dedupe_capacity: DEDUPE_CAPACITY,
        }
    }
}

/// What to package and where to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    /// Project name or ARN.
    pub project: String,
    pub source_bucket: String,
    /// Directory packaged as the build source.
    pub root: PathBuf,
    pub ignore_file: Option<PathBuf>,
    pub buildspec: Option<String>,
}

impl RunParams {
    /// Parameters for running `kind` on the tree at `root`.
    ///
    /// A `buildspec.yml` in `root` becomes the build spec override.
    pub fn from_config(
        config: &LauncherConfig,
        kind: ProjectKind,
        root: impl Into<PathBuf>,
    ) -> LauncherResult<Self> {
        let root = root.into();
        Ok(Self {
            project: config.project(kind)?.to_string(),
            source_bucket: config.source_bucket()?.to_string(),
            buildspec: load_buildspec(&root)?,
            ignore_file: None,
            root,
        })
    }

    pub fn with_ignore_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ignore_file = Some(path.into());
        self
    }

    pub fn with_buildspec(mut self, buildspec: impl Into<String>) -> Self {
        self.buildspec = Some(buildspec.into());
        self
    }
}

/// Final result of a followed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub build_id: String,
    pub status: BuildStatus,
    /// Log lines written to the output.
    pub lines: usize,
}

impl BuildOutcome {
    pub fn succeeded(&self) -> bool {
        self.status.is_success()
    }
}

/// Packages sources, starts builds and follows their logs.
pub struct Launcher {
    builds: Arc<dyn BuildService>,
    logs: Arc<dyn LogReader>,
    store: Arc<dyn SourceStore>,
    settings: FollowSettings,
}

impl Launcher {
    pub fn new(
        builds: Arc<dyn BuildService>,
        logs: Arc<dyn LogReader>,
        store: Arc<dyn SourceStore>,
    ) -> Self {
        Self {
            builds,
            logs,
            store,
            settings: FollowSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: FollowSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Package, upload, start and follow one build.
    pub async fn run<W: Write>(&self, params: &RunParams, out: &mut W) -> LauncherResult<BuildOutcome> {
        let key = self
            .upload_source(&params.root, params.ignore_file.as_deref(), &params.source_bucket)
            .await?;

        let handle = self
            .start(
                &params.project,
                format!("{}/{}", params.source_bucket, key),
                params.buildspec.clone(),
            )
            .await?;

        self.follow(&handle, out).await
    }

    /// Zip `root` and upload it as `<uuid>.zip`, returning the key.
    pub async fn upload_source(
        &self,
        root: &Path,
        ignore_file: Option<&Path>,
        bucket: &str,
    ) -> LauncherResult<String> {
        let archive = build_archive(root, ignore_file)?;
        let key = format!("{}.zip", Uuid::new_v4());

        let location = self.store.upload(bucket, &key, archive.path()).await?;
        info!(location = %location, bytes = archive.content_bytes(), "Uploaded source archive");

        Ok(key)
    }

    pub async fn start(
        &self,
        project: &str,
        source_location: String,
        buildspec_override: Option<String>,
    ) -> LauncherResult<BuildHandle> {
        let build_id = self
            .builds
            .start_build(StartBuildRequest {
                project: project.to_string(),
                source_location,
                buildspec_override,
            })
            .await?;

        let handle = BuildHandle::new(project, build_id)?;
        info!(
            build_id = %handle.build_id,
            group = %handle.log_group,
            stream = %handle.log_stream,
            backend = self.builds.name(),
            "Created build"
        );
        Ok(handle)
    }

    /// Stream the build's logs to `out` until it completes.
    pub async fn follow<W: Write>(
        &self,
        handle: &BuildHandle,
        out: &mut W,
    ) -> LauncherResult<BuildOutcome> {
        let mut seen = LruCache::new(self.settings.dedupe_capacity);
        let mut token: Option<String> = None;
        let mut lines = 0;
        let mut checks = 0;

        info!(
            build_id = %handle.build_id,
            budget_secs = self.settings.budget().as_secs(),
            "Reading logs for build"
        );

        let mut next_check = Instant::now() + self.settings.check_interval;

        loop {
            let page = self
                .logs
                .read_logs(&handle.log_group, &handle.log_stream, token.as_deref())
                .await?;
            lines += write_events(&page.events, &mut seen, out)?;

            let wait = if advanced(&token, &page.next_token) {
                debug!(count = page.events.len(), "Log lines returned");
                token = page.next_token;
                self.settings.poll_interval
            } else {
                self.settings.idle_interval
            };

            let now = Instant::now();
            if now >= next_check {
                checks += 1;

                let state = self.builds.build_state(&handle.build_id).await?;
                if state.complete {
                    lines += self.drain(handle, token, &mut seen, out).await?;
                    info!(build_id = %handle.build_id, status = %state.status, "Finished build");
                    return Ok(BuildOutcome {
                        build_id: handle.build_id.clone(),
                        status: state.status,
                        lines,
                    });
                }

                if checks >= self.settings.max_checks {
                    warn!(build_id = %handle.build_id, checks, "Gave up waiting for build");
                    return Err(LauncherError::Timeout {
                        build_id: handle.build_id.clone(),
                        checks,
                    });
                }

                next_check = now + self.settings.check_interval;
            }

            // Never sleep past the next completion check.
            let until_check = next_check.saturating_duration_since(Instant::now());
            tokio::time::sleep(wait.min(until_check)).await;
        }
    }

    /// Read the remaining pages after the build completed.
    async fn drain<W: Write>(
        &self,
        handle: &BuildHandle,
        mut token: Option<String>,
        seen: &mut LruCache<String, ()>,
        out: &mut W,
    ) -> LauncherResult<usize> {
        let mut lines = 0;
        loop {
            let page = self
                .logs
                .read_logs(&handle.log_group, &handle.log_stream, token.as_deref())
                .await?;
            lines += write_events(&page.events, seen, out)?;

            if !advanced(&token, &page.next_token) {
                return Ok(lines);
            }
            token = page.next_token;
        }
    }
}

fn advanced(previous: &Option<String>, next: &Option<String>) -> bool {
    next.is_some() && next != previous
}

/// `ts=<RFC3339> msg=<message>`
pub fn format_line(event: &LogEvent) -> String {
    format!(
        "ts={} msg={}",
        event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        event.message.trim_end_matches(['\r', '\n'])
    )
}

/// Write lines not seen before, returning how many were written.
fn write_events<W: Write>(
    events: &[LogEvent],
    seen: &mut LruCache<String, ()>,
    out: &mut W,
) -> LauncherResult<usize> {
    let mut written = 0;
    for event in events {
        let line = format_line(event);
        if seen.put(line.clone(), ()).is_some() {
            debug!("Skipped duplicate line");
            continue;
        }
        writeln!(out, "{}", line)?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}
