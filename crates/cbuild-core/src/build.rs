//! Build service traits and run types.
//!
//! The launcher talks to the build service, its log store and the source
//! bucket through these traits so backends can be swapped out in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// Prefix of the log group every CodeBuild project writes to.
pub const LOG_GROUP_PREFIX: &str = "/aws/codebuild/";

/// Request to start a build from an uploaded source archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartBuildRequest {
    /// Project name or ARN.
    pub project: String,
    /// `<bucket>/<key>` of the source archive.
    pub source_location: String,
    /// Build spec to use instead of the project's own.
    pub buildspec_override: Option<String>,
}

/// A started build and where its logs end up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildHandle {
    pub build_id: String,
    pub log_group: String,
    pub log_stream: String,
}

impl BuildHandle {
    /// Derive the log location from a project and a build id of the form `<project>:<uuid>`.
    pub fn new(project: &str, build_id: impl Into<String>) -> Result<Self> {
        let build_id = build_id.into();
        let log_stream = build_id
            .split_once(':')
            .map(|(_, stream)| stream.to_string())
            .filter(|stream| !stream.is_empty())
            .ok_or_else(|| Error::InvalidInput(format!("malformed build id: {}", build_id)))?;

        Ok(Self {
            log_group: format!("{}{}", LOG_GROUP_PREFIX, project_name(project)),
            log_stream,
            build_id,
        })
    }
}

/// Project name from either a bare name or a project ARN.
pub fn project_name(project: &str) -> &str {
    match project.strip_prefix("arn:") {
        Some(_) => project
            .rsplit_once(":project/")
            .map(|(_, name)| name)
            .unwrap_or(project),
        None => project,
    }
}

/// Final or current status of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    InProgress,
    Succeeded,
    Failed,
    Fault,
    TimedOut,
    Stopped,
}

impl BuildStatus {
    pub fn is_success(self) -> bool {
        matches!(self, BuildStatus::Succeeded)
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::InProgress => write!(f, "in_progress"),
            BuildStatus::Succeeded => write!(f, "succeeded"),
            BuildStatus::Failed => write!(f, "failed"),
            BuildStatus::Fault => write!(f, "fault"),
            BuildStatus::TimedOut => write!(f, "timed_out"),
            BuildStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot of a build as reported by the build service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    pub build_id: String,
    /// Whether the build has finished, including its post-build steps.
    pub complete: bool,
    pub status: BuildStatus,
}

/// One line of build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// A page of log events and the token for the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPage {
    pub events: Vec<LogEvent>,
    pub next_token: Option<String>,
}

/// Trait for the managed build service.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Name of this backend.
    fn name(&self) -> &'static str;

    /// Start a build and return its id.
    async fn start_build(&self, request: StartBuildRequest) -> Result<String>;

    /// Current state of a build.
    async fn build_state(&self, build_id: &str) -> Result<BuildState>;
}

/// Trait for reading build logs page by page.
#[async_trait]
pub trait LogReader: Send + Sync {
    /// Read the page after `next_token`, or the first page.
    ///
    /// A log group or stream that does not exist yet yields an empty page.
    async fn read_logs(
        &self,
        group: &str,
        stream: &str,
        next_token: Option<&str>,
    ) -> Result<LogPage>;
}

/// Trait for the store that holds uploaded source archives.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Upload a file and return its location.
    async fn upload(&self, bucket: &str, key: &str, path: &Path) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_from_project_name() {
        let handle = BuildHandle::new("Build-abc", "Build-abc:1234-5678").unwrap();
        assert_eq!(handle.log_group, "/aws/codebuild/Build-abc");
        assert_eq!(handle.log_stream, "1234-5678");
        assert_eq!(handle.build_id, "Build-abc:1234-5678");
    }

    #[test]
    fn test_handle_from_project_arn() {
        let arn = "arn:aws:codebuild:us-east-1:123456789012:project/Build-abc";
        let handle = BuildHandle::new(arn, "Build-abc:42").unwrap();
        assert_eq!(handle.log_group, "/aws/codebuild/Build-abc");
        assert_eq!(handle.log_stream, "42");
    }

    #[test]
    fn test_malformed_build_id() {
        assert!(matches!(
            BuildHandle::new("Build", "no-separator"),
            Err(Error::InvalidInput(_))
        ));
        assert!(BuildHandle::new("Build", "Build:").is_err());
    }

    #[test]
    fn test_project_name() {
        assert_eq!(project_name("Build"), "Build");
        assert_eq!(
            project_name("arn:aws:codebuild:eu-west-1:1:project/Deploy"),
            "Deploy"
        );
    }

    #[test]
    fn test_status_success() {
        assert!(BuildStatus::Succeeded.is_success());
        assert!(!BuildStatus::Failed.is_success());
        assert_eq!(BuildStatus::TimedOut.to_string(), "timed_out");
    }
}
