//! AWS backends for the build service traits.

use std::path::Path;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatchlogs::operation::get_log_events::GetLogEventsError;
use aws_sdk_codebuild::types::{Build, SourceType, StatusType};
use aws_sdk_s3::primitives::ByteStream;
use cbuild_core::build::{
    BuildService, BuildState, BuildStatus, LogEvent, LogPage, LogReader, SourceStore,
    StartBuildRequest,
};
use cbuild_core::{Error, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Load the shared SDK configuration from the default provider chain.
pub async fn load_sdk_config() -> SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await
}

fn sdk_error(operation: &str, err: impl std::error::Error + 'static) -> Error {
    Error::ExecutionFailed(format!(
        "{} failed: {}",
        operation,
        error_chain(&err)
    ))
}

/// Flatten an SDK error and its sources into one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

pub struct CodeBuildService {
    client: aws_sdk_codebuild::Client,
}

impl CodeBuildService {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_codebuild::Client::new(config),
        }
    }
}

fn build_status(status: &StatusType) -> BuildStatus {
    match status {
        StatusType::Succeeded => BuildStatus::Succeeded,
        StatusType::Failed => BuildStatus::Failed,
        StatusType::Fault => BuildStatus::Fault,
        StatusType::TimedOut => BuildStatus::TimedOut,
        StatusType::Stopped => BuildStatus::Stopped,
        _ => BuildStatus::InProgress,
    }
}

/// Id of the build returned by StartBuild.
fn started_build_id(build: Option<&Build>) -> Result<String> {
    build
        .and_then(|build| build.id())
        .map(str::to_string)
        .ok_or_else(|| Error::ExecutionFailed("StartBuild returned no build id".to_string()))
}

fn to_build_state(build_id: &str, build: &Build) -> BuildState {
    BuildState {
        build_id: build_id.to_string(),
        complete: build.build_complete(),
        status: build
            .build_status()
            .map(build_status)
            .unwrap_or(BuildStatus::InProgress),
    }
}

#[async_trait]
impl BuildService for CodeBuildService {
    fn name(&self) -> &'static str {
        "codebuild"
    }

    async fn start_build(&self, request: StartBuildRequest) -> Result<String> {
        let output = self
            .client
            .start_build()
            .project_name(&request.project)
            .source_type_override(SourceType::S3)
            .source_location_override(&request.source_location)
            .set_buildspec_override(request.buildspec_override)
            .send()
            .await
            .map_err(|e| sdk_error("StartBuild", e))?;

        started_build_id(output.build_value())
    }

    async fn build_state(&self, build_id: &str) -> Result<BuildState> {
        let output = self
            .client
            .batch_get_builds()
            .ids(build_id)
            .send()
            .await
            .map_err(|e| sdk_error("BatchGetBuilds", e))?;

        let build = output
            .builds()
            .first()
            .ok_or_else(|| Error::NotFound(format!("build {}", build_id)))?;

        Ok(to_build_state(build_id, build))
    }
}

pub struct CloudWatchLogReader {
    client: aws_sdk_cloudwatchlogs::Client,
}

impl CloudWatchLogReader {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudwatchlogs::Client::new(config),
        }
    }
}

#[async_trait]
impl LogReader for CloudWatchLogReader {
    async fn read_logs(
        &self,
        group: &str,
        stream: &str,
        next_token: Option<&str>,
    ) -> Result<LogPage> {
        debug!(group = %group, stream = %stream, "Reading logs");

        let result = self
            .client
            .get_log_events()
            .log_group_name(group)
            .log_stream_name(stream)
            .start_from_head(true)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                if matches!(
                    err.as_service_error(),
                    Some(GetLogEventsError::ResourceNotFoundException(_))
                ) {
                    debug!(group = %group, stream = %stream, "Log stream not found yet");
                    return Ok(LogPage {
                        events: Vec::new(),
                        next_token: next_token.map(str::to_string),
                    });
                }
                return Err(sdk_error("GetLogEvents", err));
            }
        };

        let events = output
            .events()
            .iter()
            .map(|event| LogEvent {
                timestamp: event
                    .timestamp()
                    .and_then(DateTime::<Utc>::from_timestamp_millis)
                    .unwrap_or_default(),
                message: event.message().unwrap_or_default().to_string(),
            })
            .collect();

        let next_token = output.next_forward_token().map(str::to_string);
        debug!(next_token = ?next_token, "Retrieved logs");

        Ok(LogPage { events, next_token })
    }
}

pub struct S3SourceStore {
    client: aws_sdk_s3::Client,
}

impl S3SourceStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl SourceStore for S3SourceStore {
    async fn upload(&self, bucket: &str, key: &str, path: &Path) -> Result<String> {
        debug!(bucket = %bucket, key = %key, path = %path.display(), "Uploading file");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("failed to read {}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| sdk_error("PutObject", e))?;

        Ok(format!("s3://{}/{}", bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(build_status(&StatusType::Succeeded), BuildStatus::Succeeded);
        assert_eq!(build_status(&StatusType::Fault), BuildStatus::Fault);
        assert_eq!(build_status(&StatusType::InProgress), BuildStatus::InProgress);
    }

    #[test]
    fn test_started_build_id() {
        let build = Build::builder().id("Build-abc:0f3c9a").build();
        assert_eq!(started_build_id(Some(&build)).unwrap(), "Build-abc:0f3c9a");

        let without_id = Build::builder().build();
        assert!(matches!(
            started_build_id(Some(&without_id)),
            Err(Error::ExecutionFailed(_))
        ));
        assert!(started_build_id(None).is_err());
    }

    #[test]
    fn test_build_state_mapping() {
        let running = Build::builder()
            .build_complete(false)
            .build_status(StatusType::InProgress)
            .build();
        let state = to_build_state("Build-abc:1", &running);
        assert!(!state.complete);
        assert_eq!(state.status, BuildStatus::InProgress);

        let failed = Build::builder()
            .build_complete(true)
            .build_status(StatusType::Failed)
            .build();
        let state = to_build_state("Build-abc:1", &failed);
        assert!(state.complete);
        assert_eq!(state.status, BuildStatus::Failed);
        assert_eq!(state.build_id, "Build-abc:1");

        let unknown = Build::builder().build();
        assert_eq!(
            to_build_state("Build-abc:1", &unknown).status,
            BuildStatus::InProgress
        );
    }

    #[test]
    fn test_error_context_includes_sources() {
        #[derive(Debug, thiserror::Error)]
        #[error("dispatch failure")]
        struct Dispatch(#[source] std::io::Error);

        let err = Dispatch(std::io::Error::other("connection reset"));
        assert_eq!(error_chain(&err), "dispatch failure: connection reset");
    }
}
