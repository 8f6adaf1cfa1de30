//! Launcher configuration read from environment variables.
//!
//! The values correspond to the outputs of a synthesized stack:
//! - `SOURCE_BUCKET` - bucket receiving source archives
//! - `ARTIFACT_BUCKET` - bucket receiving build artifacts
//! - `BUILD_PROJECT_ARN` - Build project name or ARN
//! - `DEPLOY_PROJECT_ARN` - Deploy project name or ARN
//! - `DEBUG` - enable debug logging

use crate::{ConfigError, ConfigResult};
use cbuild_core::resource::ProjectKind;
use serde::{Deserialize, Serialize};

pub const DEBUG_VAR: &str = "DEBUG";
pub const SOURCE_BUCKET_VAR: &str = "SOURCE_BUCKET";
pub const ARTIFACT_BUCKET_VAR: &str = "ARTIFACT_BUCKET";
pub const BUILD_PROJECT_VAR: &str = "BUILD_PROJECT_ARN";
pub const DEPLOY_PROJECT_VAR: &str = "DEPLOY_PROJECT_ARN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub debug: bool,
    pub source_bucket: Option<String>,
    pub artifact_bucket: Option<String>,
    pub build_project_arn: Option<String>,
    pub deploy_project_arn: Option<String>,
}

impl LauncherConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let debug = match get(DEBUG_VAR) {
            Some(raw) => parse_bool(DEBUG_VAR, &raw)?,
            None => false,
        };

        Ok(Self {
            debug,
            source_bucket: get(SOURCE_BUCKET_VAR),
            artifact_bucket: get(ARTIFACT_BUCKET_VAR),
            build_project_arn: get(BUILD_PROJECT_VAR),
            deploy_project_arn: get(DEPLOY_PROJECT_VAR),
        })
    }

    pub fn source_bucket(&self) -> ConfigResult<&str> {
        self.source_bucket
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField(SOURCE_BUCKET_VAR.to_string()))
    }

    /// Project name or ARN for one of the two projects.
    pub fn project(&self, kind: ProjectKind) -> ConfigResult<&str> {
        let (value, var) = match kind {
            ProjectKind::Build => (&self.build_project_arn, BUILD_PROJECT_VAR),
            ProjectKind::Deploy => (&self.deploy_project_arn, DEPLOY_PROJECT_VAR),
        };
        value
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField(var.to_string()))
    }
}

fn parse_bool(field: &str, raw: &str) -> ConfigResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("expected a boolean, got '{}'", raw),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_reads_all_values() {
        let cfg = LauncherConfig::from_lookup(lookup(&[
            ("DEBUG", "true"),
            ("SOURCE_BUCKET", "src-bucket"),
            ("ARTIFACT_BUCKET", "artifact-bucket"),
            ("BUILD_PROJECT_ARN", "Build-123"),
            ("DEPLOY_PROJECT_ARN", "Deploy-123"),
        ]))
        .unwrap();

        assert!(cfg.debug);
        assert_eq!(cfg.source_bucket().unwrap(), "src-bucket");
        assert_eq!(cfg.artifact_bucket.as_deref(), Some("artifact-bucket"));
        assert_eq!(cfg.project(ProjectKind::Build).unwrap(), "Build-123");
        assert_eq!(cfg.project(ProjectKind::Deploy).unwrap(), "Deploy-123");
    }

    #[test]
    fn test_missing_values_are_reported_on_use() {
        let cfg = LauncherConfig::from_lookup(lookup(&[("SOURCE_BUCKET", "")])).unwrap();

        assert!(!cfg.debug);
        match cfg.source_bucket() {
            Err(ConfigError::MissingField(field)) => assert_eq!(field, "SOURCE_BUCKET"),
            other => panic!("unexpected: {:?}", other),
        }
        match cfg.project(ProjectKind::Deploy) {
            Err(ConfigError::MissingField(field)) => assert_eq!(field, "DEPLOY_PROJECT_ARN"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_debug_flag() {
        let result = LauncherConfig::from_lookup(lookup(&[("DEBUG", "maybe")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
