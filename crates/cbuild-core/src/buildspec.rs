//! The build step specification embedded in build projects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Result;

pub const BUILDSPEC_VERSION: &str = "0.2";

/// Docker runtime installed by the install phase.
pub const DOCKER_RUNTIME: &str = "docker";
pub const DOCKER_RUNTIME_VERSION: &str = "18";

/// The single command run by the build phase.
pub const CI_COMMAND: &str = "make ci";

/// A CodeBuild build spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub version: String,
    pub phases: Phases,
}

/// Ordered build phases. Serialized in install, build order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phases {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<CommandPhase>,
}

/// Install phase selecting runtime versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPhase {
    #[serde(rename = "runtime-versions")]
    pub runtime_versions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
}

/// A phase that runs shell commands in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPhase {
    pub commands: Vec<String>,
}

impl BuildSpec {
    /// Install the docker runtime, then run `make ci`.
    pub fn docker_ci() -> Self {
        let mut runtime_versions = BTreeMap::new();
        runtime_versions.insert(
            DOCKER_RUNTIME.to_string(),
            DOCKER_RUNTIME_VERSION.to_string(),
        );

        Self {
            version: BUILDSPEC_VERSION.to_string(),
            phases: Phases {
                install: Some(InstallPhase {
                    runtime_versions,
                    commands: Vec::new(),
                }),
                build: Some(CommandPhase {
                    commands: vec![CI_COMMAND.to_string()],
                }),
            },
        }
    }

    /// Commands of the build phase.
    pub fn build_commands(&self) -> &[String] {
        self.phases
            .build
            .as_ref()
            .map(|p| p.commands.as_slice())
            .unwrap_or_default()
    }

    /// Compact JSON, as embedded in the project's `Source.BuildSpec` property.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self::docker_ci()
    }
}
