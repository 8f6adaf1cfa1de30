//! Stack naming and the evaluation context a stack is built from.

use derive_more::Display;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::{Error, Result};

/// Prefix of every stack name, and the whole name when no stage or branch is given.
pub const STACK_NAME_PREFIX: &str = "BuilderStack";

/// Context key holding the deployment stage.
pub const STAGE_KEY: &str = "stage";

/// Context key holding the source branch.
pub const BRANCH_KEY: &str = "branch";

const MAX_STACK_NAME_LEN: usize = 128;

static STACK_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").unwrap());

/// Name of the stack handed to the provisioning service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct StackName(String);

impl StackName {
    /// Validate a stack name against the provider's naming rules.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.len() > MAX_STACK_NAME_LEN {
            return Err(Error::InvalidInput(format!(
                "stack name exceeds {} characters: '{}'",
                MAX_STACK_NAME_LEN, name
            )));
        }
        if !STACK_NAME_REGEX.is_match(&name) {
            return Err(Error::InvalidInput(format!(
                "stack name must start with a letter and contain only letters, digits and hyphens: '{}'",
                name
            )));
        }
        Ok(Self(name))
    }

    /// The stack name used when no stage or branch is supplied.
    pub fn default_name() -> Self {
        Self(STACK_NAME_PREFIX.to_string())
    }

    /// Build `BuilderStack-<stage>-<branch>`, or the default name when both are absent.
    ///
    /// Supplying only one of the two identifiers is rejected.
    pub fn for_deployment(stage: Option<&str>, branch: Option<&str>) -> Result<Self> {
        match (stage, branch) {
            (None, None) => Ok(Self::default_name()),
            (Some(stage), Some(branch)) => {
                Self::new(format!("{}-{}-{}", STACK_NAME_PREFIX, stage, branch))
            }
            (Some(_), None) => Err(Error::InvalidInput(
                "context has a stage but no branch".to_string(),
            )),
            (None, Some(_)) => Err(Error::InvalidInput(
                "context has a branch but no stage".to_string(),
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Free-form key/value context a stack is evaluated with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackContext {
    values: BTreeMap<String, String>,
}

impl StackContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with just a stage and branch.
    pub fn for_branch(stage: impl Into<String>, branch: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.set(STAGE_KEY, stage);
        ctx.set(BRANCH_KEY, branch);
        ctx
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a value; empty strings count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn stage(&self) -> Option<&str> {
        self.get(STAGE_KEY)
    }

    pub fn branch(&self) -> Option<&str> {
        self.get(BRANCH_KEY)
    }

    /// Overlay `other` on top of this context; its values win.
    pub fn merge(&mut self, other: StackContext) {
        self.values.extend(other.values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve the stack name for this context.
    pub fn stack_name(&self) -> Result<StackName> {
        StackName::for_deployment(self.stage(), self.branch())
    }
}
