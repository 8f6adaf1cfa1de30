//! Resource descriptors: buckets, roles and build projects.
//!
//! Descriptors are plain declarations of desired configuration. They are
//! constructed once per stack evaluation and rendered into a template
//! without further mutation.

use serde::{Deserialize, Serialize};

use crate::buildspec::BuildSpec;
use crate::{Error, LogicalId, Result};

/// Server-side encryption applied to a bucket.
///
/// Buckets are always encrypted; there is no unencrypted variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketEncryption {
    /// SSE-KMS with the account's AWS managed `aws/s3` key.
    KmsManaged,
}

impl BucketEncryption {
    pub fn sse_algorithm(self) -> &'static str {
        match self {
            BucketEncryption::KmsManaged => "aws:kms",
        }
    }
}

/// What happens to a resource when it leaves the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Retain,
}

impl RemovalPolicy {
    pub fn deletion_policy(self) -> &'static str {
        match self {
            RemovalPolicy::Retain => "Retain",
        }
    }
}

/// A storage bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub id: LogicalId,
    /// Construct name (e.g. "Sources").
    pub name: String,
    pub encryption: BucketEncryption,
    pub removal_policy: RemovalPolicy,
}

impl BucketSpec {
    /// A KMS-encrypted bucket that is retained on stack deletion.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Ok(Self {
            id: LogicalId::from_path(&[name.as_str(), "Resource"])?,
            name,
            encryption: BucketEncryption::KmsManaged,
            removal_policy: RemovalPolicy::Retain,
        })
    }
}

/// An AWS managed IAM policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedPolicy {
    pub name: String,
}

impl ManagedPolicy {
    pub const ADMINISTRATOR_ACCESS: &'static str = "AdministratorAccess";

    pub fn aws_managed(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn administrator_access() -> Self {
        Self::aws_managed(Self::ADMINISTRATOR_ACCESS)
    }
}

/// Execution role assumed by a build project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub id: LogicalId,
    /// Logical id of the inline policy carrying this role's grants.
    pub policy_id: LogicalId,
    /// Service principal allowed to assume the role.
    pub service_principal: String,
    pub managed_policies: Vec<ManagedPolicy>,
}

impl RoleSpec {
    pub const CODEBUILD_PRINCIPAL: &'static str = "codebuild.amazonaws.com";

    /// The role for the project named `project`.
    pub fn for_project(project: &str) -> Result<Self> {
        Ok(Self {
            id: LogicalId::from_path(&[project, "Role", "Resource"])?,
            policy_id: LogicalId::from_path(&[project, "Role", "DefaultPolicy", "Resource"])?,
            service_principal: Self::CODEBUILD_PRINCIPAL.to_string(),
            managed_policies: Vec::new(),
        })
    }

    /// Attach a managed policy; attaching the same policy twice is a no-op.
    pub fn add_managed_policy(&mut self, policy: ManagedPolicy) {
        if !self.managed_policies.contains(&policy) {
            self.managed_policies.push(policy);
        }
    }
}

/// Container image the build runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinuxBuildImage {
    /// `aws/codebuild/standard:2.0`
    Standard2_0,
}

impl LinuxBuildImage {
    pub fn image_id(&self) -> &str {
        match self {
            LinuxBuildImage::Standard2_0 => "aws/codebuild/standard:2.0",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeType {
    Small,
}

impl ComputeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ComputeType::Small => "BUILD_GENERAL1_SMALL",
        }
    }
}

/// Build environment of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    pub image: LinuxBuildImage,
    pub compute_type: ComputeType,
    /// Required for running the docker daemon inside the build.
    pub privileged: bool,
}

impl BuildEnvironment {
    /// Standard 2.0 image in privileged mode, able to run docker.
    pub fn docker() -> Self {
        Self {
            image: LinuxBuildImage::Standard2_0,
            compute_type: ComputeType::Small,
            privileged: true,
        }
    }
}

/// S3 cache used by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheBinding {
    pub bucket: LogicalId,
    /// Key prefix inside the bucket.
    pub prefix: Option<String>,
}

/// Where a project writes its build artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBinding {
    pub bucket: LogicalId,
    /// Path prefix inside the bucket.
    pub path: Option<String>,
    /// Zip the output before upload.
    pub zip: bool,
}

/// The two projects every stack declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Build,
    Deploy,
}

impl ProjectKind {
    pub const ALL: [ProjectKind; 2] = [ProjectKind::Build, ProjectKind::Deploy];

    /// Construct name of the project.
    pub fn name(self) -> &'static str {
        match self {
            ProjectKind::Build => "Build",
            ProjectKind::Deploy => "Deploy",
        }
    }
}

impl std::fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectKind::Build => write!(f, "build"),
            ProjectKind::Deploy => write!(f, "deploy"),
        }
    }
}

impl std::str::FromStr for ProjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "build" => Ok(ProjectKind::Build),
            "deploy" => Ok(ProjectKind::Deploy),
            other => Err(Error::InvalidInput(format!("unknown project: {}", other))),
        }
    }
}

/// A managed build project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub id: LogicalId,
    /// Construct name (e.g. "Build").
    pub name: String,
    /// Execution role id.
    pub role: LogicalId,
    pub environment: BuildEnvironment,
    pub build_spec: BuildSpec,
    pub cache: Option<CacheBinding>,
    pub artifacts: Option<ArtifactBinding>,
}

impl ProjectSpec {
    /// A docker-capable project running the default build spec.
    pub fn new(name: impl Into<String>, role: &RoleSpec) -> Result<Self> {
        let name = name.into();
        Ok(Self {
            id: LogicalId::from_path(&[name.as_str(), "Resource"])?,
            name,
            role: role.id.clone(),
            environment: BuildEnvironment::docker(),
            build_spec: BuildSpec::docker_ci(),
            cache: None,
            artifacts: None,
        })
    }

    pub fn with_cache(mut self, cache: CacheBinding) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactBinding) -> Self {
        self.artifacts = Some(artifacts);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_defaults_to_kms_and_retain() {
        let bucket = BucketSpec::new("Sources").unwrap();
        assert_eq!(bucket.encryption, BucketEncryption::KmsManaged);
        assert_eq!(bucket.encryption.sse_algorithm(), "aws:kms");
        assert_eq!(bucket.removal_policy.deletion_policy(), "Retain");
        assert!(bucket.id.as_str().starts_with("Sources"));
    }

    #[test]
    fn test_role_ids_are_scoped_to_project() {
        let build = RoleSpec::for_project("Build").unwrap();
        let deploy = RoleSpec::for_project("Deploy").unwrap();
        assert!(build.id.as_str().starts_with("BuildRole"));
        assert!(build.policy_id.as_str().starts_with("BuildRoleDefaultPolicy"));
        assert_ne!(build.id, deploy.id);
        assert_eq!(build.service_principal, "codebuild.amazonaws.com");
    }

    #[test]
    fn test_managed_policy_attach_is_idempotent() {
        let mut role = RoleSpec::for_project("Deploy").unwrap();
        role.add_managed_policy(ManagedPolicy::administrator_access());
        role.add_managed_policy(ManagedPolicy::administrator_access());
        assert_eq!(role.managed_policies.len(), 1);
    }

    #[test]
    fn test_project_defaults() {
        let role = RoleSpec::for_project("Build").unwrap();
        let project = ProjectSpec::new("Build", &role).unwrap();

        assert_eq!(project.role, role.id);
        assert!(project.environment.privileged);
        assert_eq!(
            project.environment.image.image_id(),
            "aws/codebuild/standard:2.0"
        );
        assert_eq!(project.build_spec.build_commands(), ["make ci"]);
        assert!(project.cache.is_none());
        assert!(project.artifacts.is_none());
    }

    #[test]
    fn test_project_kind_parsing() {
        assert_eq!("build".parse::<ProjectKind>().unwrap(), ProjectKind::Build);
        assert_eq!("Deploy".parse::<ProjectKind>().unwrap(), ProjectKind::Deploy);
        assert!("release".parse::<ProjectKind>().is_err());
        assert_eq!(ProjectKind::Deploy.name(), "Deploy");
    }

    #[test]
    fn test_project_bindings() {
        let role = RoleSpec::for_project("Build").unwrap();
        let bucket = BucketSpec::new("Cache").unwrap();
        let project = ProjectSpec::new("Build", &role)
            .unwrap()
            .with_cache(CacheBinding {
                bucket: bucket.id.clone(),
                prefix: Some("Build".to_string()),
            });

        assert_eq!(project.cache.unwrap().bucket, bucket.id);
    }
}
