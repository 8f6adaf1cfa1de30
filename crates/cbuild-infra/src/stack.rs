//! The builder stack: buckets, projects and the grants between them.

use std::path::{Path, PathBuf};

use cbuild_core::grant::{AccessLevel, GrantSet};
use cbuild_core::resource::{
    ArtifactBinding, BucketSpec, CacheBinding, ManagedPolicy, ProjectKind, ProjectSpec, RoleSpec,
};
use cbuild_core::template::{Template, get_att, ref_to};
use cbuild_core::{Result, StackContext, StackName};
use tracing::{debug, info};

use crate::permissions::{PermissionModel, SynthOptions};
use crate::render;

pub const SOURCE_BUCKET: &str = "Sources";
pub const ARTIFACT_BUCKET: &str = "Artifacts";
pub const CACHE_BUCKET: &str = "Cache";

pub const DEFAULT_DESCRIPTION: &str = "CodeBuild projects and buckets managed by cbuild";

/// Extension of a written template file.
pub const TEMPLATE_SUFFIX: &str = ".template.json";

/// A project together with its execution role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStack {
    pub kind: ProjectKind,
    pub role: RoleSpec,
    pub project: ProjectSpec,
}

/// Declared resources of one stack, before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBuilderStack {
    name: StackName,
    description: String,
    permissions: PermissionModel,
    source: BucketSpec,
    artifacts: BucketSpec,
    cache: BucketSpec,
    projects: Vec<ProjectStack>,
    grants: GrantSet,
}

impl CodeBuilderStack {
    pub fn new(context: &StackContext, options: &SynthOptions) -> Result<Self> {
        options.check()?;
        let name = context.stack_name()?;

        let source = BucketSpec::new(SOURCE_BUCKET)?;
        let artifacts = BucketSpec::new(ARTIFACT_BUCKET)?;
        let cache = BucketSpec::new(CACHE_BUCKET)?;

        let mut projects = Vec::with_capacity(ProjectKind::ALL.len());
        let mut grants = GrantSet::new();

        for kind in ProjectKind::ALL {
            let mut role = RoleSpec::for_project(kind.name())?;
            let mut project = ProjectSpec::new(kind.name(), &role)?;

            match options.permissions {
                PermissionModel::Scoped => {
                    project = project
                        .with_cache(CacheBinding {
                            bucket: cache.id.clone(),
                            prefix: Some(kind.name().to_string()),
                        })
                        .with_artifacts(ArtifactBinding {
                            bucket: artifacts.id.clone(),
                            path: Some(kind.name().to_string()),
                            zip: true,
                        });
                    grants.grant(&role.id, &source.id, AccessLevel::Read);
                    grants.grant(&role.id, &artifacts.id, AccessLevel::ReadWrite);
                    grants.grant(&role.id, &cache.id, AccessLevel::ReadWrite);
                }
                PermissionModel::Broad => {
                    for bucket in [&source, &artifacts, &cache] {
                        grants.grant(&role.id, &bucket.id, AccessLevel::ReadWrite);
                    }
                    if kind == ProjectKind::Deploy {
                        role.add_managed_policy(ManagedPolicy::administrator_access());
                    }
                }
            }

            debug!(project = %project.id, role = %role.id, "Declared project");
            projects.push(ProjectStack {
                kind,
                role,
                project,
            });
        }

        info!(
            stack = %name,
            permissions = %options.permissions,
            grants = grants.len(),
            "Declared stack"
        );

        Ok(Self {
            name,
            description: options
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            permissions: options.permissions,
            source,
            artifacts,
            cache,
            projects,
            grants,
        })
    }

    pub fn name(&self) -> &StackName {
        &self.name
    }

    pub fn permissions(&self) -> PermissionModel {
        self.permissions
    }

    pub fn buckets(&self) -> [&BucketSpec; 3] {
        [&self.source, &self.artifacts, &self.cache]
    }

    pub fn projects(&self) -> &[ProjectStack] {
        &self.projects
    }

    pub fn project(&self, kind: ProjectKind) -> Option<&ProjectStack> {
        self.projects.iter().find(|p| p.kind == kind)
    }

    pub fn grants(&self) -> &GrantSet {
        &self.grants
    }

    /// Render the declared resources into a template.
    pub fn to_template(&self) -> Result<Template> {
        let mut template = Template::new(Some(self.description.clone()));

        for bucket in self.buckets() {
            template.add_resource(bucket.id.clone(), render::bucket(bucket))?;
        }

        for entry in &self.projects {
            let grants: Vec<_> = self.grants.for_principal(&entry.role.id).collect();
            template.add_resource(entry.role.id.clone(), render::role(&entry.role))?;
            template.add_resource(
                entry.role.policy_id.clone(),
                render::role_policy(&entry.role, &entry.project, &grants),
            )?;
            template.add_resource(entry.project.id.clone(), render::project(&entry.project)?)?;
        }

        template.add_output(
            "SourceBucket",
            ref_to(&self.source.id),
            Some("Bucket receiving source archives".to_string()),
        )?;
        template.add_output(
            "ArtifactBucket",
            ref_to(&self.artifacts.id),
            Some("Bucket receiving build artifacts".to_string()),
        )?;
        template.add_output("CacheBucket", ref_to(&self.cache.id), None)?;

        for entry in &self.projects {
            template.add_output(
                format!("{}ProjectArn", entry.kind.name()),
                get_att(&entry.project.id, "Arn"),
                None,
            )?;
        }

        Ok(template)
    }
}

/// A rendered stack.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedStack {
    pub name: StackName,
    pub template: Template,
}

impl SynthesizedStack {
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, TEMPLATE_SUFFIX)
    }

    pub fn to_json(&self) -> Result<String> {
        self.template.to_json_pretty()
    }

    /// Write `<name>.template.json` into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let mut json = self.to_json()?;
        json.push('\n');
        std::fs::write(&path, json)?;
        info!(path = %path.display(), "Wrote template");
        Ok(path)
    }
}

/// Declare and render the stack for `context`.
pub fn synthesize(context: &StackContext, options: &SynthOptions) -> Result<SynthesizedStack> {
    let stack = CodeBuilderStack::new(context, options)?;
    let template = stack.to_template()?;
    info!(
        stack = %stack.name(),
        resources = template.resources.len(),
        "Synthesized stack"
    );
    Ok(SynthesizedStack {
        name: stack.name().clone(),
        template,
    })
}
