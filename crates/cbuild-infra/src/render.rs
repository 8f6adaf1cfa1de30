//! Rendering of resource descriptors into template resources.

use cbuild_core::Result;
use cbuild_core::build::LOG_GROUP_PREFIX;
use cbuild_core::grant::Grant;
use cbuild_core::resource::{BucketSpec, ManagedPolicy, ProjectSpec, RoleSpec};
use cbuild_core::template::{Resource, get_att, join, pseudo, ref_to};
use serde_json::{Value, json};

pub const BUCKET_TYPE: &str = "AWS::S3::Bucket";
pub const ROLE_TYPE: &str = "AWS::IAM::Role";
pub const POLICY_TYPE: &str = "AWS::IAM::Policy";
pub const PROJECT_TYPE: &str = "AWS::CodeBuild::Project";

const POLICY_VERSION: &str = "2012-10-17";

pub fn bucket(spec: &BucketSpec) -> Resource {
    Resource::new(
        BUCKET_TYPE,
        json!({
            "BucketEncryption": {
                "ServerSideEncryptionConfiguration": [{
                    "ServerSideEncryptionByDefault": {
                        "SSEAlgorithm": spec.encryption.sse_algorithm()
                    }
                }]
            }
        }),
    )
    .with_removal_policy(spec.removal_policy.deletion_policy())
}

pub fn role(spec: &RoleSpec) -> Resource {
    let mut properties = json!({
        "AssumeRolePolicyDocument": {
            "Statement": [{
                "Action": "sts:AssumeRole",
                "Effect": "Allow",
                "Principal": { "Service": spec.service_principal }
            }],
            "Version": POLICY_VERSION
        }
    });

    if !spec.managed_policies.is_empty() {
        let arns: Vec<Value> = spec.managed_policies.iter().map(managed_policy_arn).collect();
        properties["ManagedPolicyArns"] = Value::Array(arns);
    }

    Resource::new(ROLE_TYPE, properties)
}

/// `arn:<partition>:iam::aws:policy/<name>`
pub fn managed_policy_arn(policy: &ManagedPolicy) -> Value {
    join(
        "",
        vec![
            json!("arn:"),
            pseudo("Partition"),
            json!(format!(":iam::aws:policy/{}", policy.name)),
        ],
    )
}

/// Inline policy carrying a role's bucket grants and log permissions.
pub fn role_policy(role: &RoleSpec, project: &ProjectSpec, grants: &[Grant]) -> Resource {
    let mut statements = vec![log_statement(project)];
    statements.extend(grants.iter().map(grant_statement));

    Resource::new(
        POLICY_TYPE,
        json!({
            "PolicyDocument": {
                "Statement": statements,
                "Version": POLICY_VERSION
            },
            "PolicyName": role.policy_id,
            "Roles": [ref_to(&role.id)]
        }),
    )
}

fn grant_statement(grant: &Grant) -> Value {
    json!({
        "Action": grant.level.s3_actions(),
        "Effect": "Allow",
        "Resource": [
            get_att(&grant.bucket, "Arn"),
            join("", vec![get_att(&grant.bucket, "Arn"), json!("/*")])
        ]
    })
}

fn log_statement(project: &ProjectSpec) -> Value {
    let log_group = join(
        "",
        vec![
            json!("arn:"),
            pseudo("Partition"),
            json!(":logs:"),
            pseudo("Region"),
            json!(":"),
            pseudo("AccountId"),
            json!(format!(":log-group:{}", LOG_GROUP_PREFIX)),
            ref_to(&project.id),
        ],
    );
    let log_streams = join("", vec![log_group.clone(), json!(":*")]);

    json!({
        "Action": ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
        "Effect": "Allow",
        "Resource": [log_group, log_streams]
    })
}

pub fn project(spec: &ProjectSpec) -> Result<Resource> {
    let artifacts = match &spec.artifacts {
        Some(binding) => {
            let mut artifacts = json!({
                "Type": "S3",
                "Location": ref_to(&binding.bucket),
                "Name": spec.name.to_lowercase(),
                "NamespaceType": "BUILD_ID",
                "Packaging": if binding.zip { "ZIP" } else { "NONE" }
            });
            if let Some(path) = &binding.path {
                artifacts["Path"] = json!(path);
            }
            artifacts
        }
        None => json!({ "Type": "NO_ARTIFACTS" }),
    };

    let cache = match &spec.cache {
        Some(binding) => {
            let location = match &binding.prefix {
                Some(prefix) => join("/", vec![ref_to(&binding.bucket), json!(prefix)]),
                None => ref_to(&binding.bucket),
            };
            json!({ "Type": "S3", "Location": location })
        }
        None => json!({ "Type": "NO_CACHE" }),
    };

    let properties = json!({
        "Artifacts": artifacts,
        "Cache": cache,
        "Environment": {
            "ComputeType": spec.environment.compute_type.as_str(),
            "Image": spec.environment.image.image_id(),
            "ImagePullCredentialsType": "CODEBUILD",
            "PrivilegedMode": spec.environment.privileged,
            "Type": "LINUX_CONTAINER"
        },
        "ServiceRole": get_att(&spec.role, "Arn"),
        "Source": {
            "BuildSpec": spec.build_spec.to_json()?,
            "Type": "NO_SOURCE"
        }
    });

    Ok(Resource::new(PROJECT_TYPE, properties).depends_on(spec.role.clone()))
}

/// Logical ids referenced through `Ref` or `Fn::GetAtt` anywhere in `value`.
#[cfg(test)]
pub(crate) fn references(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_references(value, &mut found);
    found.sort();
    found.dedup();
    found
}

#[cfg(test)]
fn collect_references(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("Ref") {
                if !target.starts_with("AWS::") {
                    found.push(target.clone());
                }
            }
            if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(target)) = parts.first() {
                    found.push(target.clone());
                }
            }
            for v in map.values() {
                collect_references(v, found);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, found);
            }
        }
        _ => {}
    }
}

/// Whether `id` is the target of any reference in `value`.
#[cfg(test)]
pub(crate) fn refers_to(value: &Value, id: &cbuild_core::LogicalId) -> bool {
    references(value).iter().any(|r| r == id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbuild_core::grant::AccessLevel;
    use cbuild_core::resource::{ArtifactBinding, CacheBinding};

    fn build_project() -> (RoleSpec, ProjectSpec, BucketSpec) {
        let role = RoleSpec::for_project("Build").unwrap();
        let cache = BucketSpec::new("Cache").unwrap();
        let project = ProjectSpec::new("Build", &role).unwrap();
        (role, project, cache)
    }

    #[test]
    fn test_bucket_is_encrypted_and_retained() {
        let resource = bucket(&BucketSpec::new("Sources").unwrap());
        assert_eq!(resource.resource_type, BUCKET_TYPE);
        assert_eq!(
            resource.properties["BucketEncryption"]["ServerSideEncryptionConfiguration"][0]
                ["ServerSideEncryptionByDefault"]["SSEAlgorithm"],
            "aws:kms"
        );
        assert_eq!(resource.deletion_policy.as_deref(), Some("Retain"));
    }

    #[test]
    fn test_role_trusts_codebuild() {
        let resource = role(&RoleSpec::for_project("Build").unwrap());
        let statement = &resource.properties["AssumeRolePolicyDocument"]["Statement"][0];
        assert_eq!(statement["Principal"]["Service"], "codebuild.amazonaws.com");
        assert!(resource.properties.get("ManagedPolicyArns").is_none());
    }

    #[test]
    fn test_role_with_managed_policy() {
        let mut spec = RoleSpec::for_project("Deploy").unwrap();
        spec.add_managed_policy(ManagedPolicy::administrator_access());
        let resource = role(&spec);
        let arn = &resource.properties["ManagedPolicyArns"][0]["Fn::Join"][1];
        assert_eq!(arn[2], ":iam::aws:policy/AdministratorAccess");
    }

    #[test]
    fn test_project_embeds_buildspec_and_environment() {
        let (role, project_spec, _) = build_project();
        let resource = project(&project_spec).unwrap();
        let props = &resource.properties;

        assert_eq!(props["Environment"]["Image"], "aws/codebuild/standard:2.0");
        assert_eq!(props["Environment"]["PrivilegedMode"], true);
        assert_eq!(props["Artifacts"]["Type"], "NO_ARTIFACTS");
        assert_eq!(props["Cache"]["Type"], "NO_CACHE");
        assert_eq!(resource.depends_on, vec![role.id.clone()]);

        let buildspec: Value =
            serde_json::from_str(props["Source"]["BuildSpec"].as_str().unwrap()).unwrap();
        assert_eq!(buildspec["phases"]["build"]["commands"], json!(["make ci"]));
        assert_eq!(
            buildspec["phases"]["install"]["runtime-versions"]["docker"],
            "18"
        );
    }

    #[test]
    fn test_project_bindings_render_as_s3() {
        let (_, project_spec, cache) = build_project();
        let project_spec = project_spec
            .with_cache(CacheBinding {
                bucket: cache.id.clone(),
                prefix: Some("Build".to_string()),
            })
            .with_artifacts(ArtifactBinding {
                bucket: cache.id.clone(),
                path: Some("Build".to_string()),
                zip: true,
            });

        let resource = project(&project_spec).unwrap();
        let props = &resource.properties;
        assert_eq!(props["Cache"]["Type"], "S3");
        assert_eq!(props["Artifacts"]["Type"], "S3");
        assert_eq!(props["Artifacts"]["Packaging"], "ZIP");
        assert_eq!(props["Artifacts"]["Path"], "Build");
        assert!(refers_to(&props["Cache"], &cache.id));
    }

    #[test]
    fn test_policy_statements() {
        let (role_spec, project_spec, cache) = build_project();
        let grants = vec![Grant {
            principal: role_spec.id.clone(),
            bucket: cache.id.clone(),
            level: AccessLevel::ReadWrite,
        }];

        let resource = role_policy(&role_spec, &project_spec, &grants);
        let statements = resource.properties["PolicyDocument"]["Statement"]
            .as_array()
            .unwrap();

        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0]["Action"][0], "logs:CreateLogGroup");
        assert!(refers_to(&statements[0], &project_spec.id));
        assert_eq!(statements[1]["Action"].as_array().unwrap().len(), 6);
        assert!(refers_to(&statements[1], &cache.id));
        assert_eq!(resource.properties["Roles"][0], ref_to(&role_spec.id));
    }

    #[test]
    fn test_references_skip_pseudo_parameters() {
        let value = json!({
            "a": { "Ref": "AWS::Region" },
            "b": [{ "Ref": "Sources" }, { "Fn::GetAtt": ["Artifacts", "Arn"] }],
            "c": { "Ref": "Sources" }
        });
        assert_eq!(references(&value), vec!["Artifacts", "Sources"]);
    }
}
