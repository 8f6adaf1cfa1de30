//! Stack context parsing.
//!
//! A context file looks like:
//!
//! ```kdl
//! context {
//!     stage "dev"
//!     branch "master"
//! }
//! ```
//!
//! Properties on the `context` node (`context stage="dev"`) are accepted as
//! well. Command-line overrides of the form `key=value` are applied on top.

use crate::{ConfigError, ConfigResult};
use cbuild_core::StackContext;
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Context file looked up in the working directory when none is given.
pub const DEFAULT_CONTEXT_FILE: &str = "cbuild.kdl";

/// Parse the `context` node of a KDL document.
pub fn parse_context(kdl: &str) -> ConfigResult<StackContext> {
    let doc: KdlDocument = kdl.parse()?;

    let mut ctx = StackContext::new();
    let mut seen = BTreeSet::new();
    let mut insert = |key: String, value: String| -> ConfigResult<()> {
        if !seen.insert(key.clone()) {
            return Err(ConfigError::Duplicate(format!("context key '{}'", key)));
        }
        ctx.set(key, value);
        Ok(())
    };

    for node in doc.nodes() {
        if node.name().value() != "context" {
            continue; // Ignore unknown nodes
        }

        for entry in node.entries() {
            if let Some(name) = entry.name() {
                let key = name.value().to_string();
                let value = value_to_string(&key, entry.value())?;
                insert(key, value)?;
            }
        }

        if let Some(children) = node.children() {
            for child in children.nodes() {
                let key = child.name().value().to_string();
                let value = first_arg(child, &key)?;
                insert(key, value)?;
            }
        }
    }

    Ok(ctx)
}

/// Load a context file. A missing file yields an empty context unless `required`.
pub fn load_context_file(path: &Path, required: bool) -> ConfigResult<StackContext> {
    if !required && !path.exists() {
        debug!(path = %path.display(), "No context file");
        return Ok(StackContext::new());
    }

    let content = std::fs::read_to_string(path)?;
    let ctx = parse_context(&content)?;
    debug!(path = %path.display(), "Loaded context file");
    Ok(ctx)
}

/// Parse a `key=value` override.
pub fn parse_override(raw: &str) -> ConfigResult<(String, String)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
        field: "context".to_string(),
        message: format!("expected key=value, got '{}'", raw),
    })?;

    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "context".to_string(),
            message: format!("empty key in '{}'", raw),
        });
    }

    Ok((key.to_string(), value.trim().to_string()))
}

/// Where a stack's context comes from, lowest precedence first.
#[derive(Debug, Clone)]
pub struct ContextSources {
    file: PathBuf,
    file_required: bool,
    overrides: Vec<String>,
}

impl Default for ContextSources {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextSources {
    /// The default context file (optional) and no overrides.
    pub fn new() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_CONTEXT_FILE),
            file_required: false,
            overrides: Vec::new(),
        }
    }

    /// Use an explicit context file, which must then exist.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = path.into();
        self.file_required = true;
        self
    }

    /// Look for the default context file in `dir`.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        if !self.file_required {
            self.file = dir.join(DEFAULT_CONTEXT_FILE);
        }
        self
    }

    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = String>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    /// Merge the file and the overrides into one context.
    pub fn resolve(&self) -> ConfigResult<StackContext> {
        let mut ctx = load_context_file(&self.file, self.file_required)?;

        let mut overrides = StackContext::new();
        for raw in &self.overrides {
            let (key, value) = parse_override(raw)?;
            overrides.set(key, value);
        }
        ctx.merge(overrides);

        Ok(ctx)
    }
}

fn first_arg(node: &KdlNode, key: &str) -> ConfigResult<String> {
    let entry = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .ok_or_else(|| ConfigError::MissingField(format!("value for context key '{}'", key)))?;
    value_to_string(key, entry.value())
}

fn value_to_string(key: &str, value: &KdlValue) -> ConfigResult<String> {
    match value {
        KdlValue::String(s) => Ok(s.clone()),
        KdlValue::Integer(i) => Ok(i.to_string()),
        KdlValue::Bool(b) => Ok(b.to_string()),
        _ => Err(ConfigError::InvalidValue {
            field: key.to_string(),
            message: "expected a string, integer or boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_context_children() {
        let kdl = r#"
            context {
                stage "dev"
                branch "master"
            }
        "#;

        let ctx = parse_context(kdl).unwrap();
        assert_eq!(ctx.stage(), Some("dev"));
        assert_eq!(ctx.branch(), Some("master"));
        assert_eq!(
            ctx.stack_name().unwrap().as_str(),
            "BuilderStack-dev-master"
        );
    }

    #[test]
    fn test_parse_context_properties() {
        let kdl = r#"context stage="prod" branch="main""#;

        let ctx = parse_context(kdl).unwrap();
        assert_eq!(ctx.stage(), Some("prod"));
        assert_eq!(ctx.branch(), Some("main"));
    }

    #[test]
    fn test_non_string_values_are_stringified() {
        let kdl = r#"
            context {
                stage "dev"
                build-number 42
            }
        "#;

        let ctx = parse_context(kdl).unwrap();
        assert_eq!(ctx.get("build-number"), Some("42"));
    }

    #[test]
    fn test_empty_document_gives_empty_context() {
        let ctx = parse_context("").unwrap();
        assert!(ctx.is_empty());
        assert_eq!(ctx.stack_name().unwrap().as_str(), "BuilderStack");
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let ctx = parse_context(r#"other "thing""#).unwrap();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let kdl = r#"
            context stage="dev" {
                stage "prod"
            }
        "#;

        assert!(matches!(
            parse_context(kdl),
            Err(ConfigError::Duplicate(_))
        ));
    }

    #[test]
    fn test_missing_value_is_rejected() {
        let kdl = r#"
            context {
                stage
            }
        "#;

        assert!(matches!(
            parse_context(kdl),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("stage=dev").unwrap(),
            ("stage".to_string(), "dev".to_string())
        );
        assert_eq!(
            parse_override("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_override("stage").is_err());
        assert!(parse_override("=dev").is_err());
    }

    #[test]
    fn test_sources_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONTEXT_FILE),
            "context {\n    stage \"dev\"\n    branch \"master\"\n}\n",
        )
        .unwrap();

        let ctx = ContextSources::new()
            .in_dir(dir.path())
            .with_overrides(vec!["branch=feature-x".to_string()])
            .resolve()
            .unwrap();

        assert_eq!(ctx.stage(), Some("dev"));
        assert_eq!(ctx.branch(), Some("feature-x"));
    }

    #[test]
    fn test_missing_default_file_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ContextSources::new().in_dir(dir.path()).resolve().unwrap();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ContextSources::new()
            .with_file(dir.path().join("missing.kdl"))
            .resolve();
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
