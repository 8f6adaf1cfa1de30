//! CLI command implementations.

pub mod run;
pub mod synth;

use std::path::PathBuf;

use anyhow::{Context, Result};
use cbuild_config::ContextSources;
use cbuild_core::StackContext;
use tracing::debug;

/// Merge the context file and the `-c key=value` overrides.
pub fn resolve_context(file: Option<PathBuf>, overrides: Vec<String>) -> Result<StackContext> {
    let mut sources = ContextSources::new();
    if let Some(path) = file {
        sources = sources.with_file(path);
    }
    let context = sources
        .with_overrides(overrides)
        .resolve()
        .context("Failed to resolve stack context")?;

    for (key, value) in context.iter() {
        debug!(key = %key, value = %value, "Context value");
    }
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cbuild.kdl");
        std::fs::write(&path, "context {\n    stage \"prod\"\n    branch \"main\"\n}\n").unwrap();

        let context = resolve_context(Some(path), vec!["stage=dev".to_string()]).unwrap();
        assert_eq!(context.stage(), Some("dev"));
        assert_eq!(context.branch(), Some("main"));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_context(Some(dir.path().join("missing.kdl")), Vec::new());
        assert!(result.is_err());
    }
}
