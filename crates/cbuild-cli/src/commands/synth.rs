//! Template synthesis commands.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use cbuild_core::StackContext;
use cbuild_infra::{SynthOptions, SynthesizedStack, synthesize};
use tracing::info;

/// Where a synthesized template goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    Dir(PathBuf),
}

pub fn synth(context: &StackContext, options: &SynthOptions, output: Output) -> Result<()> {
    let stack = synthesize(context, options).context("Failed to synthesize stack")?;
    emit(&stack, output, &mut std::io::stdout())
}

fn emit<W: Write>(stack: &SynthesizedStack, output: Output, out: &mut W) -> Result<()> {
    match output {
        Output::Stdout => {
            let json = stack.to_json().context("Failed to render template")?;
            writeln!(out, "{}", json)?;
        }
        Output::Dir(dir) => {
            let path = stack
                .write_to(&dir)
                .with_context(|| format!("Failed to write template to {}", dir.display()))?;
            writeln!(out, "{}", path.display())?;
        }
    }
    Ok(())
}

pub fn validate(context: &StackContext, options: &SynthOptions) -> Result<()> {
    let stack = synthesize(context, options).context("Stack is invalid")?;
    info!(
        stack = %stack.name,
        resources = stack.template.resources.len(),
        "Stack is valid"
    );
    println!("{} is valid", stack.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbuild_core::template::Template;

    #[test]
    fn test_emit_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let stack = synthesize(
            &StackContext::for_branch("dev", "master"),
            &SynthOptions::scoped(),
        )
        .unwrap();

        let mut out = Vec::new();
        emit(&stack, Output::Dir(dir.path().to_path_buf()), &mut out).unwrap();

        let expected = dir.path().join("BuilderStack-dev-master.template.json");
        assert!(expected.is_file());
        assert_eq!(
            String::from_utf8(out).unwrap().trim(),
            expected.display().to_string()
        );
    }

    #[test]
    fn test_emit_to_stdout() {
        let stack = synthesize(&StackContext::new(), &SynthOptions::scoped()).unwrap();

        let mut out = Vec::new();
        emit(&stack, Output::Stdout, &mut out).unwrap();

        let parsed = Template::from_json(&String::from_utf8(out).unwrap()).unwrap();
        assert_eq!(parsed, stack.template);
    }

    #[test]
    fn test_validate_rejects_unapproved_broad_model() {
        let options = SynthOptions {
            permissions: cbuild_infra::PermissionModel::Broad,
            ..Default::default()
        };
        assert!(validate(&StackContext::new(), &options).is_err());
    }
}
