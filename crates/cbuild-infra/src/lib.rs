//! Infrastructure description builder for cbuild.
//!
//! Declares the source, artifact and cache buckets, the Build and Deploy
//! projects with their roles, and the permission grants between them, then
//! renders the whole graph as one CloudFormation template.

pub mod permissions;
pub mod render;
pub mod stack;

pub use permissions::{PermissionModel, SynthOptions};
pub use stack::{CodeBuilderStack, SynthesizedStack, synthesize};
