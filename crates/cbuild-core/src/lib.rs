//! Core domain types and traits for cbuild.
//!
//! This crate contains:
//! - Logical identifiers and stack naming
//! - Resource descriptors (buckets, roles, build projects)
//! - Permission grants
//! - The build spec embedded in every project
//! - The CloudFormation template model
//! - Build service traits used by the launcher

pub mod build;
pub mod buildspec;
pub mod error;
pub mod grant;
pub mod id;
pub mod resource;
pub mod stack;
pub mod template;

pub use error::{Error, Result};
pub use id::LogicalId;
pub use stack::{StackContext, StackName};
