//! Configuration for cbuild.
//!
//! This crate handles:
//! - The KDL context file and `key=value` overrides a stack is evaluated with
//! - Launcher settings read from environment variables
//! - Loading a build spec override from the working directory

pub mod buildspec;
pub mod context;
pub mod env;
pub mod error;

pub use context::{ContextSources, load_context_file, parse_context, parse_override};
pub use env::LauncherConfig;
pub use error::{ConfigError, ConfigResult};
