//! Build launching for cbuild.
//!
//! Packages the working directory, uploads it to the source bucket, starts
//! a build on one of the stack's projects and follows its logs until the
//! build completes.

pub mod archive;
pub mod aws;
pub mod error;
pub mod launcher;

pub use archive::{DEFAULT_IGNORE_FILE, SourceArchive, build_archive};
pub use error::{LauncherError, LauncherResult};
pub use launcher::{BuildOutcome, FollowSettings, Launcher, RunParams};
