//! Launcher errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error(transparent)]
    Core(#[from] cbuild_core::Error),

    #[error(transparent)]
    Config(#[from] cbuild_config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to walk source tree: {0}")]
    Walk(#[from] ignore::Error),

    #[error("build {build_id} did not complete after {checks} checks")]
    Timeout { build_id: String, checks: u32 },
}

pub type LauncherResult<T> = std::result::Result<T, LauncherError>;
