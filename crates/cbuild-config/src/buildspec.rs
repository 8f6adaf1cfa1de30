//! Build spec override loading.

use crate::ConfigResult;
use std::path::Path;
use tracing::debug;

/// File picked up from the working directory as a build spec override.
pub const BUILDSPEC_FILE: &str = "buildspec.yml";

/// Load `buildspec.yml` from `dir` if it exists. The contents are passed on verbatim.
pub fn load_buildspec(dir: &Path) -> ConfigResult<Option<String>> {
    let path = dir.join(BUILDSPEC_FILE);
    if !path.is_file() {
        debug!(path = %path.display(), "No buildspec override");
        return Ok(None);
    }
    load_buildspec_file(&path).map(Some)
}

/// Load a build spec from an explicit path.
pub fn load_buildspec_file(path: &Path) -> ConfigResult<String> {
    let data = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), bytes = data.len(), "Loaded buildspec");
    Ok(data)
}
