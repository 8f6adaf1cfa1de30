//! Source archive packaging.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use ignore::WalkBuilder;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::LauncherResult;

/// Per-directory ignore file honored while packaging, in gitignore syntax.
pub const DEFAULT_IGNORE_FILE: &str = ".cbuildignore";

/// A zipped source tree in a temporary file, removed on drop.
#[derive(Debug)]
pub struct SourceArchive {
    file: NamedTempFile,
    content_bytes: u64,
    entries: Vec<String>,
}

impl SourceArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Uncompressed bytes of all packaged files.
    pub fn content_bytes(&self) -> u64 {
        self.content_bytes
    }

    /// Archive entry names, in walk order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// Zip every regular file under `root` that is not ignored.
///
/// Ignore rules come from `.cbuildignore` files in the tree and, when given,
/// from `ignore_file`.
pub fn build_archive(root: &Path, ignore_file: Option<&Path>) -> LauncherResult<SourceArchive> {
    debug!(root = %root.display(), "Building archive");

    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .add_custom_ignore_filename(DEFAULT_IGNORE_FILE)
        .sort_by_file_name(|a, b| a.cmp(b));
    if let Some(path) = ignore_file {
        if let Some(err) = builder.add_ignore(path) {
            return Err(err.into());
        }
    }

    let mut file = tempfile::Builder::new()
        .prefix("cbuild.")
        .suffix(".zip")
        .tempfile()?;
    info!(path = %file.path().display(), "Created temp file");

    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut entries = Vec::new();
    let mut content_bytes = 0;

    {
        let mut writer = ZipWriter::new(file.as_file_mut());

        for result in builder.build() {
            let entry = result?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let name = entry_name(root, entry.path());
            debug!(path = %name, "Added file");

            writer.start_file(name.as_str(), options)?;
            let mut source = File::open(entry.path())?;
            content_bytes += std::io::copy(&mut source, &mut writer)?;
            entries.push(name);
        }

        writer.finish()?;
    }

    file.as_file_mut().seek(SeekFrom::Start(0))?;

    info!(
        files = entries.len(),
        bytes = content_bytes,
        "Built source archive"
    );

    Ok(SourceArchive {
        file,
        content_bytes,
        entries,
    })
}

/// Archive entry name for `path`, relative to `root` with `/` separators.
fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
