use crate::error::{EtlError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Collect every `*.json` file under `root`, recursively, as absolute paths.
///
/// Entries are visited in file-name order so repeated runs see the same
/// sequence. A missing root yields an empty list. Symlinks to files are
/// included under the link's own path; symlinked directories are not
/// descended into.
pub fn get_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        debug!("Input directory {} does not exist", root.display());
        return Ok(Vec::new());
    }

    let root = std::path::absolute(root).map_err(|e| EtlError::io(root, e))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|source| EtlError::Discovery {
            root: root.clone(),
            source,
        })?;

        if is_file(&entry) && is_json_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Regular files, and symlinks whose target is a regular file. Dangling links
/// are skipped.
fn is_file(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

/// Matches the shell glob `*.json`: hidden files are skipped
fn is_json_file(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => !name.starts_with('.') && name.ends_with(".json"),
        None => false,
    }
}
