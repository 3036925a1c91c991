//! Expands command-line inputs into a list of recording files.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppResult, ProbeError};

/// Resolves `inputs` to recording paths.
///
/// Files are taken as given. Directories contribute their direct children whose
/// extension matches `extension` (case-insensitive), sorted by path. Subdirectories
/// are not descended into.
pub fn discover_recordings<P: AsRef<Path>>(inputs: &[P], extension: &str) -> AppResult<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let mut found = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            let mut entries = Vec::new();
            for entry in std::fs::read_dir(input)? {
                let path = entry?.path();
                if path.is_file() && has_extension(&path, extension) {
                    entries.push(path);
                }
            }
            entries.sort();
            debug!(dir = %input.display(), files = entries.len(), "scanned input directory");
            found.extend(entries);
        } else if input.is_file() {
            found.push(input.to_path_buf());
        } else {
            return Err(ProbeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input not found: {}", input.display()),
            )));
        }
    }
    Ok(found)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
