//! Artifact store keyed by `(outputId, filename)`.
//!
//! Layout: `.gatekeep/artifacts/<outputId>/<filename>`. Filenames may contain
//! `/` to form nested paths. Files uploaded for a run live under the `files/`
//! prefix of its output id and are overlaid into the run's sandbox.

use crate::error::{GateError, Result, codes};
use crate::fs::{atomic_write, is_temp_name};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Prefix of uploaded sandbox files within an output namespace.
pub const UPLOADS_PREFIX: &str = "files/";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of an artifact, validated before anything touches the disk.
    ///
    /// # Returns
    ///
    /// * `Err(GateError::InvalidRequest)` - `PATH_TRAVERSAL` if either part
    ///   contains `..`, is absolute, or the output id contains a separator
    pub fn path(&self, output_id: &str, filename: &str) -> Result<PathBuf> {
        check_output_id(output_id)?;
        let filename = check_filename(filename)?;
        Ok(self.root.join(output_id).join(filename))
    }

    /// Store an artifact, replacing any previous content.
    pub fn put(&self, output_id: &str, filename: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.path(output_id, filename)?;
        atomic_write(&path, content)?;
        Ok(path)
    }

    pub fn get(&self, output_id: &str, filename: &str) -> Result<Vec<u8>> {
        let path = self.path(output_id, filename)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GateError::not_found(
                    codes::ARTIFACT_NOT_FOUND,
                    format!("artifact '{}/{}' not found", output_id, filename),
                )
            } else {
                GateError::IoError(format!("failed to read artifact '{}': {}", path.display(), e))
            }
        })
    }

    /// Filenames stored under `output_id`, sorted.
    pub fn list(&self, output_id: &str) -> Result<Vec<String>> {
        check_output_id(output_id)?;
        let dir = self.root.join(output_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(false) {
            let entry = entry.map_err(|e| {
                GateError::IoError(format!("failed to list artifacts in '{}': {}", dir.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if is_temp_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&dir) {
                names.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        names.sort();
        Ok(names)
    }

    /// Uploaded files of `output_id` as `(sandbox path, stored path)` pairs.
    pub fn uploads(&self, output_id: &str) -> Result<Vec<(String, PathBuf)>> {
        Ok(self
            .list(output_id)?
            .into_iter()
            .filter_map(|name| {
                let relative = name.strip_prefix(UPLOADS_PREFIX)?.to_string();
                Some((relative, self.root.join(output_id).join(&name)))
            })
            .collect())
    }
}

fn traversal(what: &str, value: &str) -> GateError {
    GateError::invalid_request(
        codes::PATH_TRAVERSAL,
        format!("{} '{}' is not a safe relative name", what, value),
    )
}

/// Validate an output id: one safe path segment.
pub fn check_output_id(output_id: &str) -> Result<()> {
    if output_id.trim().is_empty()
        || output_id.contains("..")
        || output_id.contains('/')
        || output_id.contains('\\')
        || output_id.contains(':')
    {
        return Err(traversal("output id", output_id));
    }
    Ok(())
}

/// Validate a (possibly nested) sandbox-relative path.
///
/// Returns it with forward slashes.
pub fn check_filename(filename: &str) -> Result<String> {
    let normalized = filename.replace('\\', "/");
    let bytes = normalized.as_bytes();
    let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if normalized.trim().is_empty()
        || normalized.contains("..")
        || normalized.starts_with('/')
        || has_drive
        || normalized.split('/').any(|part| part.is_empty() || part == ".")
    {
        return Err(traversal("filename", filename));
    }
    Ok(normalized)
}

/// Validate a path to be written into a sandbox.
///
/// On top of [`check_filename`], the first component may not be the
/// sandbox's linked dependency directory, which points into the source
/// checkout.
pub fn check_sandbox_path(filename: &str, dependency_dir: &str) -> Result<String> {
    let normalized = check_filename(filename)?;
    let first = normalized.split('/').next().unwrap_or_default();
    if !dependency_dir.is_empty() && first.eq_ignore_ascii_case(dependency_dir) {
        return Err(GateError::invalid_request(
            codes::PATH_TRAVERSAL,
            format!(
                "filename '{}' is inside the shared dependency directory '{}'",
                filename, dependency_dir
            ),
        ));
    }
    Ok(normalized)
}
