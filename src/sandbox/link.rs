//! Dependency tree linking.
//!
//! A sandbox gets a pointer to the source checkout's dependency directory:
//! a symlink on unix, a directory symlink or junction on windows. Removal
//! always targets the pointer itself.

use std::io;
use std::path::Path;
use tracing::debug;

/// Creates and removes dependency pointers.
pub trait DependencyLinker: Send + Sync {
    /// Create a pointer at `link` to the directory `source`.
    ///
    /// Returns `Ok(false)` when the platform has no linking primitive.
    fn link(&self, source: &Path, link: &Path) -> io::Result<bool>;

    /// Remove the pointer at `link` without touching its target.
    fn unlink(&self, link: &Path) -> io::Result<()> {
        remove_link(link)
    }
}

/// The linker for the current platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformLinker;

impl DependencyLinker for PlatformLinker {
    #[cfg(unix)]
    fn link(&self, source: &Path, link: &Path) -> io::Result<bool> {
        std::os::unix::fs::symlink(source, link)?;
        Ok(true)
    }

    #[cfg(windows)]
    fn link(&self, source: &Path, link: &Path) -> io::Result<bool> {
        // Directory symlinks need a privilege junctions do not.
        match std::os::windows::fs::symlink_dir(source, link) {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!(error = %e, "directory symlink failed, trying a junction");
                let status = std::process::Command::new("cmd")
                    .args(["/C", "mklink", "/J"])
                    .arg(link)
                    .arg(source)
                    .stdout(std::process::Stdio::null())
                    .stderr(std::process::Stdio::null())
                    .status()?;
                if status.success() {
                    Ok(true)
                } else {
                    Err(io::Error::other(format!(
                        "mklink /J exited with {:?}",
                        status.code()
                    )))
                }
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    fn link(&self, _source: &Path, _link: &Path) -> io::Result<bool> {
        Ok(false)
    }
}

/// Remove a dependency pointer without following it.
///
/// A missing path is not an error. A real directory at `link` is left in
/// place: it belongs to the checkout, and deleting it is not a pointer
/// removal.
pub fn remove_link(link: &Path) -> io::Result<()> {
    let meta = match std::fs::symlink_metadata(link) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if meta.file_type().is_symlink() {
        debug!(path = %link.display(), "removing dependency link");
        return remove_symlink(link);
    }

    #[cfg(windows)]
    if is_junction(&meta) {
        debug!(path = %link.display(), "removing dependency junction");
        // RemoveDirectoryW on a reparse point deletes the point only.
        return std::fs::remove_dir(link);
    }

    debug!(path = %link.display(), "not a link, leaving it in place");
    Ok(())
}

#[cfg(unix)]
fn remove_symlink(link: &Path) -> io::Result<()> {
    std::fs::remove_file(link)
}

#[cfg(windows)]
fn remove_symlink(link: &Path) -> io::Result<()> {
    // Directory symlinks are directories to the windows API.
    std::fs::remove_dir(link).or_else(|_| std::fs::remove_file(link))
}

#[cfg(not(any(unix, windows)))]
fn remove_symlink(link: &Path) -> io::Result<()> {
    std::fs::remove_file(link)
}

#[cfg(windows)]
fn is_junction(meta: &std::fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
    meta.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0
}
