//! Extraction backends.
//!
//! Each backend is a single strategy: unpack `source` into `destination` and
//! report how many files landed there. The dispatcher strings them together
//! into per-format fallback chains.

mod bundled;
mod external;
mod native;

pub use bundled::{LibarchiveExtractor, SevenZipLibrary, SquashfsLibrary};
pub use external::{InnoExtractTool, SevenZipTool, UnsquashfsTool};
pub use native::{TarGzExtractor, ZipExtractor};

use crate::error::UnpackError;
use crate::safety::{resolve_inside, validate_link_target};
use crate::types::BackendKind;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One extraction strategy.
pub trait Extractor {
    /// Which technology this is, for logging and outcomes.
    fn kind(&self) -> BackendKind;

    /// Unpack `source` into `destination`, returning the number of files
    /// written. The destination exists when this is called.
    fn extract(&self, source: &Path, destination: &Path) -> Result<u64, UnpackError>;
}

/// Number of non-directory entries below `dir`.
pub fn count_files(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir())
        .count() as u64
}

/// Whether `dir` contains anything at all.
pub fn is_populated(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Remove everything below `dir`, keeping `dir` itself.
pub fn clear_dir(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        return fs::create_dir_all(dir);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Remove `dir` entirely and create it again empty.
pub fn recreate_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Make room for a new file or link at `target` below the canonical `root`.
///
/// The parent must really sit inside `root` once existing symlinks are
/// followed; it is created when missing. A symlink already at `target` is
/// removed so nothing gets written through it. Returns the real parent.
pub(crate) fn prepare_target(root: &Path, target: &Path) -> Result<PathBuf, UnpackError> {
    let parent = target.parent().unwrap_or(root);
    resolve_inside(root, parent)?;
    fs::create_dir_all(parent)?;
    let real_parent = resolve_inside(root, parent)?;

    if target
        .symlink_metadata()
        .is_ok_and(|meta| meta.file_type().is_symlink())
    {
        fs::remove_file(target)?;
    }
    Ok(real_parent)
}

/// Create a directory entry at `target` below the canonical `root`.
pub(crate) fn create_dir_inside(root: &Path, target: &Path) -> Result<(), UnpackError> {
    resolve_inside(root, target)?;
    fs::create_dir_all(target)?;
    Ok(())
}

/// Create the symlink `target -> link` once `link` is known to resolve inside
/// `root` from the real parent directory.
pub(crate) fn create_link_inside(
    root: &Path,
    entry: &Path,
    target: &Path,
    link: &Path,
) -> Result<(), UnpackError> {
    validate_link_target(entry, link)?;
    let real_parent = prepare_target(root, target)?;
    resolve_inside(root, &real_parent.join(link))?;
    write_symlink(link, target)?;
    Ok(())
}

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
pub(crate) fn write_symlink(target: &Path, link: &Path) -> io::Result<()> {
    if link.symlink_metadata().is_ok() {
        fs::remove_file(link)?;
    }
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
pub(crate) fn write_symlink(target: &Path, link: &Path) -> io::Result<()> {
    // No portable symlinks; store the target text as the file body
    fs::write(link, target.to_string_lossy().as_bytes())
}
