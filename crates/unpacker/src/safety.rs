//! Security and safety checks for archive extraction.
//!
//! Every native reader funnels entry names through [`validate_entry_path`],
//! and the tarball reader additionally applies the "data" filter rules:
//! links may not leave the destination, special files are refused and
//! permission bits are tamed.

use crate::error::SecurityError;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Entry type for filtering special file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Hard link
    Hardlink,
    /// Other special file types (device, fifo, socket, ...)
    Other,
}

/// Validates and normalizes an archive entry path to prevent security vulnerabilities.
///
/// This function performs the following checks:
/// - Rejects absolute paths
/// - Rejects paths containing ".." components (path traversal)
/// - Normalizes the path to remove redundant separators and "." components
/// - Validates UTF-8 encoding
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use unpacker::safety::validate_entry_path;
///
/// let safe_path = validate_entry_path(Path::new("dir/file.txt")).unwrap();
/// assert_eq!(safe_path, Path::new("dir/file.txt"));
///
/// assert!(validate_entry_path(Path::new("../../etc/passwd")).is_err());
/// assert!(validate_entry_path(Path::new("/etc/passwd")).is_err());
/// ```
pub fn validate_entry_path(path: &Path) -> Result<PathBuf, SecurityError> {
    if path.is_absolute() {
        return Err(SecurityError::AbsolutePath(path.display().to_string()));
    }

    let path_str = path.to_str().ok_or_else(|| {
        SecurityError::PathTraversal("Path contains invalid UTF-8 characters".to_string())
    })?;

    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => {
                // Some archives encode ".." in ways the component parser keeps as Normal
                if part.to_str() == Some("..") {
                    return Err(SecurityError::PathTraversal(format!(
                        "Path contains '..' component: {}",
                        path_str
                    )));
                }
                normalized.push(part);
            }
            Component::CurDir => continue,
            Component::ParentDir => {
                return Err(SecurityError::PathTraversal(format!(
                    "Path contains '..' component: {}",
                    path_str
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SecurityError::AbsolutePath(path.display().to_string()));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(SecurityError::PathTraversal(
            "Path normalizes to empty".to_string(),
        ));
    }

    Ok(normalized)
}

/// Like [`validate_entry_path`] but tolerates the leading `/` that filesystem
/// images (SquashFS, libarchive listings) put on every entry.
pub fn validate_image_path(path: &Path) -> Result<PathBuf, SecurityError> {
    let relative: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::RootDir))
        .collect();
    validate_entry_path(&relative)
}

/// Whether `path` names the archive root itself (`./`, `/`, empty).
pub fn is_root_entry(path: &Path) -> bool {
    !path.components().any(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
}

/// Refuses entry types that have no business in an application bundle.
pub fn check_entry_type(entry_type: EntryType, name: &str) -> Result<(), SecurityError> {
    match entry_type {
        EntryType::File | EntryType::Directory | EntryType::Symlink | EntryType::Hardlink => Ok(()),
        EntryType::Other => Err(SecurityError::UnsafeEntryType(name.to_string())),
    }
}

/// Checks that a symlink stored at `entry` pointing to `target` resolves inside
/// the extraction root.
///
/// ```
/// use std::path::Path;
/// use unpacker::safety::validate_link_target;
///
/// assert!(validate_link_target(Path::new("bin/code"), Path::new("../lib/code")).is_ok());
/// assert!(validate_link_target(Path::new("bin/code"), Path::new("../../etc/passwd")).is_err());
/// ```
pub fn validate_link_target(entry: &Path, target: &Path) -> Result<(), SecurityError> {
    if target.is_absolute() {
        return Err(SecurityError::LinkEscape(format!(
            "{} -> {}",
            entry.display(),
            target.display()
        )));
    }

    // Depth of the directory holding the link, relative to the root
    let mut depth: i64 = entry.components().count() as i64 - 1;
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return Err(SecurityError::LinkEscape(format!(
                        "{} -> {}",
                        entry.display(),
                        target.display()
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SecurityError::LinkEscape(format!(
                    "{} -> {}",
                    entry.display(),
                    target.display()
                )));
            }
        }
    }

    Ok(())
}

/// Where `path` really lands once the symlinks already on disk are followed.
///
/// `root` must be canonical. Existing components are resolved with
/// [`fs::canonicalize`]; missing ones are taken literally. Fails if the walk
/// ever leaves `root`.
pub fn resolve_inside(root: &Path, path: &Path) -> Result<PathBuf, SecurityError> {
    let escape = || {
        SecurityError::LinkEscape(format!("{} leaves {}", path.display(), root.display()))
    };

    let relative = path.strip_prefix(root).map_err(|_| escape())?;
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                if resolved.symlink_metadata().is_ok() {
                    // Dangling links stay literal
                    if let Ok(real) = fs::canonicalize(&resolved) {
                        resolved = real;
                    }
                }
            }
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
        if !resolved.starts_with(root) {
            return Err(escape());
        }
    }

    Ok(resolved)
}

/// Permission bits for an extracted regular file.
///
/// Drops setuid/setgid/sticky and group/other write, keeps owner read/write,
/// and only leaves execute bits when the owner had one.
pub fn sanitize_file_mode(mode: u32) -> u32 {
    let mut mode = mode & 0o755;
    if mode & 0o100 == 0 {
        mode &= !0o111;
    }
    mode | 0o600
}
