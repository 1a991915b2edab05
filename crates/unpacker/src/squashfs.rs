//! Locating the SquashFS filesystem appended to an AppImage.
//!
//! The `hsqs` signature also turns up by accident inside the ELF loader, so
//! every occurrence is a candidate and the caller tries them in policy order.

use crate::error::UnpackError;
use crate::types::OffsetOrder;
use memchr::memmem;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// SquashFS superblock signature (little-endian `0x73717368`).
pub const SQUASHFS_MAGIC: &[u8; 4] = b"hsqs";

/// All offsets of [`SQUASHFS_MAGIC`] in `bytes`, ascending.
///
/// Overlapping matches are reported: the search resumes one byte after the
/// previous hit.
pub fn find_offsets(bytes: &[u8]) -> Vec<u64> {
    let finder = memmem::Finder::new(SQUASHFS_MAGIC);
    let mut offsets = Vec::new();
    let mut start = 0;
    while let Some(found) = finder.find(&bytes[start..]) {
        let offset = start + found;
        offsets.push(offset as u64);
        start = offset + 1;
    }
    offsets
}

/// Candidate offsets for `source` in trial order.
///
/// Fails with [`UnpackError::NoEmbeddedFilesystem`] when the signature never
/// occurs.
pub fn candidate_offsets(
    source: &Path,
    bytes: &[u8],
    order: OffsetOrder,
) -> Result<Vec<u64>, UnpackError> {
    let mut offsets = find_offsets(bytes);
    if offsets.is_empty() {
        return Err(UnpackError::NoEmbeddedFilesystem(source.to_path_buf()));
    }
    if order == OffsetOrder::HighestFirst {
        offsets.reverse();
    }
    Ok(offsets)
}

/// Path of the trial image for `source`: `<dir>/<stem>.squashfs`.
pub fn carve_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "appimage".to_string());
    source.with_file_name(format!("{stem}.squashfs"))
}

/// A trial filesystem image carved out of an AppImage.
///
/// The file is removed when the value is dropped, whatever the outcome of the
/// trial.
#[derive(Debug)]
pub struct CarvedImage {
    path: PathBuf,
    offset: u64,
}

impl CarvedImage {
    /// Write `bytes[offset..]` next to `source`.
    pub fn carve(source: &Path, bytes: &[u8], offset: u64) -> io::Result<Self> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|&start| start <= bytes.len())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("offset {offset} past end of {} byte image", bytes.len()),
                )
            })?;

        let path = carve_path(source);
        // Own the path before writing so a failed write is still cleaned up
        let image = Self { path, offset };
        let mut file = fs::File::create(&image.path)?;
        file.write_all(&bytes[start..])?;
        file.flush()?;
        debug!(
            "Carved {} bytes at offset {} into {}",
            bytes.len() - start,
            offset,
            image.path.display()
        );
        Ok(image)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Drop for CarvedImage {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => debug!("Could not remove {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn buffer_with_magic_at(len: usize, offsets: &[usize]) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        for &offset in offsets {
            bytes[offset..offset + 4].copy_from_slice(SQUASHFS_MAGIC);
        }
        bytes
    }

    #[test]
    fn test_find_offsets_ascending() {
        let bytes = buffer_with_magic_at(1024, &[10, 300, 900]);
        assert_eq!(find_offsets(&bytes), vec![10, 300, 900]);
    }

    #[test]
    fn test_candidates_highest_first() {
        let bytes = buffer_with_magic_at(1024, &[10, 300, 900]);
        let offsets = candidate_offsets(Path::new("a.AppImage"), &bytes, OffsetOrder::HighestFirst)
            .unwrap();
        assert_eq!(offsets, vec![900, 300, 10]);
    }

    #[test]
    fn test_candidates_lowest_first() {
        let bytes = buffer_with_magic_at(1024, &[10, 300, 900]);
        let offsets = candidate_offsets(Path::new("a.AppImage"), &bytes, OffsetOrder::LowestFirst)
            .unwrap();
        assert_eq!(offsets, vec![10, 300, 900]);
    }

    #[test]
    fn test_magic_at_edges() {
        let bytes = buffer_with_magic_at(8, &[0, 4]);
        assert_eq!(find_offsets(&bytes), vec![0, 4]);
        assert!(find_offsets(b"hsq").is_empty());
    }

    #[test]
    fn test_no_magic_is_an_error() {
        let bytes = vec![0u8; 4096];
        let result = candidate_offsets(Path::new("a.AppImage"), &bytes, OffsetOrder::default());
        assert!(matches!(result, Err(UnpackError::NoEmbeddedFilesystem(_))));
    }

    #[test]
    fn test_carve_path_uses_stem() {
        assert_eq!(
            carve_path(Path::new("/dl/Cursor-1.2.3.AppImage")),
            Path::new("/dl/Cursor-1.2.3.squashfs")
        );
    }

    #[test]
    fn test_carved_image_is_removed_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("App-1.0.AppImage");
        let bytes = buffer_with_magic_at(64, &[16]);

        let path = {
            let image = CarvedImage::carve(&source, &bytes, 16).unwrap();
            assert_eq!(fs::read(image.path()).unwrap(), &bytes[16..]);
            assert_eq!(image.offset(), 16);
            image.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[test]
    fn test_carve_rejects_offset_past_end() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("App.AppImage");
        let result = CarvedImage::carve(&source, &[0u8; 8], 9);
        assert!(result.is_err());
        assert!(!carve_path(&source).exists());
    }
}
