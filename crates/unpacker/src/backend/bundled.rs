//! Backends built on libraries linked into the binary.

use super::{
    count_files, create_dir_inside, create_link_inside, prepare_target, set_mode, Extractor,
};
use crate::error::UnpackError;
use crate::safety::{is_root_entry, sanitize_file_mode, validate_image_path};
use crate::types::BackendKind;
use backhand::{FilesystemReader, InnerNode};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use tracing::debug;

/// 7z-format reader; opens the 7z payload of some NSIS installers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SevenZipLibrary;

impl Extractor for SevenZipLibrary {
    fn kind(&self) -> BackendKind {
        BackendKind::SevenZipLibrary
    }

    fn extract(&self, source: &Path, destination: &Path) -> Result<u64, UnpackError> {
        sevenz_rust2::decompress_file(source, destination)
            .map_err(|e| UnpackError::Decode(format!("{}: {}", source.display(), e)))?;

        match count_files(destination) {
            0 => Err(UnpackError::EmptyExtraction(self.kind())),
            files => Ok(files),
        }
    }
}

/// libarchive through `compress-tools`, the reader of last resort.
///
/// Every entry name is validated before anything is written.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibarchiveExtractor;

impl Extractor for LibarchiveExtractor {
    fn kind(&self) -> BackendKind {
        BackendKind::Libarchive
    }

    fn extract(&self, source: &Path, destination: &Path) -> Result<u64, UnpackError> {
        let decode = |e: compress_tools::Error| {
            UnpackError::Decode(format!("{}: {}", source.display(), e))
        };

        let entries = compress_tools::list_archive_files(BufReader::new(File::open(source)?))
            .map_err(decode)?;
        if entries.is_empty() {
            return Err(UnpackError::EmptyExtraction(self.kind()));
        }
        for entry in entries.iter().map(Path::new).filter(|p| !is_root_entry(p)) {
            validate_image_path(entry)?;
        }

        compress_tools::uncompress_archive(
            BufReader::new(File::open(source)?),
            destination,
            compress_tools::Ownership::Ignore,
        )
        .map_err(decode)?;

        match count_files(destination) {
            0 => Err(UnpackError::EmptyExtraction(self.kind())),
            files => Ok(files),
        }
    }
}

/// SquashFS reader for a carved AppImage payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct SquashfsLibrary;

impl Extractor for SquashfsLibrary {
    fn kind(&self) -> BackendKind {
        BackendKind::SquashfsLibrary
    }

    fn extract(&self, image: &Path, destination: &Path) -> Result<u64, UnpackError> {
        let reader = BufReader::new(File::open(image)?);
        let filesystem = FilesystemReader::from_reader(reader)
            .map_err(|e| UnpackError::Decode(format!("{}: {}", image.display(), e)))?;

        let root = fs::canonicalize(destination)?;
        let mut files = 0;
        for node in filesystem.files() {
            if is_root_entry(&node.fullpath) {
                continue;
            }

            let relative = validate_image_path(&node.fullpath)?;
            let target = root.join(&relative);

            match &node.inner {
                InnerNode::Dir(_) => create_dir_inside(&root, &target)?,
                InnerNode::File(file) => {
                    prepare_target(&root, &target)?;
                    let mut reader = filesystem.file(&file.basic).reader();
                    let mut out = File::create(&target)?;
                    io::copy(&mut reader, &mut out)?;
                    set_mode(&target, sanitize_file_mode(u32::from(node.header.permissions)))?;
                    files += 1;
                }
                InnerNode::Symlink(link) => {
                    create_link_inside(&root, &relative, &target, &link.link)?;
                    files += 1;
                }
                _ => debug!("Skipping special file {}", node.fullpath.display()),
            }
        }

        Ok(files)
    }
}
