//! Pure-Rust readers for ZIP and gzip-compressed tarballs.

use super::{create_dir_inside, create_link_inside, prepare_target, set_mode, Extractor};
use crate::error::{SecurityError, UnpackError};
use crate::safety::{
    check_entry_type, is_root_entry, sanitize_file_mode, validate_entry_path,
    validate_link_target, EntryType,
};
use crate::types::BackendKind;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Unix file-type bits for a symbolic link, as stored in ZIP external attributes.
const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Native ZIP reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl Extractor for ZipExtractor {
    fn kind(&self) -> BackendKind {
        BackendKind::NativeZip
    }

    fn extract(&self, source: &Path, destination: &Path) -> Result<u64, UnpackError> {
        let file = File::open(source)?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file))
            .map_err(|e| UnpackError::Decode(format!("{}: {}", source.display(), e)))?;

        let root = fs::canonicalize(destination)?;
        let mut files = 0;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| UnpackError::Decode(e.to_string()))?;

            let relative = validate_entry_path(Path::new(entry.name()))?;
            let target = root.join(&relative);

            if entry.is_dir() {
                create_dir_inside(&root, &target)?;
                continue;
            }

            let mode = entry.unix_mode();
            if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
                // macOS app bundles keep framework symlinks; the entry body is the target
                let mut link = String::new();
                entry.read_to_string(&mut link)?;
                create_link_inside(&root, &relative, &target, Path::new(&link))?;
                files += 1;
                continue;
            }

            prepare_target(&root, &target)?;
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
            if let Some(mode) = mode {
                set_mode(&target, sanitize_file_mode(mode))?;
            }
            files += 1;
        }

        Ok(files)
    }
}

/// Native tar + gzip reader with "data" filter semantics.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzExtractor;

impl Extractor for TarGzExtractor {
    fn kind(&self) -> BackendKind {
        BackendKind::NativeTarGz
    }

    fn extract(&self, source: &Path, destination: &Path) -> Result<u64, UnpackError> {
        let file = File::open(source)?;
        let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        archive.set_preserve_permissions(false);
        archive.set_overwrite(true);

        let decode = |e: io::Error| UnpackError::Decode(format!("{}: {}", source.display(), e));

        let mut files = 0;
        for entry in archive.entries().map_err(decode)? {
            let mut entry = entry.map_err(decode)?;
            let header_type = entry.header().entry_type();
            if header_type == tar::EntryType::XGlobalHeader {
                continue;
            }

            let path = entry.path().map_err(decode)?.into_owned();
            if header_type.is_dir() && is_root_entry(&path) {
                continue;
            }
            let name = path.display().to_string();
            let entry_type = tar_entry_type(header_type);
            check_entry_type(entry_type, &name)?;
            let relative = validate_entry_path(&path)?;

            match entry_type {
                EntryType::Symlink => {
                    let target = entry
                        .link_name()
                        .map_err(decode)?
                        .ok_or_else(|| UnpackError::Decode(format!("symlink without target: {name}")))?;
                    validate_link_target(&relative, &target)?;
                }
                EntryType::Hardlink => {
                    let target = entry
                        .link_name()
                        .map_err(decode)?
                        .ok_or_else(|| UnpackError::Decode(format!("hard link without target: {name}")))?;
                    validate_entry_path(&target)?;
                }
                _ => {}
            }

            if !entry.unpack_in(destination)? {
                return Err(SecurityError::PathTraversal(name).into());
            }

            match entry_type {
                EntryType::File => {
                    let mode = entry.header().mode().map_err(decode)?;
                    set_mode(&destination.join(&relative), sanitize_file_mode(mode))?;
                    files += 1;
                }
                EntryType::Symlink | EntryType::Hardlink => files += 1,
                _ => {}
            }
        }

        Ok(files)
    }
}

fn tar_entry_type(entry_type: tar::EntryType) -> EntryType {
    match entry_type {
        tar::EntryType::Regular | tar::EntryType::Continuous | tar::EntryType::GNUSparse => {
            EntryType::File
        }
        tar::EntryType::Directory => EntryType::Directory,
        tar::EntryType::Symlink => EntryType::Symlink,
        tar::EntryType::Link => EntryType::Hardlink,
        _ => EntryType::Other,
    }
}
