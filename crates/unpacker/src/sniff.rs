//! Content sniffing: decide what a downloaded file really is.
//!
//! Vendors are not always honest about extensions. One Windows build ships an
//! Inno Setup installer named `*.zip`, so for the ZIP-vs-PE question the magic
//! bytes win over the name.

use crate::error::UnpackError;
use crate::types::FormatClass;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes inspected.
pub const SNIFF_LEN: usize = 4;

const PE_MAGIC: &[u8; 2] = b"MZ";
const ZIP_MAGIC: &[u8; 2] = b"PK";

/// Classify the file at `path`.
///
/// Reads at most [`SNIFF_LEN`] bytes. Fails with [`UnpackError::NotFound`]
/// before touching the file if it does not exist.
pub fn sniff(path: &Path) -> Result<FormatClass, UnpackError> {
    if !path.exists() {
        return Err(UnpackError::NotFound(path.to_path_buf()));
    }

    let mut magic = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut magic)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(classify(&name, &magic))
}

/// The classification table, first match wins.
///
/// `name` is the declared file name, `magic` the leading bytes (may be short).
pub fn classify(name: &str, magic: &[u8]) -> FormatClass {
    let name = name.to_lowercase();
    let suffix = Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let is_pe = magic.starts_with(PE_MAGIC);
    let is_zip = magic.starts_with(ZIP_MAGIC);

    if name.ends_with(".zip") && is_zip {
        FormatClass::Zip
    } else if name.ends_with(".zip") && is_pe {
        FormatClass::PeExecutable
    } else if suffix == "gz" && (name.ends_with(".tar.gz") || name.ends_with(".tgz")) {
        FormatClass::GzipTar
    } else if suffix == "dmg" {
        FormatClass::DiskImage
    } else if suffix == "exe" {
        FormatClass::PeExecutable
    } else if name.ends_with(".appimage") {
        FormatClass::AppImageCandidate
    } else {
        FormatClass::Unknown
    }
}
