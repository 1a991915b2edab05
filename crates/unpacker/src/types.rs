//! Type definitions shared by the sniffer, the backends and the dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The true container type of a downloaded artifact.
///
/// Derived from magic bytes plus the file name; the extension alone is never
/// trusted when the magic bytes disagree with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatClass {
    /// ZIP archive (`PK` magic)
    Zip,

    /// Gzip-compressed tarball
    GzipTar,

    /// Windows executable, usually a self-extracting installer (`MZ` magic)
    PeExecutable,

    /// macOS disk image, kept unextracted
    DiskImage,

    /// ELF binary with an appended SquashFS filesystem
    AppImageCandidate,

    /// Nothing matched
    Unknown,
}

impl fmt::Display for FormatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FormatClass::Zip => "ZIP",
            FormatClass::GzipTar => "TAR.GZ",
            FormatClass::PeExecutable => "EXE",
            FormatClass::DiskImage => "DMG",
            FormatClass::AppImageCandidate => "APPIMAGE",
            FormatClass::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Optional external executables the engine knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// `unsquashfs` from squashfs-tools
    Unsquash,

    /// `7z`, `7za` or `7zz`
    SevenZip,

    /// `innoextract`, for Inno Setup installers
    InnoExtract,
}

impl ToolKind {
    /// Every kind, in probing order.
    pub const ALL: [ToolKind; 3] = [ToolKind::Unsquash, ToolKind::SevenZip, ToolKind::InnoExtract];

    /// Executable names probed on the search path, first found wins.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            ToolKind::Unsquash => &["unsquashfs"],
            ToolKind::SevenZip => &["7z", "7za", "7zz"],
            ToolKind::InnoExtract => &["innoextract"],
        }
    }

    /// Package hint printed when the tool is missing.
    pub fn install_hint(self) -> &'static str {
        match self {
            ToolKind::Unsquash => {
                "brew install squashfs (macOS) or apt-get install squashfs-tools (Linux)"
            }
            ToolKind::SevenZip => "brew install p7zip (macOS) or apt-get install p7zip-full (Linux)",
            ToolKind::InnoExtract => {
                "brew install innoextract (macOS) or apt-get install innoextract (Linux)"
            }
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.candidates()[0])
    }
}

/// Every extraction technology the dispatcher can put in a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    NativeZip,
    NativeTarGz,
    DiskImage,
    InnoExtract,
    SevenZipTool,
    SevenZipLibrary,
    Libarchive,
    Unsquashfs,
    SquashfsLibrary,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BackendKind::NativeZip => "zip",
            BackendKind::NativeTarGz => "tar.gz",
            BackendKind::DiskImage => "disk image (kept)",
            BackendKind::InnoExtract => "innoextract",
            BackendKind::SevenZipTool => "7z",
            BackendKind::SevenZipLibrary => "sevenz-rust2",
            BackendKind::Libarchive => "libarchive",
            BackendKind::Unsquashfs => "unsquashfs",
            BackendKind::SquashfsLibrary => "backhand",
        };
        f.write_str(label)
    }
}

/// What the caller ended up with after a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Disposition {
    /// Files were materialised under the destination directory
    Extracted,

    /// The artifact is used as downloaded (disk images)
    RetainedAsIs,

    /// Every AppImage strategy failed; the executable itself is the artifact
    KeptExecutable,
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    /// Sniffed class of the source
    pub class: FormatClass,

    /// How the artifact was materialised
    pub disposition: Disposition,

    /// Backend that produced the files, if any ran
    pub backend: Option<BackendKind>,

    /// Number of files written under `destination`
    pub files: u64,

    /// Destination directory
    pub destination: PathBuf,
}

impl ExtractionOutcome {
    pub fn is_fully_extracted(&self) -> bool {
        self.disposition == Disposition::Extracted
    }
}

/// Order in which SquashFS candidate offsets are tried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetOrder {
    /// The appended filesystem usually sits after any stray magic in the loader
    #[default]
    HighestFirst,

    LowestFirst,
}

/// Options for the extraction dispatcher.
#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// Order for unsquash tool trials
    pub offset_order: OffsetOrder,

    /// Report an AppImage as successful when nothing could be unpacked but the
    /// executable is still usable
    pub keep_executable_fallback: bool,

    /// Maximum characters of tool diagnostics kept in logs (default: 200)
    pub diagnostic_limit: usize,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            offset_order: OffsetOrder::HighestFirst,
            keep_executable_fallback: true,
            diagnostic_limit: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_json_shape() {
        let outcome = ExtractionOutcome {
            class: FormatClass::AppImageCandidate,
            disposition: Disposition::KeptExecutable,
            backend: None,
            files: 0,
            destination: PathBuf::from("unpacked"),
        };

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["class"], "appimagecandidate");
        assert_eq!(value["disposition"], "kept-executable");
        assert!(value["backend"].is_null());
        assert!(!outcome.is_fully_extracted());
    }

    #[test]
    fn test_backend_kind_serialized_name() {
        assert!(serde_json::from_str::<BackendKind>("\"sevenz-library\"").is_err());

        let kind: BackendKind = serde_json::from_str("\"seven-zip-library\"").unwrap();
        assert_eq!(kind, BackendKind::SevenZipLibrary);
    }

    #[test]
    fn test_default_options() {
        let options = UnpackOptions::default();
        assert_eq!(options.offset_order, OffsetOrder::HighestFirst);
        assert!(options.keep_executable_fallback);
        assert_eq!(options.diagnostic_limit, 200);
    }

    #[test]
    fn test_seven_zip_candidates_in_probe_order() {
        assert_eq!(ToolKind::SevenZip.candidates(), &["7z", "7za", "7zz"]);
        assert_eq!(ToolKind::SevenZip.to_string(), "7z");
    }
}
