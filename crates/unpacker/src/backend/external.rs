//! Adapters for external extraction executables.
//!
//! The tools run synchronously with no timeout. Exit status zero is the only
//! success signal; on failure the captured stderr becomes the diagnostic.

use super::{count_files, Extractor};
use crate::error::UnpackError;
use crate::types::BackendKind;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Run `program args...`, returning an error carrying stderr on non-zero exit.
fn run(tool: BackendKind, program: &Path, args: &[OsString]) -> Result<(), UnpackError> {
    debug!("Running {} {:?}", program.display(), args);
    let output = Command::new(program).args(args).output()?;

    if output.status.success() {
        return Ok(());
    }

    let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        stderr = String::from_utf8_lossy(&output.stdout).trim().to_string();
    }
    Err(UnpackError::ToolFailed {
        tool,
        status: output.status,
        stderr,
    })
}

/// Installer backends must leave something behind to count as a success.
fn require_files(tool: BackendKind, destination: &Path) -> Result<u64, UnpackError> {
    match count_files(destination) {
        0 => Err(UnpackError::EmptyExtraction(tool)),
        files => Ok(files),
    }
}

/// `innoextract -e -d <dest> <src>`, for Inno Setup installers.
#[derive(Debug, Clone)]
pub struct InnoExtractTool {
    program: PathBuf,
}

impl InnoExtractTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Extractor for InnoExtractTool {
    fn kind(&self) -> BackendKind {
        BackendKind::InnoExtract
    }

    fn extract(&self, source: &Path, destination: &Path) -> Result<u64, UnpackError> {
        let args = [
            OsString::from("-e"),
            OsString::from("-d"),
            destination.as_os_str().to_owned(),
            source.as_os_str().to_owned(),
        ];
        run(self.kind(), &self.program, &args)?;
        require_files(self.kind(), destination)
    }
}

/// `7z x -o<dest> <src> -y`; handles NSIS and some other installers.
#[derive(Debug, Clone)]
pub struct SevenZipTool {
    program: PathBuf,
}

impl SevenZipTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Extractor for SevenZipTool {
    fn kind(&self) -> BackendKind {
        BackendKind::SevenZipTool
    }

    fn extract(&self, source: &Path, destination: &Path) -> Result<u64, UnpackError> {
        let mut out_flag = OsString::from("-o");
        out_flag.push(destination.as_os_str());
        let args = [
            OsString::from("x"),
            out_flag,
            source.as_os_str().to_owned(),
            OsString::from("-y"),
        ];
        run(self.kind(), &self.program, &args)?;
        require_files(self.kind(), destination)
    }
}

/// `unsquashfs -f -d <dest> <image>` on a carved SquashFS image.
#[derive(Debug, Clone)]
pub struct UnsquashfsTool {
    program: PathBuf,
}

impl UnsquashfsTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Extractor for UnsquashfsTool {
    fn kind(&self) -> BackendKind {
        BackendKind::Unsquashfs
    }

    fn extract(&self, image: &Path, destination: &Path) -> Result<u64, UnpackError> {
        let args = [
            OsString::from("-f"),
            OsString::from("-d"),
            destination.as_os_str().to_owned(),
            image.as_os_str().to_owned(),
        ];
        run(self.kind(), &self.program, &args)?;
        Ok(count_files(destination))
    }
}
