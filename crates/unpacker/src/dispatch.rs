//! The extraction dispatcher.
//!
//! Classifies a download, picks the backend chain for its class and walks the
//! chain until one backend succeeds. Backend errors never escape on their own:
//! they are logged and the next backend runs. Only a missing input, an
//! unknown format, an AppImage without any SquashFS signature or an exhausted
//! chain reach the caller as errors.

use crate::backend::{
    clear_dir, is_populated, recreate_dir, set_mode, Extractor, InnoExtractTool,
    LibarchiveExtractor, SevenZipLibrary, SevenZipTool, SquashfsLibrary, TarGzExtractor,
    UnsquashfsTool, ZipExtractor,
};
use crate::error::UnpackError;
use crate::sniff::sniff;
use crate::squashfs::{candidate_offsets, CarvedImage};
use crate::tools::ToolRegistry;
use crate::types::{
    BackendKind, Disposition, ExtractionOutcome, FormatClass, ToolKind, UnpackOptions,
};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Drives sniffing and the per-class fallback chains.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    tools: ToolRegistry,
    options: UnpackOptions,
}

impl Dispatcher {
    pub fn new(tools: ToolRegistry, options: UnpackOptions) -> Self {
        Self { tools, options }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn options(&self) -> &UnpackOptions {
        &self.options
    }

    /// The ordered backends for `class`.
    ///
    /// Empty for classes that are not handled by a plain chain: disk images
    /// need no backend, AppImages go through the SquashFS recovery path and
    /// unknown files are refused.
    pub fn chain_for(&self, class: FormatClass) -> Vec<Box<dyn Extractor>> {
        match class {
            FormatClass::Zip => vec![Box::new(ZipExtractor)],
            FormatClass::GzipTar => vec![Box::new(TarGzExtractor)],
            FormatClass::PeExecutable => {
                let mut chain: Vec<Box<dyn Extractor>> = Vec::new();
                match self.tools.get(ToolKind::InnoExtract) {
                    Some(program) => chain.push(Box::new(InnoExtractTool::new(program))),
                    None => skip_tool(ToolKind::InnoExtract),
                }
                match self.tools.get(ToolKind::SevenZip) {
                    Some(program) => chain.push(Box::new(SevenZipTool::new(program))),
                    None => skip_tool(ToolKind::SevenZip),
                }
                chain.push(Box::new(SevenZipLibrary));
                chain.push(Box::new(LibarchiveExtractor));
                chain
            }
            FormatClass::DiskImage | FormatClass::AppImageCandidate | FormatClass::Unknown => {
                Vec::new()
            }
        }
    }

    /// Unpack `source` into `destination`.
    ///
    /// The destination is created right before the first extraction attempt;
    /// unknown files and disk images never touch it. Failed attempts empty the
    /// destination, so a destination at or above the directory holding
    /// `source` is refused with [`UnpackError::DestinationContainsSource`].
    pub fn unpack(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<ExtractionOutcome, UnpackError> {
        let class = sniff(source)?;
        let name = display_name(source);
        debug!("{} sniffed as {}", name, class);

        match class {
            FormatClass::Unknown => Err(UnpackError::UnsupportedFormat(format!(
                "Unknown archive type: {}",
                name
            ))),
            FormatClass::DiskImage => {
                info!("DMG file (keeping as-is): {}", name);
                Ok(ExtractionOutcome {
                    class,
                    disposition: Disposition::RetainedAsIs,
                    backend: Some(BackendKind::DiskImage),
                    files: 0,
                    destination: destination.to_path_buf(),
                })
            }
            FormatClass::AppImageCandidate => {
                // Must run even if unpacking fails: the binary is the fallback artifact
                set_mode(source, 0o755)?;
                check_destination(source, destination)?;
                self.unpack_appimage(source, destination)
            }
            FormatClass::Zip | FormatClass::GzipTar | FormatClass::PeExecutable => {
                if class == FormatClass::PeExecutable && name.to_lowercase().ends_with(".zip") {
                    info!("{} has a .zip extension but is actually an EXE installer", name);
                }
                check_destination(source, destination)?;
                let chain = self.chain_for(class);
                self.run_chain(class, source, destination, &chain)
            }
        }
    }

    fn run_chain(
        &self,
        class: FormatClass,
        source: &Path,
        destination: &Path,
        chain: &[Box<dyn Extractor>],
    ) -> Result<ExtractionOutcome, UnpackError> {
        fs::create_dir_all(destination)?;
        let name = display_name(source);
        let mut attempts = Vec::new();

        for backend in chain {
            debug!("Extracting {} with {}", name, backend.kind());
            let result = backend.extract(source, destination).and_then(|files| {
                if files == 0 && class == FormatClass::PeExecutable {
                    Err(UnpackError::EmptyExtraction(backend.kind()))
                } else {
                    Ok(files)
                }
            });

            match result {
                Ok(files) => {
                    info!("Extracted {} files from {} with {}", files, name, backend.kind());
                    return Ok(ExtractionOutcome {
                        class,
                        disposition: Disposition::Extracted,
                        backend: Some(backend.kind()),
                        files,
                        destination: destination.to_path_buf(),
                    });
                }
                Err(e) => {
                    self.record_failure(backend.kind(), &name, &e, &mut attempts);
                    self.reset(destination, &mut attempts);
                }
            }
        }

        Err(UnpackError::Exhausted { class, attempts })
    }

    fn unpack_appimage(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<ExtractionOutcome, UnpackError> {
        let name = display_name(source);
        let bytes = fs::read(source)?;
        let offsets = candidate_offsets(source, &bytes, self.options.offset_order)?;
        info!("Found {} potential SquashFS locations in {}", offsets.len(), name);

        let mut attempts = Vec::new();
        let extracted = |backend: BackendKind, files: u64| ExtractionOutcome {
            class: FormatClass::AppImageCandidate,
            disposition: Disposition::Extracted,
            backend: Some(backend),
            files,
            destination: destination.to_path_buf(),
        };

        if let Some(program) = self.tools.get(ToolKind::Unsquash) {
            let tool = UnsquashfsTool::new(program);
            fs::create_dir_all(destination)?;

            for &offset in &offsets {
                // The carve lives only for this trial
                let result = CarvedImage::carve(source, &bytes, offset)
                    .map_err(UnpackError::from)
                    .and_then(|image| tool.extract(image.path(), destination));

                match result {
                    Ok(files) => {
                        info!("Extracted {} with unsquashfs (offset: {})", name, offset);
                        return Ok(extracted(tool.kind(), files));
                    }
                    Err(e) => {
                        debug!("unsquashfs rejected offset {}: {}", offset, e);
                        attempts.push(format!(
                            "{} @{}: {}",
                            tool.kind(),
                            offset,
                            e.diagnostic(self.options.diagnostic_limit)
                        ));
                        self.reset(destination, &mut attempts);
                    }
                }
            }
            warn!("unsquashfs failed for all {} potential offsets of {}", offsets.len(), name);
        }

        // Bundled readers only get the first signature in file order
        let first = offsets.iter().copied().min().unwrap_or_default();
        debug!("Carving SquashFS at offset {} of {}", first, name);
        match CarvedImage::carve(source, &bytes, first) {
            Ok(image) => {
                let bundled: [&dyn Extractor; 2] = [&SquashfsLibrary, &LibarchiveExtractor];
                for backend in bundled {
                    let result = recreate_dir(destination)
                        .map_err(UnpackError::from)
                        .and_then(|()| backend.extract(image.path(), destination));

                    match result {
                        Ok(files) => {
                            info!("Extracted {} files from {} with {}", files, name, backend.kind());
                            return Ok(extracted(backend.kind(), files));
                        }
                        Err(e) => {
                            self.record_failure(backend.kind(), &name, &e, &mut attempts);
                            self.reset(destination, &mut attempts);
                        }
                    }
                }
            }
            Err(e) => attempts.push(format!("carve @{}: {}", first, e)),
        }

        if !self.options.keep_executable_fallback {
            return Err(UnpackError::Exhausted {
                class: FormatClass::AppImageCandidate,
                attempts,
            });
        }

        info!("Keeping AppImage binary {} (can be executed directly)", name);
        Ok(ExtractionOutcome {
            class: FormatClass::AppImageCandidate,
            disposition: Disposition::KeptExecutable,
            backend: None,
            files: 0,
            destination: destination.to_path_buf(),
        })
    }

    fn record_failure(
        &self,
        backend: BackendKind,
        name: &str,
        error: &UnpackError,
        attempts: &mut Vec<String>,
    ) {
        let diagnostic = error.diagnostic(self.options.diagnostic_limit);
        warn!("{} failed for {}: {}", backend, name, diagnostic);
        attempts.push(format!("{}: {}", backend, diagnostic));
    }

    /// Empty the destination after a failed attempt so leftovers cannot pass
    /// for a later success.
    ///
    /// A destination that cannot be cleared is recorded like a failed attempt;
    /// the chain still moves on.
    fn reset(&self, destination: &Path, attempts: &mut Vec<String>) {
        if destination.is_dir() && !is_populated(destination) {
            return;
        }
        debug!("Clearing partial output in {}", destination.display());
        if let Err(e) = clear_dir(destination) {
            let diagnostic = UnpackError::from(e).diagnostic(self.options.diagnostic_limit);
            warn!("Could not clear {}: {}", destination.display(), diagnostic);
            attempts.push(format!("reset {}: {}", destination.display(), diagnostic));
        }
    }
}

fn check_destination(source: &Path, destination: &Path) -> Result<(), UnpackError> {
    // A destination that does not exist yet cannot hold anything
    let (Ok(archive), Ok(dir)) = (fs::canonicalize(source), fs::canonicalize(destination)) else {
        return Ok(());
    };
    if archive.starts_with(&dir) {
        return Err(UnpackError::DestinationContainsSource {
            archive,
            destination: dir,
        });
    }
    Ok(())
}

fn skip_tool(kind: ToolKind) {
    debug!("Skipping chain entry: {}", UnpackError::ToolUnavailable(kind));
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
