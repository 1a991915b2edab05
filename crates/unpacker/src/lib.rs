//! # Unpacker
//!
//! Identifies and extracts editor release artifacts whose names cannot be
//! trusted.
//!
//! Downloads are classified by magic bytes and name, then handed to an ordered
//! chain of extraction backends. A failing backend only means the next one
//! gets a turn.
//!
//! ## Supported Formats
//!
//! - ZIP
//! - TAR.GZ (with "data" filter rules)
//! - Windows installers (Inno Setup via `innoextract`, NSIS/7z via `7z` or the
//!   bundled 7z reader, anything else libarchive can read)
//! - AppImage (the appended SquashFS filesystem, via `unsquashfs` or the bundled
//!   SquashFS reader; the executable itself is kept as a fallback)
//! - DMG (kept as downloaded)
//!
//! ## Example
//!
//! ```rust,no_run
//! use unpacker::{Dispatcher, ToolRegistry, UnpackOptions};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tools = ToolRegistry::discover();
//! let dispatcher = Dispatcher::new(tools, UnpackOptions::default());
//!
//! let outcome = dispatcher.unpack(
//!     Path::new("downloads/Cursor-1.2.3-x86_64.AppImage"),
//!     Path::new("downloads/unpacked"),
//! )?;
//!
//! println!("{:?}: {} files", outcome.disposition, outcome.files);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod safety;
pub mod sniff;
pub mod squashfs;
pub mod tools;
pub mod types;

// Re-export main types
pub use dispatch::Dispatcher;
pub use error::{SecurityError, UnpackError};
pub use sniff::sniff;
pub use tools::ToolRegistry;
pub use types::{
    BackendKind, Disposition, ExtractionOutcome, FormatClass, OffsetOrder, ToolKind,
    UnpackOptions,
};

use std::path::Path;
use tracing::warn;

/// Unpack `source` into `destination` with default options.
///
/// Returns `true` when the artifact is usable afterwards: extracted, a disk
/// image kept as-is, or an AppImage kept as its own executable. Failures are
/// logged, never raised.
pub fn unpack_archive(source: &Path, destination: &Path, tools: &ToolRegistry) -> bool {
    let dispatcher = Dispatcher::new(tools.clone(), UnpackOptions::default());
    match dispatcher.unpack(source, destination) {
        Ok(_) => true,
        Err(e) => {
            warn!(
                "Failed to unpack {}: {}",
                source.display(),
                e.diagnostic(dispatcher.options().diagnostic_limit)
            );
            false
        }
    }
}
