//! Error types for sniffing and extraction.

use crate::types::{BackendKind, FormatClass, ToolKind};
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Main error type for unpacking operations.
#[derive(Debug, Error)]
pub enum UnpackError {
    /// Archive file not found at the specified path.
    #[error("Archive not found: {0}")]
    NotFound(PathBuf),

    /// No classification rule matched.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A chain entry needs a tool that is not registered.
    #[error("Tool not available: {0}")]
    ToolUnavailable(ToolKind),

    /// An external tool exited with a non-zero status.
    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        /// Backend that ran the tool
        tool: BackendKind,
        /// Exit status of the subprocess
        status: ExitStatus,
        /// Captured standard error
        stderr: String,
    },

    /// The container is malformed or the reader rejected it.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A security violation was detected in an entry.
    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),

    /// An AppImage contains no SquashFS signature at all.
    #[error("No embedded SquashFS filesystem in {0}")]
    NoEmbeddedFilesystem(PathBuf),

    /// The destination directory holds the archive itself; clearing a failed
    /// attempt would delete it.
    #[error("Destination {} contains the archive {}", destination.display(), archive.display())]
    DestinationContainsSource {
        /// The archive being unpacked
        archive: PathBuf,
        /// The rejected destination
        destination: PathBuf,
    },

    /// The backend reported success but wrote nothing.
    #[error("{0} extracted no files")]
    EmptyExtraction(BackendKind),

    /// Every backend in the chain failed.
    #[error("All {} backends failed for {class}: {}", attempts.len(), attempts.join("; "))]
    Exhausted {
        /// Sniffed class of the source
        class: FormatClass,
        /// One diagnostic line per failed attempt
        attempts: Vec<String>,
    },

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UnpackError {
    /// Only a missing input aborts the call outright; everything else just
    /// advances the chain.
    pub fn is_fatal(&self) -> bool {
        matches!(self, UnpackError::NotFound(_))
    }

    /// Error text cut to at most `limit` characters.
    pub fn diagnostic(&self, limit: usize) -> String {
        truncate(&self.to_string(), limit)
    }
}

/// Security-related errors during extraction.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Path traversal attempt detected (e.g., "../../../etc/passwd").
    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    /// Absolute path not allowed in archive entries.
    #[error("Absolute path not allowed: {0}")]
    AbsolutePath(String),

    /// Unsafe entry type detected (device, fifo, ...).
    #[error("Unsafe entry type: {0}")]
    UnsafeEntryType(String),

    /// A link points outside the destination directory.
    #[error("Link escapes destination: {0}")]
    LinkEscape(String),
}

pub(crate) fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_text() {
        assert_eq!(truncate("short", 200), "short");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 4), "héll...");
    }

    #[test]
    fn test_only_not_found_is_fatal() {
        assert!(UnpackError::NotFound(PathBuf::from("x")).is_fatal());
        assert!(!UnpackError::Decode("bad".into()).is_fatal());
        assert!(!UnpackError::NoEmbeddedFilesystem(PathBuf::from("x")).is_fatal());
    }
}
