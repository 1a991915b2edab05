//! Discovery of optional external extraction tools.

use crate::types::ToolKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The set of external tools found on the host.
///
/// Built once per run and passed to the dispatcher; never mutated afterwards.
/// A missing tool is not an error, it only narrows which backends are eligible.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolKind, PathBuf>,
}

impl ToolRegistry {
    /// A registry with no tools; only bundled backends will run.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Probe the process `PATH`.
    pub fn discover() -> Self {
        Self::probe(|name| which::which(name).ok())
    }

    /// Probe an explicit search path instead of the process `PATH`.
    pub fn discover_in(search_path: impl AsRef<OsStr>) -> Self {
        let search_path = search_path.as_ref();
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::probe(|name| which::which_in(name, Some(search_path), &cwd).ok())
    }

    fn probe(mut lookup: impl FnMut(&str) -> Option<PathBuf>) -> Self {
        let mut tools = BTreeMap::new();

        for kind in ToolKind::ALL {
            let found = kind
                .candidates()
                .iter()
                .find_map(|name| lookup(name).map(|path| (*name, path)));

            match found {
                Some((name, path)) => {
                    debug!("Found {}: {}", name, path.display());
                    tools.insert(kind, path);
                }
                None => {
                    warn!("{} not found in PATH. Install with: {}", kind, kind.install_hint());
                }
            }
        }

        Self { tools }
    }

    /// Register `kind` at `path`, replacing any earlier entry.
    pub fn with_tool(mut self, kind: ToolKind, path: impl Into<PathBuf>) -> Self {
        self.tools.insert(kind, path.into());
        self
    }

    pub fn get(&self, kind: ToolKind) -> Option<&Path> {
        self.tools.get(&kind).map(PathBuf::as_path)
    }

    pub fn contains(&self, kind: ToolKind) -> bool {
        self.tools.contains_key(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ToolKind, &Path)> {
        self.tools.iter().map(|(kind, path)| (*kind, path.as_path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.get(ToolKind::Unsquash).is_none());
    }

    #[test]
    fn test_probe_picks_first_seven_zip_name() {
        let registry = ToolRegistry::probe(|name| match name {
            "7za" => Some(PathBuf::from("/opt/bin/7za")),
            "7zz" => Some(PathBuf::from("/opt/bin/7zz")),
            _ => None,
        });

        assert_eq!(registry.get(ToolKind::SevenZip), Some(Path::new("/opt/bin/7za")));
        assert!(!registry.contains(ToolKind::Unsquash));
        assert!(!registry.contains(ToolKind::InnoExtract));
    }

    #[test]
    fn test_probe_all_tools() {
        let registry = ToolRegistry::probe(|name| Some(PathBuf::from("/usr/bin").join(name)));
        let found: Vec<_> = registry.iter().collect();
        assert_eq!(
            found,
            vec![
                (ToolKind::Unsquash, Path::new("/usr/bin/unsquashfs")),
                (ToolKind::SevenZip, Path::new("/usr/bin/7z")),
                (ToolKind::InnoExtract, Path::new("/usr/bin/innoextract")),
            ]
        );
    }

    #[test]
    fn test_discover_in_empty_search_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let registry = ToolRegistry::discover_in(temp_dir.path());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_with_tool_overrides() {
        let registry = ToolRegistry::empty()
            .with_tool(ToolKind::InnoExtract, "/a/innoextract")
            .with_tool(ToolKind::InnoExtract, "/b/innoextract");
        assert_eq!(registry.get(ToolKind::InnoExtract), Some(Path::new("/b/innoextract")));
    }
}
