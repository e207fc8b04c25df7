//! Local tool cache.
//!
//! The directory tree is the only record of what is installed; there is no
//! separate index.
//!
//! Structure:
//! ```text
//! <tool_root>/
//! └── CodeQL/
//!     └── 2.3.0/
//!         ├── x64/              # extracted bundle
//!         │   ├── codeql/...
//!         │   └── pinned-version
//!         └── x64.complete      # completion marker
//! ```
//!
//! An entry counts as installed only when both the architecture directory and
//! its sibling `.complete` marker exist.

use semver::Version;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::platform::Arch;
use crate::version::ResolvedSpec;

/// Suffix appended to an entry directory to form its completion marker.
pub const COMPLETE_SUFFIX: &str = "complete";

/// Suffix of the lock file serializing writers of one entry.
pub const LOCK_SUFFIX: &str = "lock";

/// Name of the file written inside every extracted entry.
pub const PINNED_VERSION_FILE: &str = "pinned-version";

/// Tool cache rooted at a directory shared by all tools.
#[derive(Debug, Clone)]
pub struct ToolCache {
    root: PathBuf,
}

impl ToolCache {
    /// Create a cache at the specified root directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every version of `name`.
    #[must_use]
    pub fn tool_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Extraction destination for `(name, version, arch)`.
    #[must_use]
    pub fn entry_dir(&self, name: &str, version: &str, arch: Arch) -> PathBuf {
        self.tool_dir(name).join(version).join(arch.as_str())
    }

    /// Completion marker for `(name, version, arch)`.
    #[must_use]
    pub fn marker_path(&self, name: &str, version: &str, arch: Arch) -> PathBuf {
        marker_for(&self.entry_dir(name, version, arch))
    }

    /// Look up a completed entry.
    ///
    /// A directory without its marker is treated as absent.
    #[must_use]
    pub fn find_local(&self, name: &str, version: &str, arch: Arch) -> Option<PathBuf> {
        let dir = self.entry_dir(name, version, arch);
        if dir.is_dir() && marker_for(&dir).is_file() {
            trace!(%name, %version, %arch, ?dir, "Cache hit");
            Some(dir)
        } else {
            trace!(%name, %version, %arch, "Cache miss");
            None
        }
    }

    /// Highest completed version satisfying `spec`, with its path.
    #[must_use]
    pub fn find_matching(
        &self,
        name: &str,
        spec: &ResolvedSpec,
        arch: Arch,
    ) -> Option<(Version, PathBuf)> {
        if let Some(exact) = spec.exact() {
            return self
                .find_local(name, &exact.to_string(), arch)
                .map(|path| (exact.clone(), path));
        }

        let best = self
            .list_versions(name, arch)
            .iter()
            .filter_map(|v| Version::parse(v).ok())
            .filter(|v| spec.matches(v, false))
            .max()?;
        debug!(%name, version = %best, %spec, "Found cached version for range");
        self.find_local(name, &best.to_string(), arch)
            .map(|path| (best, path))
    }

    /// Versions of `name` with a completed entry for `arch`.
    ///
    /// Unreadable or missing directories yield an empty set.
    #[must_use]
    pub fn list_versions(&self, name: &str, arch: Arch) -> BTreeSet<String> {
        let Ok(entries) = std::fs::read_dir(self.tool_dir(name)) else {
            return BTreeSet::new();
        };

        entries
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|version| self.find_local(name, version, arch).is_some())
            .collect()
    }
}

/// `<dir>.complete`, as a sibling of `dir`.
#[must_use]
pub fn marker_for(dir: &Path) -> PathBuf {
    let mut marker = dir.as_os_str().to_owned();
    marker.push(".");
    marker.push(COMPLETE_SUFFIX);
    PathBuf::from(marker)
}

/// `<dir>.lock`, as a sibling of `dir`.
#[must_use]
pub fn lock_for(dir: &Path) -> PathBuf {
    let mut lock = dir.as_os_str().to_owned();
    lock.push(".");
    lock.push(LOCK_SUFFIX);
    PathBuf::from(lock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn install(cache: &ToolCache, version: &str, arch: Arch, complete: bool) -> PathBuf {
        let dir = cache.entry_dir("CodeQL", version, arch);
        std::fs::create_dir_all(dir.join("codeql")).unwrap();
        std::fs::write(dir.join("codeql").join("codeql"), b"#!/bin/sh").unwrap();
        if complete {
            std::fs::write(marker_for(&dir), b"").unwrap();
        }
        dir
    }

    #[test]
    fn test_cache_paths() {
        let cache = ToolCache::new("/opt/tools");
        assert_eq!(
            cache.entry_dir("CodeQL", "2.3.0", Arch::X64),
            PathBuf::from("/opt/tools/CodeQL/2.3.0/x64")
        );
        assert_eq!(
            cache.marker_path("CodeQL", "2.3.0", Arch::X64),
            PathBuf::from("/opt/tools/CodeQL/2.3.0/x64.complete")
        );
        assert_eq!(
            lock_for(&cache.entry_dir("CodeQL", "2.3.0", Arch::X64)),
            PathBuf::from("/opt/tools/CodeQL/2.3.0/x64.lock")
        );
    }

    #[test]
    fn test_find_local_requires_marker() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path());

        let dir = install(&cache, "2.3.0", Arch::X64, true);
        assert_eq!(cache.find_local("CodeQL", "2.3.0", Arch::X64), Some(dir));

        std::fs::remove_file(cache.marker_path("CodeQL", "2.3.0", Arch::X64)).unwrap();
        assert!(cache.find_local("CodeQL", "2.3.0", Arch::X64).is_none());
        assert!(cache.entry_dir("CodeQL", "2.3.0", Arch::X64).join("codeql").exists());
    }

    #[test]
    fn test_find_local_requires_directory() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path());

        let marker = cache.marker_path("CodeQL", "2.3.0", Arch::X64);
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, b"").unwrap();

        assert!(cache.find_local("CodeQL", "2.3.0", Arch::X64).is_none());
    }

    #[test]
    fn test_find_local_is_arch_scoped() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path());
        install(&cache, "2.3.0", Arch::Arm64, true);

        assert!(cache.find_local("CodeQL", "2.3.0", Arch::X64).is_none());
        assert!(cache.find_local("CodeQL", "2.3.0", Arch::Arm64).is_some());
    }

    #[test]
    fn test_list_versions_only_completed() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path());
        install(&cache, "2.3.0", Arch::X64, true);
        install(&cache, "2.4.1", Arch::X64, true);
        install(&cache, "2.5.0", Arch::X64, false);
        install(&cache, "2.6.0", Arch::Arm64, true);

        let versions: Vec<_> = cache.list_versions("CodeQL", Arch::X64).into_iter().collect();
        assert_eq!(versions, vec!["2.3.0".to_string(), "2.4.1".to_string()]);
    }

    #[test]
    fn test_list_versions_missing_tool() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path());
        assert!(cache.list_versions("CodeQL", Arch::X64).is_empty());
    }

    #[test]
    fn test_find_matching_picks_highest_in_range() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path());
        install(&cache, "2.3.0", Arch::X64, true);
        install(&cache, "2.4.1", Arch::X64, true);
        install(&cache, "3.0.0", Arch::X64, true);
        install(&cache, "2.9.0", Arch::X64, false);

        let spec = ResolvedSpec::parse(">=2.0.0 <3.0.0").unwrap();
        let (version, path) = cache.find_matching("CodeQL", &spec, Arch::X64).unwrap();
        assert_eq!(version.to_string(), "2.4.1");
        assert_eq!(path, cache.entry_dir("CodeQL", "2.4.1", Arch::X64));
    }

    #[test]
    fn test_find_matching_exact() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path());
        install(&cache, "2.3.0", Arch::X64, true);

        let hit = ResolvedSpec::parse("2.3.0").unwrap();
        assert!(cache.find_matching("CodeQL", &hit, Arch::X64).is_some());

        let miss = ResolvedSpec::parse("2.3.1").unwrap();
        assert!(cache.find_matching("CodeQL", &miss, Arch::X64).is_none());
    }

    #[test]
    fn test_find_matching_partial_specs() {
        let temp = TempDir::new().unwrap();
        let cache = ToolCache::new(temp.path());
        install(&cache, "2.3.1", Arch::X64, true);
        install(&cache, "2.4.1", Arch::X64, true);
        install(&cache, "3.0.0", Arch::X64, true);

        let minor = ResolvedSpec::parse("2.3").unwrap();
        let (version, _) = cache.find_matching("CodeQL", &minor, Arch::X64).unwrap();
        assert_eq!(version.to_string(), "2.3.1");

        let major = ResolvedSpec::parse("2").unwrap();
        let (version, _) = cache.find_matching("CodeQL", &major, Arch::X64).unwrap();
        assert_eq!(version.to_string(), "2.4.1");
    }
}
