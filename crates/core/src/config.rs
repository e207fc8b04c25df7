//! Install configuration.
//!
//! Everything the installer needs is carried in an [`InstallConfig`] value
//! built by the caller; library code never reads the process environment.

use std::path::PathBuf;

use crate::platform::Platform;
use crate::version::LATEST;

/// Tool name used for the cache directory when none is given.
pub const DEFAULT_TOOL_NAME: &str = "CodeQL";

/// Options for a single install.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// `latest` or a semantic version range/exact value.
    pub version_spec: String,
    /// Directory name of the tool inside the cache root.
    pub tool_name: String,
    /// Root of the tool cache.
    pub tool_root: PathBuf,
    /// Consider draft and prerelease releases.
    pub allow_unstable: bool,
    /// Only use the local cache; never hit the network.
    pub disable_download: bool,
    /// Platform whose bundle is installed.
    pub platform: Platform,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            version_spec: LATEST.to_string(),
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            tool_root: default_tool_root(),
            allow_unstable: false,
            disable_download: false,
            platform: Platform::current(),
        }
    }
}

impl InstallConfig {
    /// Create options for `version_spec` with defaults for everything else.
    #[must_use]
    pub fn new(version_spec: impl Into<String>) -> Self {
        Self {
            version_spec: version_spec.into(),
            ..Self::default()
        }
    }

    /// Set the tool cache root.
    #[must_use]
    pub fn with_tool_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool_root = path.into();
        self
    }

    /// Set the tool name.
    #[must_use]
    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self
    }

    /// Allow draft and prerelease releases.
    #[must_use]
    pub fn with_allow_unstable(mut self, allow: bool) -> Self {
        self.allow_unstable = allow;
        self
    }

    /// Disable the download fallback.
    #[must_use]
    pub fn with_disable_download(mut self, disable: bool) -> Self {
        self.disable_download = disable;
        self
    }

    /// Override the target platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

/// Get the default tool cache root, `~/.cache/toolcache`.
#[must_use]
pub fn default_tool_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("toolcache")
}
