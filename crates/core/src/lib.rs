//! Core of the bundle installer.
//!
//! Resolves a version spec, looks the result up in the local tool cache and,
//! on a miss, downloads and extracts the matching platform bundle from a
//! [`ReleaseSource`], registering it for later runs.
//!
//! # Example
//!
//! ```ignore
//! use toolcache_core::{InstallConfig, Installer};
//! use toolcache_tools_github::{GitHubConfig, GitHubReleases};
//!
//! let source = GitHubReleases::new(GitHubConfig::default())?;
//! let installer = Installer::new(source, InstallConfig::new(">=2.0.0"));
//! let installation = installer.install().await?;
//! println!("{}", installation.path.display());
//! ```

pub mod cache;
pub mod config;
mod error;
pub mod extract;
pub mod install;
pub mod matcher;
pub mod platform;
pub mod source;
pub mod version;

pub use cache::ToolCache;
pub use config::{DEFAULT_TOOL_NAME, InstallConfig, default_tool_root};
pub use error::{BoxError, Error, Result};
pub use install::{Installation, Installer, Provenance};
pub use matcher::{AssetMatch, find_asset};
pub use platform::{Arch, Os, Platform};
pub use source::{Asset, DownloadedArchive, Release, ReleaseSource};
pub use version::{LATEST, ResolvedSpec, is_exact_version, version_from_tag};
