//! Release source trait and the release manifest model.
//!
//! A [`ReleaseSource`] lists published releases and downloads their assets.
//! The GitHub Releases implementation lives in `toolcache-tools-github`; the
//! installer only depends on this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::Result;

/// One published release.
///
/// Only the fields the installer reads are modelled; the rest of the
/// provider payload is discarded during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Tag identifier, e.g. `codeql-bundle-v2.3.0`.
    pub tag_name: String,
    /// Unpublished draft release.
    #[serde(default)]
    pub draft: bool,
    /// Marked as a prerelease by the publisher.
    #[serde(default)]
    pub prerelease: bool,
    /// Downloadable files, in provider order.
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Release {
    /// Whether this release is a draft or a prerelease.
    #[must_use]
    pub fn is_unstable(&self) -> bool {
        self.draft || self.prerelease
    }
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Filename.
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
    /// Size in bytes as reported by the provider.
    #[serde(default)]
    pub size: u64,
}

/// An archive downloaded into a private temporary directory.
///
/// The directory (and the archive) is removed when this value is dropped.
#[derive(Debug)]
pub struct DownloadedArchive {
    dir: TempDir,
    path: PathBuf,
}

impl DownloadedArchive {
    /// Wrap a file named `file_name` inside `dir`.
    #[must_use]
    pub fn new(dir: TempDir, file_name: &str) -> Self {
        let path = dir.path().join(file_name);
        Self { dir, path }
    }

    /// Path to the archive file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The temporary directory holding the archive.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// A provider of releases and their assets.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Provider name used in logs (e.g. "github").
    fn name(&self) -> &'static str;

    /// Fetch every release, in the provider's order (newest first).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ManifestDownloadFailed`](crate::Error::ManifestDownloadFailed)
    /// if the request fails or the body is empty.
    async fn fetch_all(&self) -> Result<Vec<Release>>;

    /// Fetch the single newest release.
    ///
    /// # Errors
    ///
    /// Same as [`ReleaseSource::fetch_all`].
    async fn fetch_latest(&self) -> Result<Release>;

    /// Download an asset into a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DownloadFailed`](crate::Error::DownloadFailed) on
    /// network failure, or an I/O error if the file cannot be written.
    async fn download(&self, asset: &Asset) -> Result<DownloadedArchive>;
}
