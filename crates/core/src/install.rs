//! Cache-first install flow.
//!
//! ```text
//! RESOLVE → CHECK_CACHE ─ hit ─────────────────────────────────────────────→ DONE
//!                       └ miss → FETCH_MANIFEST → MATCH_ASSET → DOWNLOAD
//!                                → EXTRACT → RECHECK_CACHE ───────────────→ DONE
//! ```
//!
//! Failures while fetching, matching or downloading are logged and collapse
//! into a single [`Error::VersionNotFound`] listing what is cached. Extraction
//! failures are returned as-is. Nothing is retried.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

use crate::cache::ToolCache;
use crate::config::InstallConfig;
use crate::extract::extract_to_cache;
use crate::matcher::{AssetMatch, find_asset};
use crate::source::{DownloadedArchive, ReleaseSource};
use crate::version::{self, LATEST, ResolvedSpec, is_exact_version};
use crate::{Error, Result};

/// Where an installation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Served from an existing cache entry.
    Cached,
    /// Downloaded and extracted by this invocation.
    Downloaded,
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Installation {
    /// Concrete version installed.
    pub version: String,
    /// Absolute path to the cache entry.
    pub path: PathBuf,
    /// Whether the entry was reused or freshly downloaded.
    pub provenance: Provenance,
}

impl Installation {
    /// Whether the installation was served from the cache.
    #[must_use]
    pub fn from_cache(&self) -> bool {
        self.provenance == Provenance::Cached
    }
}

/// Installs one tool bundle using a [`ReleaseSource`] as the download fallback.
pub struct Installer<S> {
    source: S,
    config: InstallConfig,
    cache: ToolCache,
}

impl<S: ReleaseSource> Installer<S> {
    /// Create an installer over the cache at `config.tool_root`.
    pub fn new(source: S, config: InstallConfig) -> Self {
        let cache = ToolCache::new(config.tool_root.clone());
        Self {
            source,
            config,
            cache,
        }
    }

    /// The tool cache this installer registers into.
    #[must_use]
    pub fn cache(&self) -> &ToolCache {
        &self.cache
    }

    /// The configuration this installer runs with.
    #[must_use]
    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Run the install flow.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidVersionSpec`] or a manifest error while resolving `latest`
    /// - [`Error::ExtractionFailed`] if the downloaded bundle cannot be unpacked
    /// - [`Error::VersionNotFound`] if neither the cache nor the download
    ///   fallback produced an installation
    #[instrument(
        name = "install",
        skip(self),
        fields(
            tool = %self.config.tool_name,
            spec = %self.config.version_spec,
            platform = %self.config.platform,
            source = self.source.name(),
        )
    )]
    pub async fn install(&self) -> Result<Installation> {
        let spec = self.config.version_spec.trim();
        let name = self.config.tool_name.as_str();
        let arch = self.config.platform.arch;

        let resolved = if spec == LATEST && self.config.disable_download {
            // No network: "latest" means the newest cached version.
            ResolvedSpec::any()
        } else {
            version::resolve(spec, &self.source).await?
        };
        debug!(%resolved, "Resolved version spec");

        if spec != LATEST && is_exact_version(spec) {
            warn!(
                %spec,
                "Pinning an exact version is not recommended; use a range such as '2.x' to pick up fixes"
            );
        }

        if let Some((version, path)) = self.cache.find_matching(name, &resolved, arch) {
            info!(%version, ?path, "Using cached installation");
            return Ok(Installation {
                version: version.to_string(),
                path,
                provenance: Provenance::Cached,
            });
        }
        debug!(%resolved, "No local installation matches");

        if self.config.disable_download {
            warn!("Download from the registry is disabled and the cache has no match");
            return Err(self.not_found());
        }

        let (matched, archive) = match self.fetch(&resolved, spec).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Could not download from the registry");
                return Err(self.not_found());
            }
        };

        let version = matched.version.to_string();
        let destination = self.cache.entry_dir(name, &version, arch);
        let archive_path = archive.path().to_path_buf();
        let extraction = {
            let archive_path = archive_path.clone();
            let destination = destination.clone();
            let version = version.clone();
            tokio::task::spawn_blocking(move || {
                extract_to_cache(&archive_path, &destination, &version)
            })
        };
        extraction
            .await
            .map_err(|e| Error::extraction_failed(&archive_path, e))??;
        drop(archive);

        if let Some(path) = self.cache.find_local(name, &version, arch) {
            info!(%version, ?path, tag = %matched.tag, "Installed from registry");
            return Ok(Installation {
                version,
                path,
                provenance: Provenance::Downloaded,
            });
        }

        warn!(?destination, "Extracted entry is not registered in the cache");
        Err(self.not_found())
    }

    /// FETCH_MANIFEST → MATCH_ASSET → DOWNLOAD.
    async fn fetch(
        &self,
        resolved: &ResolvedSpec,
        spec: &str,
    ) -> Result<(AssetMatch, DownloadedArchive)> {
        debug!("Fetching release manifest");
        let releases = self.source.fetch_all().await?;
        debug!(count = releases.len(), "Fetched release manifest");

        let matched = find_asset(
            &releases,
            resolved,
            spec,
            self.config.allow_unstable,
            &self.config.platform,
        )?;

        info!(
            tag = %matched.tag,
            asset = %matched.asset.name,
            size = matched.asset.size,
            "Downloading bundle"
        );
        let archive = self.source.download(&matched.asset).await?;
        debug!(path = ?archive.path(), "Downloaded bundle");
        Ok((matched, archive))
    }

    fn not_found(&self) -> Error {
        let available = self
            .cache
            .list_versions(&self.config.tool_name, self.config.platform.arch)
            .into_iter()
            .collect();
        Error::version_not_found(&self.config.version_spec, self.cache.root(), available)
    }
}
