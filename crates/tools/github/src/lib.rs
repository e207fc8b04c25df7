//! GitHub Releases source for toolcache.
//!
//! Lists the releases of a repository through the GitHub REST API and
//! downloads release assets. Supports:
//! - Optional `token` authentication (anonymous calls are rate-limited)
//! - A total timeout on manifest calls; asset downloads are only bounded by
//!   connect and read timeouts so large bundles can stream on slow links
//! - Streaming downloads into a private temporary directory

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use toolcache_core::{Asset, DownloadedArchive, Error, Release, ReleaseSource, Result};
use tracing::{debug, warn};

/// Release list of the CodeQL bundle.
pub const DEFAULT_RELEASES_URL: &str = "https://api.github.com/repos/github/codeql-action/releases";

/// Newest release of the CodeQL bundle.
pub const DEFAULT_LATEST_URL: &str =
    "https://api.github.com/repos/github/codeql-action/releases/latest";

/// Default total timeout for a manifest request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default timeout for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit on a stalled read, between two received chunks.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for [`GitHubReleases`].
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// Endpoint returning the JSON array of releases.
    pub releases_url: String,
    /// Endpoint returning the newest release.
    pub latest_url: String,
    /// Token sent as `Authorization: token <value>`.
    pub token: Option<String>,
    /// Total timeout of a manifest request.
    pub timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Timeout for a single read; the only bound on an asset download body.
    pub read_timeout: Duration,
    /// `User-Agent` header value; GitHub rejects requests without one.
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            releases_url: DEFAULT_RELEASES_URL.to_string(),
            latest_url: DEFAULT_LATEST_URL.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            user_agent: format!("toolcache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GitHubConfig {
    /// Set the authentication token. Empty tokens are ignored.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Set the total timeout of manifest requests.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the stalled-read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Point both endpoints at a releases URL; the latest endpoint is
    /// `<releases_url>/latest`.
    #[must_use]
    pub fn with_releases_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.latest_url = format!("{}/latest", url.trim_end_matches('/'));
        self.releases_url = url;
        self
    }

    /// Override the latest-release endpoint.
    #[must_use]
    pub fn with_latest_url(mut self, url: impl Into<String>) -> Self {
        self.latest_url = url.into();
        self
    }
}

/// Release source backed by the GitHub Releases API.
pub struct GitHubReleases {
    client: Client,
    config: GitHubConfig,
}

impl GitHubReleases {
    /// Create a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend
    /// initialization failure).
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(|e| {
                Error::manifest_download_failed(
                    &config.releases_url,
                    format!("failed to create HTTP client: {e}"),
                )
            })?;
        Ok(Self { client, config })
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    /// Attach the token header, or warn that the request is anonymous.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.config.token {
            request.header("Authorization", format!("token {token}"))
        } else {
            warn!("No GitHub token supplied; anonymous requests are rate-limited");
            request
        }
    }

    /// GET `url` and decode a non-empty JSON body.
    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(%url, "Fetching release manifest");

        let request = self
            .authorize(self.client.get(url))
            .header("Accept", "application/vnd.github+json")
            .timeout(self.config.timeout);
        let response = request
            .send()
            .await
            .map_err(|e| Error::manifest_download_failed(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::manifest_download_failed(
                url,
                format!("HTTP {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::manifest_download_failed(url, e.to_string()))?;
        if body.trim().is_empty() {
            return Err(Error::manifest_download_failed(url, "empty response body"));
        }

        let parsed: Option<T> = serde_json::from_str(&body).map_err(|e| {
            Error::manifest_download_failed(url, format!("invalid release document: {e}"))
        })?;
        parsed.ok_or_else(|| Error::manifest_download_failed(url, "empty response body"))
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleases {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn fetch_all(&self) -> Result<Vec<Release>> {
        let releases: Vec<Release> = self.fetch_json(&self.config.releases_url).await?;
        debug!(count = releases.len(), "Fetched releases");
        Ok(releases)
    }

    async fn fetch_latest(&self) -> Result<Release> {
        let release: Release = self.fetch_json(&self.config.latest_url).await?;
        debug!(tag = %release.tag_name, "Fetched latest release");
        Ok(release)
    }

    async fn download(&self, asset: &Asset) -> Result<DownloadedArchive> {
        let url = asset.browser_download_url.as_str();
        let file_name = Path::new(&asset.name)
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                Error::download_failed(url, format!("invalid asset name '{}'", asset.name))
            })?;

        let dir = tempfile::Builder::new()
            .prefix("toolcache-")
            .tempdir()
            .map_err(|e| Error::io(e, std::env::temp_dir(), "create download directory"))?;
        let archive = DownloadedArchive::new(dir, file_name);

        debug!(%url, dest = ?archive.path(), "Downloading asset");

        let mut response = self
            .authorize(self.client.get(url))
            .header("Accept", "application/octet-stream")
            .send()
            .await
            .map_err(|e| Error::download_failed(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::download_failed(url, format!("HTTP {status}")));
        }

        let mut file = tokio::fs::File::create(archive.path())
            .await
            .map_err(|e| Error::io(e, archive.path(), "create"))?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::download_failed(url, e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io(e, archive.path(), "write"))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| Error::io(e, archive.path(), "write"))?;

        debug!(%url, bytes = written, expected = asset.size, "Downloaded asset");
        Ok(archive)
    }
}
