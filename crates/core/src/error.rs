//! Error types for bundle installation.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Boxed underlying cause of an extraction failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for install operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The release manifest could not be downloaded or was empty.
    #[error("Failed to download the release manifest from {url}: {message}")]
    #[diagnostic(
        code(toolcache::manifest_download_failed),
        help("Check network access to the release endpoint, or pass a token to avoid rate limits")
    )]
    ManifestDownloadFailed {
        /// Endpoint that was queried.
        url: String,
        /// What went wrong.
        message: String,
    },

    /// No release satisfies the version spec for this platform.
    #[error("No release matching '{spec}' carries a bundle for {platform}")]
    #[diagnostic(code(toolcache::asset_not_found))]
    AssetNotFound {
        /// Version spec as given by the caller.
        spec: String,
        /// Host platform the asset was looked up for.
        platform: String,
    },

    /// Fetching a release asset failed.
    #[error("Failed to download {url}: {message}")]
    #[diagnostic(code(toolcache::download_failed))]
    DownloadFailed {
        /// Asset URL.
        url: String,
        /// What went wrong.
        message: String,
    },

    /// Unpacking a downloaded archive failed.
    #[error("Failed to extract {}", archive.display())]
    #[diagnostic(
        code(toolcache::extraction_failed),
        help("The archive may be corrupt or the disk may be full")
    )]
    ExtractionFailed {
        /// Archive being unpacked.
        archive: PathBuf,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },

    /// Neither the cache nor the download fallback produced an installation.
    #[error("Version '{spec}' was not found in the tool cache at {}", tool_root.display())]
    #[diagnostic(code(toolcache::version_not_found))]
    VersionNotFound {
        /// Version spec as given by the caller.
        spec: String,
        /// Root of the tool cache.
        tool_root: PathBuf,
        /// Versions currently present in the cache.
        available: Vec<String>,
        /// Rendered listing of `available`.
        #[help]
        listing: Option<String>,
    },

    /// The version spec is neither "latest" nor a semantic version range.
    #[error("Invalid version spec '{spec}': {message}")]
    #[diagnostic(
        code(toolcache::invalid_version_spec),
        help("Use 'latest', an exact version such as 2.3.0, or a range such as >=2.0.0")
    )]
    InvalidVersionSpec {
        /// The rejected spec.
        spec: String,
        /// Parser message.
        message: String,
    },

    /// I/O error with path context.
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(toolcache::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available.
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "create").
        operation: String,
    },
}

fn version_help(available: &[String]) -> String {
    let listing = if available.is_empty() {
        "  (none)".to_string()
    } else {
        available
            .iter()
            .map(|v| format!("  {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Versions available in the tool cache:\n{listing}\n\
         Releases can be found at https://github.com/github/codeql-action/releases"
    )
}

impl Error {
    /// Create a manifest download error.
    #[must_use]
    pub fn manifest_download_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ManifestDownloadFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an asset-not-found error.
    #[must_use]
    pub fn asset_not_found(spec: impl Into<String>, platform: impl Into<String>) -> Self {
        Self::AssetNotFound {
            spec: spec.into(),
            platform: platform.into(),
        }
    }

    /// Create a download error.
    #[must_use]
    pub fn download_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an extraction error from any underlying cause.
    #[must_use]
    pub fn extraction_failed(archive: impl AsRef<Path>, source: impl Into<BoxError>) -> Self {
        Self::ExtractionFailed {
            archive: archive.as_ref().to_path_buf(),
            source: source.into(),
        }
    }

    /// Create a version-not-found error carrying the cached versions.
    #[must_use]
    pub fn version_not_found(
        spec: impl Into<String>,
        tool_root: impl AsRef<Path>,
        available: Vec<String>,
    ) -> Self {
        Self::VersionNotFound {
            spec: spec.into(),
            tool_root: tool_root.as_ref().to_path_buf(),
            listing: Some(version_help(&available)),
            available,
        }
    }

    /// Create an invalid version spec error.
    #[must_use]
    pub fn invalid_version_spec(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidVersionSpec {
            spec: spec.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with path context.
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }
}

/// Result type for install operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_not_found_lists_versions() {
        let err = Error::version_not_found(
            "9.9.9",
            "/opt/tools",
            vec!["2.3.0".to_string(), "2.4.1".to_string()],
        );
        assert!(err.to_string().contains("9.9.9"));

        let help = err.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("  2.3.0"));
        assert!(help.contains("  2.4.1"));
    }

    #[test]
    fn test_version_not_found_empty_listing() {
        let err = Error::version_not_found("9.9.9", "/opt/tools", Vec::new());
        let help = err.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("(none)"));
    }

    #[test]
    fn test_extraction_failed_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err = Error::extraction_failed("/tmp/bundle.tar.gz", io);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("truncated"));
    }

    #[test]
    fn test_io_error_display_includes_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::io(io, "/opt/tools/CodeQL", "create");
        assert_eq!(err.to_string(), "I/O create failed: /opt/tools/CodeQL");
    }
}
