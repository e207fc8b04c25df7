//! Release/asset selection.

use semver::Version;
use tracing::{debug, trace};

use crate::platform::Platform;
use crate::source::{Asset, Release};
use crate::version::{ResolvedSpec, version_from_tag};
use crate::{Error, Result};

/// The release and asset chosen for installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMatch {
    /// Version parsed from the release tag.
    pub version: Version,
    /// Tag of the chosen release.
    pub tag: String,
    /// The platform bundle within that release.
    pub asset: Asset,
}

/// Scan `releases` in order and return the first release that satisfies
/// `resolved` and carries the bundle for `platform`.
///
/// Drafts and prereleases are skipped unless `allow_unstable` is set. Tags
/// without a parseable version are skipped. There is no global "best"
/// selection: manifest order decides.
///
/// # Errors
///
/// Returns [`Error::AssetNotFound`] carrying `spec` when nothing matches.
pub fn find_asset(
    releases: &[Release],
    resolved: &ResolvedSpec,
    spec: &str,
    allow_unstable: bool,
    platform: &Platform,
) -> Result<AssetMatch> {
    let wanted = platform.bundle_asset_name();

    for release in releases {
        if release.is_unstable() && !allow_unstable {
            trace!(tag = %release.tag_name, "Skipping unstable release");
            continue;
        }

        let Some(version) = version_from_tag(&release.tag_name) else {
            debug!(tag = %release.tag_name, "Skipping release with unparseable tag");
            continue;
        };

        if !resolved.matches(&version, allow_unstable) {
            trace!(tag = %release.tag_name, %resolved, "Release does not satisfy spec");
            continue;
        }

        let Some(asset) = release.assets.iter().find(|a| a.name == wanted) else {
            trace!(tag = %release.tag_name, %wanted, "Release has no bundle for platform");
            continue;
        };

        debug!(tag = %release.tag_name, asset = %asset.name, "Matched release asset");
        return Ok(AssetMatch {
            version,
            tag: release.tag_name.clone(),
            asset: asset.clone(),
        });
    }

    Err(Error::asset_not_found(spec, platform.to_string()))
}
