//! Version spec resolution.
//!
//! A version spec is either the literal `latest` or a semantic version
//! range/exact value. `latest` is turned into a concrete version by asking the
//! release source for its newest release; everything else is parsed here and
//! satisfied later by the asset matcher.

use semver::{Version, VersionReq};
use std::fmt;
use tracing::debug;

use crate::source::ReleaseSource;
use crate::{Error, Result};

/// The literal spec that asks for the newest published release.
pub const LATEST: &str = "latest";

/// Separator between the bundle name and its version in release tags
/// (`codeql-bundle-v2.3.0`).
pub const TAG_VERSION_SEPARATOR: &str = "-v";

/// A version spec after resolution, ready to be matched against releases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSpec {
    /// A single concrete version.
    Exact(Version),
    /// Comparator sets joined by `||`; a version matches if any set does.
    Range(Vec<VersionReq>),
}

impl ResolvedSpec {
    /// A range matching every stable version.
    #[must_use]
    pub fn any() -> Self {
        Self::Range(vec![VersionReq::STAR])
    }

    /// Parse a non-`latest` spec using Node-style range rules.
    ///
    /// - `2.3.0` is an exact pin; `2.3` means `2.3.x` and `2` means `2.x`
    /// - `>=2.0.0 <3.0.0` and `>=2.0.0, <3.0.0` are the same set
    /// - `2.0.0 - 2.5` is the inclusive hyphen range `>=2.0.0, <2.6.0`
    /// - `2.3.x || 2.5.x` matches either side
    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if let Ok(version) = Version::parse(bare) {
            return Ok(Self::Exact(version));
        }

        trimmed
            .split("||")
            .map(|set| {
                VersionReq::parse(&normalize_range(set))
                    .map_err(|e| Error::invalid_version_spec(spec, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::Range)
    }

    /// Whether `version` satisfies this spec.
    ///
    /// Prerelease versions only satisfy a range when `allow_prerelease` is set.
    #[must_use]
    pub fn matches(&self, version: &Version, allow_prerelease: bool) -> bool {
        match self {
            Self::Exact(exact) => exact == version,
            Self::Range(sets) => sets
                .iter()
                .any(|req| set_matches(req, version, allow_prerelease)),
        }
    }

    /// The concrete version, if this spec names exactly one.
    #[must_use]
    pub fn exact(&self) -> Option<&Version> {
        match self {
            Self::Exact(version) => Some(version),
            Self::Range(_) => None,
        }
    }
}

fn set_matches(req: &VersionReq, version: &Version, allow_prerelease: bool) -> bool {
    if req.matches(version) {
        return true;
    }
    if allow_prerelease && !version.pre.is_empty() {
        let mut release = version.clone();
        release.pre = semver::Prerelease::EMPTY;
        return req.matches(&release);
    }
    false
}

impl fmt::Display for ResolvedSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(version) => write!(f, "{version}"),
            Self::Range(sets) => {
                for (i, req) in sets.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" || ")?;
                    }
                    write!(f, "{req}")?;
                }
                Ok(())
            }
        }
    }
}

/// Resolve a caller-supplied spec.
///
/// `latest` costs one `fetch_latest` call; any other spec is parsed locally.
pub async fn resolve<S>(spec: &str, source: &S) -> Result<ResolvedSpec>
where
    S: ReleaseSource + ?Sized,
{
    if spec.trim() != LATEST {
        return ResolvedSpec::parse(spec);
    }

    let release = source.fetch_latest().await?;
    let version = version_from_tag(&release.tag_name).ok_or_else(|| {
        Error::invalid_version_spec(
            spec,
            format!("latest release tag '{}' carries no version", release.tag_name),
        )
    })?;
    debug!(tag = %release.tag_name, %version, "Resolved latest release");
    Ok(ResolvedSpec::Exact(version))
}

/// Extract the version from a release tag such as `codeql-bundle-v2.3.0`.
///
/// Returns `None` when the tag lacks the separator or the remainder is not a
/// semantic version.
#[must_use]
pub fn version_from_tag(tag: &str) -> Option<Version> {
    let raw = tag.split(TAG_VERSION_SEPARATOR).nth(1)?;
    Version::parse(raw).ok()
}

/// True iff the spec has at least three dot-separated components.
///
/// Only used to advise against pinning; it has no effect on resolution.
#[must_use]
pub fn is_exact_version(spec: &str) -> bool {
    !spec.is_empty() && spec.split('.').count() >= 3
}

/// Rewrite one `||`-free comparator set into the comma form `semver` parses.
///
/// Operators written apart from their version (`>= 2.0.0`) are rejoined,
/// hyphen ranges become a `>=`/`<=` pair, and bare versions get Node's
/// meaning: exact when complete, tilde when partial.
fn normalize_range(set: &str) -> String {
    let set = set.trim();
    if set.is_empty() {
        return "*".to_string();
    }
    if set.contains(',') {
        return set.to_string();
    }

    let tokens: Vec<&str> = set.split_whitespace().collect();
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if is_operator(token) {
            pending_op.push_str(token);
        } else if !pending_op.is_empty() {
            comparators.push(format!("{pending_op}{token}"));
            pending_op.clear();
        } else if tokens.get(i + 1) == Some(&"-")
            && let Some(upper) = tokens.get(i + 2)
        {
            comparators.push(format!(">={}", strip_v(token)));
            comparators.push(format!("<={}", strip_v(upper)));
            i += 2;
        } else if token.starts_with(|c: char| OPERATOR_CHARS.contains(&c)) {
            comparators.push(token.to_string());
        } else {
            comparators.push(bare_comparator(token));
        }
        i += 1;
    }
    if !pending_op.is_empty() {
        comparators.push(pending_op);
    }
    comparators.join(", ")
}

const OPERATOR_CHARS: [char; 5] = ['<', '>', '=', '~', '^'];

fn is_operator(token: &str) -> bool {
    token.chars().all(|c| OPERATOR_CHARS.contains(&c))
}

fn strip_v(token: &str) -> &str {
    token.strip_prefix('v').unwrap_or(token)
}

/// `2.3.0` → `=2.3.0`, `2.3` → `~2.3`, wildcards unchanged.
fn bare_comparator(token: &str) -> String {
    let token = strip_v(token);
    if token.contains(['*', 'x', 'X']) {
        token.to_string()
    } else if token.split('.').count() >= 3 {
        format!("={token}")
    } else {
        format!("~{token}")
    }
}
