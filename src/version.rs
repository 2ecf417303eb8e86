use crate::remote::{FetchError, Remote};
use std::cmp::Ordering;
use std::fmt;
use tracing::info;

const ANCHOR_MARKER: &str = "href=\"";

pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

#[derive(thiserror::Error, Debug)]
pub enum VersionError {
    #[error("failed to fetch index: {0}")]
    Fetch(#[from] FetchError),

    #[error("no versions of '{0}' found on index")]
    NoVersions(String),

    #[error("invalid version '{0}': segments must be non-negative integers")]
    InvalidVersion(String),
}

/// A dot-separated release number such as `4.2.05`.
///
/// Ordering uses the integer value of each segment, so `1.2.10` sorts after
/// `1.2.9`. The original text is kept for building file names.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

impl Version {
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let segments = raw
            .split('.')
            .map(|segment| segment.parse::<u64>())
            .collect::<Result<Vec<u64>, _>>()
            .map_err(|_| VersionError::InvalidVersion(raw.to_string()))?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Returns every quoted `href` value found on lines of `body` that carry an anchor.
pub fn anchor_hrefs(body: &str) -> Vec<String> {
    let mut hrefs = vec![];

    for line in body.lines().filter(|line| line.contains(ANCHOR_MARKER)) {
        let mut rest = line;

        while let Some(start) = rest.find(ANCHOR_MARKER) {
            let value = &rest[start + ANCHOR_MARKER.len()..];

            let Some(end) = value.find('"') else {
                break;
            };

            hrefs.push(value[..end].to_string());

            rest = &value[end + 1..];
        }
    }

    hrefs
}

/// Extracts the text between `<program>-` and the archive suffix of each href.
///
/// Hrefs without the prefix, or without a suffix after it, are skipped.
/// Repeated candidates are reported once, in order of first appearance.
pub fn scan_candidates<S: AsRef<str>>(hrefs: &[S], program: &str) -> Vec<String> {
    let prefix = format!("{}-", program);
    let mut candidates: Vec<String> = vec![];

    for href in hrefs {
        let href = href.as_ref();

        let Some(start) = href.find(&prefix) else {
            continue;
        };

        let start = start + prefix.len();

        let Some(end) = href[start..].find(ARCHIVE_SUFFIX) else {
            continue;
        };

        let candidate = &href[start..start + end];

        if !candidates.iter().any(|c| c == candidate) {
            candidates.push(candidate.to_string());
        }
    }

    candidates
}

/// Picks the highest candidate by integer segments.
///
/// Every candidate must parse; a single malformed one fails the selection.
pub fn latest_version<S: AsRef<str>>(
    program: &str,
    candidates: &[S],
) -> Result<Version, VersionError> {
    if candidates.is_empty() {
        return Err(VersionError::NoVersions(program.to_string()));
    }

    let versions = candidates
        .iter()
        .map(|c| Version::parse(c.as_ref()))
        .collect::<Result<Vec<Version>, _>>()?;

    versions
        .into_iter()
        .max()
        .ok_or_else(|| VersionError::NoVersions(program.to_string()))
}

pub async fn find_latest<R: Remote + ?Sized>(
    remote: &R,
    index_url: &str,
    program: &str,
) -> Result<Version, VersionError> {
    let body = remote.get_text(index_url).await?;

    info!("index fetched: {}", index_url);

    let candidates = scan_candidates(&anchor_hrefs(&body), program);

    info!("{} versions: {:?}", program, candidates);

    latest_version(program, &candidates)
}
