// Url admissibility for the citation scraper: scheme, suffix denylist,
// domain blacklist. Pure and cheap; runs before any network call.

use std::collections::HashSet;
use std::fmt;

use megatick_common::normalize_domain;

/// Path suffixes that never lead to an HTML page worth extracting.
const DENIED_SUFFIXES: &[&str] = &[
    // documents
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".odt", ".rtf",
    // archives
    ".zip", ".gz", ".tgz", ".tar", ".rar", ".7z", ".bz2",
    // executables / scripts / data
    ".exe", ".dmg", ".apk", ".msi", ".js", ".css", ".json", ".xml", ".csv",
    // media
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".ico", ".bmp", ".tif", ".tiff",
    ".mp3", ".wav", ".ogg", ".flac", ".m4a", ".mp4", ".mov", ".avi", ".mkv", ".webm",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InvalidUrl,
    Scheme(String),
    Suffix(&'static str),
    BlacklistedDomain(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidUrl => f.write_str("invalid url"),
            SkipReason::Scheme(s) => write!(f, "scheme {s}"),
            SkipReason::Suffix(s) => write!(f, "suffix {s}"),
            SkipReason::BlacklistedDomain(d) => write!(f, "blacklisted domain {d}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    /// Normalized domains. A listed domain also covers its subdomains.
    domains: HashSet<String>,
}

impl UrlFilter {
    pub fn new(domains: Option<HashSet<String>>) -> Self {
        Self {
            domains: domains.unwrap_or_default(),
        }
    }

    /// Ok when the url may be fetched.
    pub fn check(&self, raw: &str) -> Result<(), SkipReason> {
        let parsed = url::Url::parse(raw).map_err(|_| SkipReason::InvalidUrl)?;

        if let Some(host) = parsed.host_str() {
            let host = normalize_domain(host);
            if let Some(blocked) = self.blocking_domain(&host) {
                return Err(SkipReason::BlacklistedDomain(blocked.to_string()));
            }
        }

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SkipReason::Scheme(parsed.scheme().to_string()));
        }
        if parsed.host_str().is_none() {
            return Err(SkipReason::InvalidUrl);
        }

        let path = parsed.path().to_lowercase();
        if let Some(suffix) = DENIED_SUFFIXES.iter().find(|s| path.ends_with(*s)) {
            return Err(SkipReason::Suffix(*suffix));
        }

        Ok(())
    }

    fn blocking_domain<'a>(&'a self, host: &str) -> Option<&'a str> {
        if self.domains.is_empty() {
            return None;
        }
        let mut candidate = host;
        loop {
            if let Some(d) = self.domains.get(candidate) {
                return Some(d.as_str());
            }
            match candidate.split_once('.') {
                Some((_, rest)) if rest.contains('.') => candidate = rest,
                _ => return None,
            }
        }
    }
}
