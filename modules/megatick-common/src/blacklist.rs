// Static blacklists, loaded once at startup and shared read-only afterwards.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::error::MegatickError;
use crate::types::normalize_domain;

/// Exclusion lists. A `None` list means "not configured" and filters nothing.
#[derive(Debug, Clone, Default)]
pub struct Blacklists {
    pub author_ids: Option<HashSet<String>>,
    pub keywords: Option<Vec<String>>,
    /// Normalized domains (see `normalize_domain`).
    pub domains: Option<HashSet<String>>,
}

impl Blacklists {
    /// Read every blacklist file named in the config.
    pub fn load(config: &Config) -> Result<Self, MegatickError> {
        let author_ids = config
            .author_blacklist_path
            .as_deref()
            .map(read_lines)
            .transpose()?
            .map(|lines| lines.into_iter().collect::<HashSet<_>>());

        let keywords = config
            .keyword_blacklist_path
            .as_deref()
            .map(read_lines)
            .transpose()?;

        let domains = config
            .domain_blacklist_path
            .as_deref()
            .map(read_lines)
            .transpose()?
            .map(|lines| lines.iter().map(|d| normalize_domain(d)).collect::<HashSet<_>>());

        info!(
            authors = author_ids.as_ref().map(|s| s.len()),
            keywords = keywords.as_ref().map(|k| k.len()),
            domains = domains.as_ref().map(|d| d.len()),
            "Blacklists loaded"
        );

        Ok(Self {
            author_ids,
            keywords,
            domains,
        })
    }
}

/// Read a one-entry-per-line file. Blank lines and `#` comments are skipped.
pub fn read_lines(path: &Path) -> Result<Vec<String>, MegatickError> {
    let raw = std::fs::read_to_string(path).map_err(|source| MegatickError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}
