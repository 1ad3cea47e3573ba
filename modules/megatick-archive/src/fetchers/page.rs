// Plain HTTP page fetcher for cited urls.

use std::time::Duration;

use chrono::{DateTime, Utc};
use megatick_common::{extract_domain, normalize_domain};
use tracing::{debug, info};

use crate::error::{ArchiveError, Result};
use crate::readability::extract_text;

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);
const USER_AGENT: &str = "megatick-archive/0.1";

/// A page that came back 200.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// The url as cited.
    pub url: String,
    /// Address after redirects.
    pub final_url: String,
    pub content: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
    /// Normalized hosts of the platform's own content; pages resolving there
    /// are not citations.
    platform_hosts: Vec<String>,
}

impl HttpPageFetcher {
    pub fn new(platform_hosts: &[String]) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        let platform_hosts: Vec<String> =
            platform_hosts.iter().map(|h| normalize_domain(h)).collect();
        info!(hosts = ?platform_hosts, "HttpPageFetcher initialized");
        Ok(Self {
            client,
            platform_hosts,
        })
    }

    /// GET the url. Only a 200 counts; everything else is an error the
    /// caller skips without retrying.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        debug!(url, "page: fetching");

        let resp = self.client.get(url).send().await?;
        let final_url = resp.url().to_string();

        if self.is_platform_url(&final_url) {
            return Err(ArchiveError::Unfetchable {
                url: url.to_string(),
                reason: format!("resolves to platform content at {final_url}"),
            });
        }

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(ArchiveError::Status {
                url: url.to_string(),
                status,
            });
        }

        let bytes = resp.bytes().await?;
        let content = extract_text(&bytes, Some(&final_url));

        debug!(url, bytes = bytes.len(), has_text = content.is_some(), "page: fetched");

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            content,
            fetched_at: Utc::now(),
        })
    }

    fn is_platform_url(&self, url: &str) -> bool {
        is_platform_host(&self.platform_hosts, url)
    }
}

pub(crate) fn is_platform_host(platform_hosts: &[String], url: &str) -> bool {
    let host = normalize_domain(&extract_domain(url));
    !host.is_empty() && platform_hosts.iter().any(|h| *h == host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> Vec<String> {
        vec!["twitter.com".to_string(), "x.com".to_string()]
    }

    #[test]
    fn platform_hosts_are_recognized() {
        assert!(is_platform_host(&hosts(), "https://twitter.com/someone/status/1"));
        assert!(is_platform_host(&hosts(), "https://www.twitter.com/i/web"));
        assert!(is_platform_host(&hosts(), "http://x.com/a"));
        assert!(!is_platform_host(&hosts(), "https://example.com/twitter.com"));
        assert!(!is_platform_host(&hosts(), ""));
    }
}
