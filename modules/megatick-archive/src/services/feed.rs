// RSS/Atom feed reader. Only the item links are used.

use std::time::Duration;

use tracing::info;

use crate::error::{ArchiveError, Result};

const FEED_MAX_ITEMS: usize = 50;

pub struct HttpFeedReader {
    client: reqwest::Client,
}

impl HttpFeedReader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { client })
    }

    /// Fetch and parse a feed, returning the item links newest first.
    pub async fn links(&self, feed_url: &str) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(feed_url)
            .header("User-Agent", "megatick-archive/0.1")
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(ArchiveError::Status {
                url: feed_url.to_string(),
                status,
            });
        }

        let bytes = resp.bytes().await?;
        let links = parse_feed_links(&bytes)?;

        info!(feed_url, items = links.len(), "feed: parsed successfully");
        Ok(links)
    }
}

pub(crate) fn parse_feed_links(bytes: &[u8]) -> Result<Vec<String>> {
    let feed =
        feed_rs::parser::parse(bytes).map_err(|e| ArchiveError::Parse(e.to_string()))?;

    let mut entries: Vec<_> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;
            Some((entry.published.or(entry.updated), url))
        })
        .collect();

    entries.sort_by(|a, b| b.0.cmp(&a.0));
    entries.truncate(FEED_MAX_ITEMS);

    Ok(entries.into_iter().map(|(_, url)| url).collect())
}
