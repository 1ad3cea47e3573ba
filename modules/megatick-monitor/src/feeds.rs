// Feed monitor: polls RSS/Atom feeds and archives their item links.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::citation::CitationJob;
use crate::queue::WorkQueue;
use crate::stats::{bump, PipelineStats};
use crate::traits::FeedReader;

pub struct FeedMonitor {
    reader: Arc<dyn FeedReader>,
    feeds: Vec<String>,
    interval: Duration,
    citations: Arc<WorkQueue<CitationJob>>,
    stats: Arc<PipelineStats>,
}

impl FeedMonitor {
    pub fn new(
        reader: Arc<dyn FeedReader>,
        feeds: Vec<String>,
        interval: Duration,
        citations: Arc<WorkQueue<CitationJob>>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            reader,
            feeds,
            interval,
            citations,
            stats,
        }
    }

    /// Poll forever. The first poll happens immediately.
    pub async fn run(self) {
        info!(feeds = self.feeds.len(), interval_secs = self.interval.as_secs(), "Feed monitor started");
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// Read every feed once and queue one page-only job per feed.
    /// Returns the number of jobs queued.
    pub async fn poll_once(&self) -> usize {
        let mut queued = 0;
        for feed in &self.feeds {
            match self.reader.links(feed).await {
                Ok(links) if links.is_empty() => {}
                Ok(links) => {
                    info!(feed = feed.as_str(), links = links.len(), "Feed links queued");
                    bump(&self.stats.citation_jobs);
                    self.citations.push(CitationJob::uncited(links));
                    queued += 1;
                }
                Err(e) => warn!(feed = feed.as_str(), error = %e, "Feed poll failed"),
            }
        }
        queued
    }
}
