// Citation scraper pool: N workers sharing one queue of (citer, urls) jobs.
//
// Per url: admissibility check, reuse an existing WebPage, otherwise fetch
// and create it. Then link the citer to every page that resolved. Two
// workers racing on the same unseen url both fetch; the sink collapses the
// creates into one node and both citers get their edge.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use megatick_archive::UrlFilter;
use megatick_common::{GraphNode, NodeLabel, NodeRef, RelType, WebPage};

use crate::queue::WorkQueue;
use crate::stats::{bump, PipelineStats};
use crate::traits::{GraphSink, PageFetcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationJob {
    /// None for jobs that only archive pages (feed items).
    pub citer: Option<NodeRef>,
    pub urls: Vec<String>,
}

impl CitationJob {
    pub fn cited_by(citer: NodeRef, urls: Vec<String>) -> Self {
        Self {
            citer: Some(citer),
            urls,
        }
    }

    pub fn uncited(urls: Vec<String>) -> Self {
        Self { citer: None, urls }
    }
}

pub struct CitationScraper {
    sink: Arc<dyn GraphSink>,
    fetcher: Arc<dyn PageFetcher>,
    filter: UrlFilter,
    stats: Arc<PipelineStats>,
}

impl CitationScraper {
    pub fn new(
        sink: Arc<dyn GraphSink>,
        fetcher: Arc<dyn PageFetcher>,
        filter: UrlFilter,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            sink,
            fetcher,
            filter,
            stats,
        }
    }

    /// Spawn `workers` tasks consuming the shared queue.
    pub fn spawn_pool(
        self: Arc<Self>,
        queue: Arc<WorkQueue<CitationJob>>,
        workers: usize,
    ) -> Vec<JoinHandle<()>> {
        info!(workers, "Citation scraper pool starting");
        (0..workers)
            .map(|worker| {
                let scraper = self.clone();
                let queue = queue.clone();
                tokio::spawn(async move {
                    while let Some(job) = queue.pop().await {
                        scraper.handle(&job).await;
                    }
                    debug!(worker, "Citation worker stopped");
                })
            })
            .collect()
    }

    /// Process one job. Returns the pages the job resolved to.
    pub async fn handle(&self, job: &CitationJob) -> Vec<NodeRef> {
        let mut seen = HashSet::new();
        let mut pages = Vec::new();

        for url in job.urls.iter().filter(|u| seen.insert(u.as_str())) {
            match self.resolve_url(url).await {
                Ok(Some(page)) => pages.push(page),
                Ok(None) => {}
                Err(e) => warn!(url, error = %e, "Failed to store cited page"),
            }
        }

        if let Some(citer) = &job.citer {
            for page in &pages {
                match self.sink.upsert_edge(RelType::LinksTo, citer, page).await {
                    Ok(_) => bump(&self.stats.citations_linked),
                    Err(e) => warn!(citer = %citer, page = %page, error = %e, "Failed to link citation"),
                }
            }
        }
        pages
    }

    /// Existing or newly created WebPage for the url. None when skipped or
    /// unfetchable.
    async fn resolve_url(&self, url: &str) -> Result<Option<NodeRef>> {
        if let Err(reason) = self.filter.check(url) {
            bump(&self.stats.urls_skipped);
            debug!(url, %reason, "Skipping url");
            return Ok(None);
        }

        if let Some(existing) = self.sink.find_node(NodeLabel::WebPage, url).await? {
            bump(&self.stats.pages_reused);
            return Ok(Some(existing));
        }

        let fetched = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                bump(&self.stats.fetch_failed);
                debug!(url, error = %e, "Page not fetched");
                return Ok(None);
            }
        };

        let page = WebPage {
            url: url.to_string(),
            content: fetched.content,
            fetched_at: fetched.fetched_at,
        };
        let node = self.sink.upsert_node(&GraphNode::WebPage(page)).await?;
        bump(&self.stats.pages_created);
        Ok(Some(node))
    }
}
