// Wiring: builds the queues, spawns every worker and hands out the stream
// listener. Shutdown drains the stages in data-flow order.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use megatick_archive::UrlFilter;
use megatick_common::{Config, StreamItem};

use crate::citation::{CitationJob, CitationScraper};
use crate::dispatcher::Dispatcher;
use crate::feeds::FeedMonitor;
use crate::notability::Notability;
use crate::queue::WorkQueue;
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::stream::StreamListener;
use crate::thread_resolver::{ThreadResolver, ThreadTask};
use crate::traits::{AncestorLookup, FeedReader, GraphSink, PageFetcher};

/// Feeds to poll and the reader to poll them with.
pub struct FeedSource {
    pub reader: Arc<dyn FeedReader>,
    pub urls: Vec<String>,
}

/// Everything the pipeline talks to.
pub struct MonitorDeps {
    pub sink: Arc<dyn GraphSink>,
    pub filter: Arc<dyn Notability>,
    pub url_filter: UrlFilter,
    pub fetcher: Arc<dyn PageFetcher>,
    pub lookup: Arc<dyn AncestorLookup>,
    pub feeds: Option<FeedSource>,
}

/// Cloneable view of the live counters and the queue drop totals, for
/// periodic reporting.
#[derive(Clone)]
pub struct StatsHandle {
    stats: Arc<PipelineStats>,
    ingest: Arc<WorkQueue<StreamItem>>,
    threads: Arc<WorkQueue<ThreadTask>>,
    citations: Arc<WorkQueue<CitationJob>>,
}

impl StatsHandle {
    pub fn snapshot(&self) -> StatsSnapshot {
        let mut snapshot = self.stats.snapshot();
        snapshot.queue_drops =
            self.ingest.dropped() + self.threads.dropped() + self.citations.dropped();
        snapshot
    }
}

pub struct Monitor {
    config: Config,
    ingest: Arc<WorkQueue<StreamItem>>,
    threads: Arc<WorkQueue<ThreadTask>>,
    citations: Arc<WorkQueue<CitationJob>>,
    stats: Arc<PipelineStats>,
    dispatcher: JoinHandle<()>,
    resolver: JoinHandle<()>,
    scrapers: Vec<JoinHandle<()>>,
    feed_monitor: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Spawn the dispatcher, the thread resolver, the scraper pool and (when
    /// feeds are configured) the feed monitor. Must run inside a tokio runtime.
    pub fn start(deps: MonitorDeps, config: &Config) -> Self {
        let capacity = config.queue_capacity;
        let overflow = config.queue_overflow;
        let ingest = Arc::new(WorkQueue::new("ingest", capacity, overflow));
        let threads = Arc::new(WorkQueue::new("threads", capacity, overflow));
        let citations = Arc::new(WorkQueue::new("citations", capacity, overflow));
        let stats = Arc::new(PipelineStats::default());

        let dispatcher = Dispatcher::new(
            deps.sink.clone(),
            deps.filter,
            citations.clone(),
            threads.clone(),
            stats.clone(),
        );
        let dispatcher = tokio::spawn(dispatcher.run(ingest.clone()));

        let resolver = ThreadResolver::new(
            deps.sink.clone(),
            deps.lookup,
            threads.clone(),
            citations.clone(),
            config.lookup_interval,
            stats.clone(),
        );
        let resolver = tokio::spawn(resolver.run());

        let scraper = Arc::new(CitationScraper::new(
            deps.sink,
            deps.fetcher,
            deps.url_filter,
            stats.clone(),
        ));
        let scrapers = scraper.spawn_pool(citations.clone(), config.scraper_workers);

        let feed_monitor = deps
            .feeds
            .filter(|f| !f.urls.is_empty())
            .map(|f| {
                let monitor = FeedMonitor::new(
                    f.reader,
                    f.urls,
                    config.feed_interval,
                    citations.clone(),
                    stats.clone(),
                );
                tokio::spawn(monitor.run())
            });

        info!(
            scraper_workers = config.scraper_workers,
            feeds = feed_monitor.is_some(),
            "Monitor started"
        );

        Self {
            config: config.clone(),
            ingest,
            threads,
            citations,
            stats,
            dispatcher,
            resolver,
            scrapers,
            feed_monitor,
        }
    }

    /// The stream callback object. Cheap; one per stream connection.
    pub fn listener(&self) -> StreamListener {
        StreamListener::new(
            self.ingest.clone(),
            self.stats.clone(),
            self.config.reconnect_delay,
            self.config.rate_limit_backoff,
        )
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats_handle().snapshot()
    }

    pub fn stats_handle(&self) -> StatsHandle {
        StatsHandle {
            stats: self.stats.clone(),
            ingest: self.ingest.clone(),
            threads: self.threads.clone(),
            citations: self.citations.clone(),
        }
    }

    /// Queued work per stage: (ingest, threads, citations).
    pub fn backlog(&self) -> (usize, usize, usize) {
        (self.ingest.len(), self.threads.len(), self.citations.len())
    }

    /// Stop taking input, let every stage drain, and return the final stats.
    /// Each queue closes only after its producers have stopped.
    pub async fn shutdown(self) -> StatsSnapshot {
        info!("Monitor draining");
        let stats = self.stats_handle();
        if let Some(feed_monitor) = &self.feed_monitor {
            feed_monitor.abort();
        }

        self.ingest.close();
        join("dispatcher", self.dispatcher).await;

        self.threads.close();
        join("thread resolver", self.resolver).await;

        self.citations.close();
        for scraper in self.scrapers {
            join("citation worker", scraper).await;
        }

        let snapshot = stats.snapshot();
        info!("Monitor stopped");
        snapshot
    }
}

async fn join(name: &str, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        warn!(worker = name, error = %e, "Worker ended abnormally");
    }
}
