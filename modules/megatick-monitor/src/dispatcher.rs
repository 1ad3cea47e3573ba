// Ingestion dispatcher: the single consumer of the raw stream queue.
//
// For each item: filter, persist (author, content, AUTHORED), then hand the
// item's citations and ancestry to their own queues. Nothing here waits on
// the network beyond the sink.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use megatick_common::StreamItem;

use crate::citation::CitationJob;
use crate::extract::{persist_item, Persisted};
use crate::notability::{Notability, Verdict};
use crate::queue::WorkQueue;
use crate::stats::{bump, PipelineStats};
use crate::thread_resolver::ThreadTask;
use crate::traits::GraphSink;

pub struct Dispatcher {
    sink: Arc<dyn GraphSink>,
    filter: Arc<dyn Notability>,
    citations: Arc<WorkQueue<CitationJob>>,
    threads: Arc<WorkQueue<ThreadTask>>,
    stats: Arc<PipelineStats>,
}

impl Dispatcher {
    pub fn new(
        sink: Arc<dyn GraphSink>,
        filter: Arc<dyn Notability>,
        citations: Arc<WorkQueue<CitationJob>>,
        threads: Arc<WorkQueue<ThreadTask>>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            sink,
            filter,
            citations,
            threads,
            stats,
        }
    }

    /// Consume the ingestion queue until it is closed and drained.
    pub async fn run(self, queue: Arc<WorkQueue<StreamItem>>) {
        info!("Dispatcher started");
        while let Some(item) = queue.pop().await {
            self.handle(&item).await;
        }
        info!("Dispatcher stopped");
    }

    /// Process one item. Failures are logged and the item is dropped.
    pub async fn handle(&self, item: &StreamItem) -> Verdict {
        let verdict = self.filter.judge(item);
        if let Verdict::Reject(reason) = verdict {
            self.stats.record_reject(reason);
            return verdict;
        }
        bump(&self.stats.accepted);

        if let Err(e) = self.process(item).await {
            bump(&self.stats.persist_failed);
            warn!(item = %item.describe(), error = %e, "Failed to persist item, dropping");
        }
        verdict
    }

    async fn process(&self, item: &StreamItem) -> Result<()> {
        let persisted = persist_item(self.sink.as_ref(), item).await?;
        bump(&self.stats.persisted);
        enqueue_followups(&persisted, &self.citations, &self.threads, &self.stats);
        Ok(())
    }
}

/// Queue a persisted item's citations and one ancestry task per parent.
pub(crate) fn enqueue_followups(
    persisted: &Persisted,
    citations: &WorkQueue<CitationJob>,
    threads: &WorkQueue<ThreadTask>,
    stats: &PipelineStats,
) {
    if !persisted.urls.is_empty() {
        bump(&stats.citation_jobs);
        citations.push(CitationJob::cited_by(
            persisted.content.clone(),
            persisted.urls.clone(),
        ));
    }
    for parent in &persisted.parents {
        threads.push(ThreadTask {
            child: persisted.content.clone(),
            parent: parent.clone(),
        });
    }
}
